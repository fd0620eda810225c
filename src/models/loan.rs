//! Loan model and the ledger rules derived from it

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Loan record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub member_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub returned: bool,
}

/// A loan is overdue when it is still out and `now` is past its due date.
/// Not overdue at the exact due instant.
pub fn is_overdue(loan: &Loan, now: DateTime<Utc>) -> bool {
    !loan.returned && now > loan.due_date
}

/// Due date for a loan borrowed at `borrow_date`, or None if it would
/// fall outside the representable range
pub fn due_date_for(borrow_date: DateTime<Utc>, period_days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(period_days).and_then(|period| borrow_date.checked_add_signed(period))
}

/// Loan state as seen by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

impl LoanStatus {
    pub fn of(loan: &Loan, now: DateTime<Utc>) -> Self {
        if loan.returned {
            LoanStatus::Returned
        } else if is_overdue(loan, now) {
            LoanStatus::Overdue
        } else {
            LoanStatus::Active
        }
    }
}

/// Loan with its derived state computed at read time
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanView {
    #[serde(flatten)]
    pub loan: Loan,
    pub is_overdue: bool,
    pub status: LoanStatus,
}

impl LoanView {
    pub fn at(loan: Loan, now: DateTime<Utc>) -> Self {
        Self {
            is_overdue: is_overdue(&loan, now),
            status: LoanStatus::of(&loan, now),
            loan,
        }
    }
}

/// Loan row ready for insertion
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub member_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub member_id: i32,
    pub book_id: i32,
}

/// Update loan request. `returned: true` returns the loan; `due_date`
/// corrects the due date of an active loan.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateLoan {
    pub returned: Option<bool>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Date range query for loan reports (`YYYY-MM-DD`, end exclusive)
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanReportQuery {
    pub start_date: String,
    pub end_date: String,
}
