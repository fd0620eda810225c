//! Admin dashboard and report payloads

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::loan::LoanView;

/// Library-wide totals
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardData {
    pub total_members: i64,
    pub total_books: i64,
    pub total_loans: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
}

/// Loans due in `[start_date, end_date)`
#[derive(Debug, Serialize, ToSchema)]
pub struct LoanReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_loans: i64,
    pub active_loans: i64,
    pub returned_loans: i64,
    pub overdue_loans: i64,
    pub loans: Vec<LoanView>,
}

/// Result of generating overdue notices
#[derive(Debug, Serialize, ToSchema)]
pub struct OverdueNotices {
    pub notified: i64,
}
