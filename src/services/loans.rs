//! Loan ledger service

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::loan::{due_date_for, is_overdue, CreateLoan, Loan, LoanView, NewLoan, UpdateLoan},
    repository::{loans::already_returned, Repository},
};

fn views(loans: Vec<Loan>, now: DateTime<Utc>) -> Vec<LoanView> {
    loans.into_iter().map(|loan| LoanView::at(loan, now)).collect()
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    period_days: i64,
}

impl LoansService {
    pub fn new(repository: Repository, period_days: i64) -> Self {
        Self {
            repository,
            period_days,
        }
    }

    /// Borrow a book: due date is the borrow instant plus the loan period
    pub async fn create_loan(&self, request: CreateLoan) -> AppResult<LoanView> {
        let now = Utc::now();
        let due_date = due_date_for(now, self.period_days)
            .ok_or_else(|| AppError::Internal("Loan period out of range".to_string()))?;
        let loan = NewLoan {
            member_id: request.member_id,
            book_id: request.book_id,
            borrow_date: now,
            due_date,
        };

        let loan = self.repository.loans.create(&loan).await?;
        tracing::info!(
            loan_id = loan.id,
            member_id = loan.member_id,
            book_id = loan.book_id,
            "Loan created"
        );
        Ok(LoanView::at(loan, now))
    }

    pub async fn get_loan(&self, id: i32) -> AppResult<LoanView> {
        let loan = self.repository.loans.get_by_id(id).await?;
        Ok(LoanView::at(loan, Utc::now()))
    }

    pub async fn list_loans(&self) -> AppResult<Vec<LoanView>> {
        let loans = self.repository.loans.list().await?;
        Ok(views(loans, Utc::now()))
    }

    pub async fn list_by_member(&self, member_id: i32) -> AppResult<Vec<LoanView>> {
        self.repository.members.get_by_id(member_id).await?;
        let loans = self.repository.loans.list_by_member(member_id).await?;
        Ok(views(loans, Utc::now()))
    }

    pub async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<LoanView>> {
        self.repository.books.get_by_id(book_id).await?;
        let loans = self.repository.loans.list_by_book(book_id).await?;
        Ok(views(loans, Utc::now()))
    }

    /// Return a borrowed book. A loan can only be returned once.
    pub async fn return_loan(&self, id: i32) -> AppResult<LoanView> {
        let now = Utc::now();
        let loan = self.repository.loans.mark_returned(id, now).await?;
        tracing::info!(loan_id = loan.id, member_id = loan.member_id, "Loan returned");
        Ok(LoanView::at(loan, now))
    }

    /// Apply a loan update: correct the due date and/or mark it returned
    pub async fn update_loan(&self, id: i32, update: UpdateLoan) -> AppResult<LoanView> {
        let mut loan = self.repository.loans.get_by_id(id).await?;

        if update.returned == Some(false) && loan.returned {
            return Err(AppError::Validation(
                "A returned loan cannot be reopened".to_string(),
            ));
        }

        if let Some(due_date) = update.due_date {
            if loan.returned {
                return Err(already_returned(id));
            }
            if due_date <= loan.borrow_date {
                return Err(AppError::Validation(
                    "Due date must be after the borrow date".to_string(),
                ));
            }
            loan = self.repository.loans.update_due_date(id, due_date).await?;
            tracing::info!(loan_id = id, %due_date, "Loan due date changed");
        }

        if update.returned == Some(true) {
            return self.return_loan(id).await;
        }

        Ok(LoanView::at(loan, Utc::now()))
    }

    pub async fn delete_loan(&self, id: i32) -> AppResult<()> {
        self.repository.loans.delete(id).await?;
        tracing::info!(loan_id = id, "Loan deleted");
        Ok(())
    }

    /// Loans whose due date falls in `[start, end)`
    pub async fn report_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<LoanView>> {
        let loans = self.repository.loans.list_due_between(start, end).await?;
        Ok(views(loans, Utc::now()))
    }

    /// Active loans that are overdue at `now`
    pub async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let active = self.repository.loans.list_active().await?;
        Ok(active.into_iter().filter(|l| is_overdue(l, now)).collect())
    }
}
