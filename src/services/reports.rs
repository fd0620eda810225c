//! Admin dashboard, loan reports and overdue notices

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{is_overdue, Loan, LoanReportQuery, LoanStatus},
        notification::{CreateNotification, OVERDUE_CATEGORY},
        report::{DashboardData, LoanReport, OverdueNotices},
    },
    repository::Repository,
};

use super::loans::LoansService;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` query parameter
pub fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        AppError::BadRequest(format!(
            "Invalid {}: expected YYYY-MM-DD, got '{}'",
            field, value
        ))
    })
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn overdue_message(loan: &Loan) -> String {
    format!(
        "Loan {} for book {} was due on {}",
        loan.id,
        loan.book_id,
        loan.due_date.format(DATE_FORMAT)
    )
}

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
    loans: LoansService,
}

impl ReportsService {
    pub fn new(repository: Repository, loans: LoansService) -> Self {
        Self { repository, loans }
    }

    pub async fn dashboard(&self) -> AppResult<DashboardData> {
        let now = Utc::now();
        let active = self.repository.loans.list_active().await?;
        let overdue = active.iter().filter(|l| is_overdue(l, now)).count();

        Ok(DashboardData {
            total_members: self.repository.members.count().await?,
            total_books: self.repository.books.count().await?,
            total_loans: self.repository.loans.count().await?,
            active_loans: active.len() as i64,
            overdue_loans: overdue as i64,
        })
    }

    /// Loans due in `[start_date, end_date)` with per-status counts
    pub async fn loan_report(&self, query: &LoanReportQuery) -> AppResult<LoanReport> {
        let start_date = parse_date("start_date", &query.start_date)?;
        let end_date = parse_date("end_date", &query.end_date)?;
        if end_date < start_date {
            return Err(AppError::BadRequest(
                "end_date must not be before start_date".to_string(),
            ));
        }

        let loans = self
            .loans
            .report_in_range(start_of_day(start_date), start_of_day(end_date))
            .await?;

        let count = |status: LoanStatus| loans.iter().filter(|l| l.status == status).count() as i64;
        let overdue_loans = count(LoanStatus::Overdue);
        let returned_loans = count(LoanStatus::Returned);

        Ok(LoanReport {
            start_date,
            end_date,
            total_loans: loans.len() as i64,
            // Overdue loans are still out
            active_loans: count(LoanStatus::Active) + overdue_loans,
            returned_loans,
            overdue_loans,
            loans,
        })
    }

    /// Send one notification per overdue loan. A loan whose previous notice
    /// is still unread is skipped.
    pub async fn send_overdue_notices(&self) -> AppResult<OverdueNotices> {
        let now = Utc::now();
        let overdue = self.loans.list_overdue(now).await?;
        let mut notified = 0;

        for loan in &overdue {
            let message = overdue_message(loan);
            let pending = self
                .repository
                .notifications
                .list_by_member(loan.member_id)
                .await?
                .into_iter()
                .any(|n| {
                    !n.is_read
                        && n.category.as_deref() == Some(OVERDUE_CATEGORY)
                        && n.message == message
                });
            if pending {
                continue;
            }

            let notice = CreateNotification {
                member_id: loan.member_id,
                title: "Overdue loan".to_string(),
                message,
                category: Some(OVERDUE_CATEGORY.to_string()),
            };
            self.repository.notifications.create(&notice).await?;
            notified += 1;
        }

        tracing::info!(
            count = notified,
            skipped = overdue.len() as i64 - notified,
            "Overdue notices sent"
        );
        Ok(OverdueNotices { notified })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        book::CreateBook,
        loan::NewLoan,
        member::{MembershipType, NewMember},
    };
    use chrono::Duration;

    async fn seeded() -> (ReportsService, Repository) {
        let repository = Repository::in_memory();
        repository
            .members
            .create(&NewMember {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                phone: None,
                address: None,
                registration_date: Utc::now(),
                membership_type: MembershipType::Regular,
            })
            .await
            .unwrap();
        for title in ["Dune", "Emma", "Ulysses"] {
            repository
                .books
                .create(&CreateBook {
                    title: title.to_string(),
                    author: "Someone".to_string(),
                    publisher: None,
                    publication_year: None,
                    isbn: None,
                    genre: None,
                    description: None,
                    cover_image: None,
                })
                .await
                .unwrap();
        }
        let loans = LoansService::new(repository.clone(), 14);
        (ReportsService::new(repository.clone(), loans), repository)
    }

    async fn lend(repository: &Repository, book_id: i32, due_in_days: i64) -> i32 {
        let due = Utc::now() + Duration::days(due_in_days);
        repository
            .loans
            .create(&NewLoan {
                member_id: 1,
                book_id,
                borrow_date: due - Duration::days(14),
                due_date: due,
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn dates_must_be_iso() {
        assert!(parse_date("start_date", "2024-03-01").is_ok());
        assert!(matches!(
            parse_date("start_date", "03/01/2024"),
            Err(AppError::BadRequest(_))
        ));
        assert!(parse_date("end_date", "2024-02-30").is_err());
    }

    #[tokio::test]
    async fn dashboard_counts_overdue_with_ledger_rule() {
        let (service, repository) = seeded().await;
        lend(&repository, 1, -2).await;
        lend(&repository, 2, 5).await;
        let returned = lend(&repository, 3, -1).await;
        repository.loans.mark_returned(returned, Utc::now()).await.unwrap();

        let dashboard = service.dashboard().await.unwrap();
        assert_eq!(dashboard.total_members, 1);
        assert_eq!(dashboard.total_books, 3);
        assert_eq!(dashboard.total_loans, 3);
        assert_eq!(dashboard.active_loans, 2);
        assert_eq!(dashboard.overdue_loans, 1);
    }

    #[tokio::test]
    async fn report_is_end_exclusive_and_ordered() {
        let (service, repository) = seeded().await;
        lend(&repository, 1, -2).await;
        lend(&repository, 2, 5).await;

        let today = Utc::now().date_naive();
        let query = LoanReportQuery {
            start_date: (today - Duration::days(10)).format(DATE_FORMAT).to_string(),
            end_date: (today + Duration::days(30)).format(DATE_FORMAT).to_string(),
        };
        let report = service.loan_report(&query).await.unwrap();
        assert_eq!(report.total_loans, 2);
        assert_eq!(report.overdue_loans, 1);
        assert_eq!(report.active_loans, 2);
        assert_eq!(report.returned_loans, 0);
        assert_eq!(report.loans[0].loan.id, 1);

        let empty = LoanReportQuery {
            start_date: today.format(DATE_FORMAT).to_string(),
            end_date: today.format(DATE_FORMAT).to_string(),
        };
        assert_eq!(service.loan_report(&empty).await.unwrap().total_loans, 0);
    }

    #[tokio::test]
    async fn reversed_range_is_rejected() {
        let (service, _) = seeded().await;
        let query = LoanReportQuery {
            start_date: "2024-03-10".to_string(),
            end_date: "2024-03-01".to_string(),
        };
        assert!(matches!(
            service.loan_report(&query).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn overdue_notices_target_overdue_loans_only() {
        let (service, repository) = seeded().await;
        lend(&repository, 1, -2).await;
        lend(&repository, 2, 5).await;

        let result = service.send_overdue_notices().await.unwrap();
        assert_eq!(result.notified, 1);

        let notices = repository.notifications.list_by_member(1).await.unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].category.as_deref(), Some(OVERDUE_CATEGORY));
    }

    #[tokio::test]
    async fn repeated_notices_skip_loans_with_unread_notice() {
        let (service, repository) = seeded().await;
        lend(&repository, 1, -2).await;

        assert_eq!(service.send_overdue_notices().await.unwrap().notified, 1);
        assert_eq!(service.send_overdue_notices().await.unwrap().notified, 0);

        let notices = repository.notifications.list_by_member(1).await.unwrap();
        assert_eq!(notices.len(), 1);

        repository.notifications.mark_read(notices[0].id).await.unwrap();
        assert_eq!(service.send_overdue_notices().await.unwrap().notified, 1);
        assert_eq!(repository.notifications.list_by_member(1).await.unwrap().len(), 2);
    }
}
