//! Admin dashboard and reporting endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{
        loan::LoanReportQuery,
        report::{DashboardData, LoanReport, OverdueNotices},
    },
    AppState,
};

/// Library-wide totals
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard totals", body = DashboardData)
    )
)]
pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardData>> {
    let data = state.services.reports.dashboard().await?;
    Ok(Json(data))
}

/// Loans due in a date range (`end_date` exclusive)
#[utoipa::path(
    get,
    path = "/admin/reports",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(LoanReportQuery),
    responses(
        (status = 200, description = "Loan report", body = LoanReport),
        (status = 400, description = "Invalid date or range", body = crate::error::ErrorResponse)
    )
)]
pub async fn loan_report(
    State(state): State<AppState>,
    Query(query): Query<LoanReportQuery>,
) -> AppResult<Json<LoanReport>> {
    let report = state.services.reports.loan_report(&query).await?;
    Ok(Json(report))
}

/// Notify members of their overdue loans
#[utoipa::path(
    post,
    path = "/admin/overdue-notices",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Notices sent", body = OverdueNotices)
    )
)]
pub async fn overdue_notices(State(state): State<AppState>) -> AppResult<Json<OverdueNotices>> {
    let result = state.services.reports.send_overdue_notices().await?;
    Ok(Json(result))
}
