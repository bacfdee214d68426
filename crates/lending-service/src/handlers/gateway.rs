//! JSON gateway over the same services as the gRPC surface.
//!
//! Loan ids come from the path; a `loan_id` in the body is ignored.
//! Malformed bodies are reported in the same error envelope as domain
//! validation failures.

use crate::auth::Claims;
use crate::errors::LendingError;
use crate::models::{
    ApproveLoanRequest, ApproveLoanResponse, CloseAccountResponse, CreateLoanRequest,
    CreateLoanResponse, DisburseLoanRequest, DisburseLoanResponse, InvestInLoanRequest,
    InvestInLoanResponse, IsUserExistRequest, IsUserExistResponse, LoanId, LoginRequest,
    RefreshTokenRequest, RegisterRequest, RegisterResponse, TokenPair,
};
use crate::routes::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

type Caller = Option<Extension<Claims>>;

fn claims(caller: &Caller) -> Option<&Claims> {
    caller.as_ref().map(|Extension(c)| c)
}

/// POST /v1/auth/register
#[instrument(skip_all, name = "lending.http.register")]
pub async fn register(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, LendingError> {
    let Json(request) = body?;
    let response = state.auth.register(claims(&caller), request).await?;
    Ok(Json(response))
}

/// POST /v1/auth/login
#[instrument(skip_all, name = "lending.http.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, LendingError> {
    let Json(request) = body?;
    Ok(Json(state.auth.login(request).await?))
}

/// POST /v1/auth/refresh
#[instrument(skip_all, name = "lending.http.refresh")]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, LendingError> {
    let Json(request) = body?;
    Ok(Json(state.auth.refresh_token(request).await?))
}

/// POST /v1/users/exists
#[instrument(skip_all, name = "lending.http.user_exists")]
pub async fn user_exists(
    State(state): State<Arc<AppState>>,
    body: Result<Json<IsUserExistRequest>, JsonRejection>,
) -> Result<Json<IsUserExistResponse>, LendingError> {
    let Json(request) = body?;
    Ok(Json(state.users.is_user_exist(request).await?))
}

/// POST /v1/users/close
#[instrument(skip_all, name = "lending.http.close_account")]
pub async fn close_account(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<CloseAccountResponse>, LendingError> {
    Ok(Json(state.users.close_account(claims(&caller)).await?))
}

/// POST /v1/loans
#[instrument(skip_all, name = "lending.http.create_loan")]
pub async fn create_loan(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<CreateLoanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateLoanResponse>), LendingError> {
    let Json(request) = body?;
    let response = state.loans.create_loan(claims(&caller), request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /v1/loans/{id}/approve
#[instrument(skip_all, name = "lending.http.approve_loan", fields(loan_id = loan_id))]
pub async fn approve_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<LoanId>,
    caller: Caller,
    body: Result<Json<ApproveLoanRequest>, JsonRejection>,
) -> Result<Json<ApproveLoanResponse>, LendingError> {
    let Json(mut request) = body?;
    request.loan_id = loan_id;
    Ok(Json(state.loans.approve_loan(claims(&caller), request).await?))
}

/// POST /v1/loans/{id}/invest
#[instrument(skip_all, name = "lending.http.invest_in_loan", fields(loan_id = loan_id))]
pub async fn invest_in_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<LoanId>,
    caller: Caller,
    body: Result<Json<InvestInLoanRequest>, JsonRejection>,
) -> Result<Json<InvestInLoanResponse>, LendingError> {
    let Json(mut request) = body?;
    request.loan_id = loan_id;
    Ok(Json(state.loans.invest_in_loan(claims(&caller), request).await?))
}

/// POST /v1/loans/{id}/disburse
#[instrument(skip_all, name = "lending.http.disburse_loan", fields(loan_id = loan_id))]
pub async fn disburse_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<LoanId>,
    caller: Caller,
    body: Result<Json<DisburseLoanRequest>, JsonRejection>,
) -> Result<Json<DisburseLoanResponse>, LendingError> {
    let Json(mut request) = body?;
    request.loan_id = loan_id;
    Ok(Json(state.loans.disburse_loan(claims(&caller), request).await?))
}
