//! `lending.v1.LoanService` implementation.
//!
//! Amounts travel as decimal strings and are parsed by the loan service, so
//! both transports apply the same scale and bound checks.

use crate::grpc::{caller_claims, id_from_wire, id_to_wire, recover, timestamp};
use crate::models::{
    ApproveLoanRequest, CreateLoanRequest, DisburseLoanRequest, InvestInLoanRequest,
};
use crate::services::LoanService;
use proto_gen::lending;
use proto_gen::lending::loan_service_server::LoanService as LoanServiceRpc;
use tonic::{Request, Response, Status};
use tracing::instrument;

pub struct LoanGrpcService {
    service: LoanService,
}

impl LoanGrpcService {
    pub fn new(service: LoanService) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl LoanServiceRpc for LoanGrpcService {
    #[instrument(skip_all, name = "lending.grpc.create_loan")]
    async fn create_loan(
        &self,
        request: Request<lending::CreateLoanRequest>,
    ) -> Result<Response<lending::CreateLoanResponse>, Status> {
        let caller = caller_claims(&request);
        let service = self.service.clone();
        let wire = request.into_inner();

        recover("CreateLoan", async move {
            let response = service
                .create_loan(
                    caller.as_ref(),
                    CreateLoanRequest {
                        principal_amount: wire.principal_amount,
                    },
                )
                .await?;
            Ok(lending::CreateLoanResponse {
                loan_id: id_to_wire(response.loan_id),
                state: response.state.to_string(),
                created_at: Some(timestamp(response.created_at)),
            })
        })
        .await
    }

    #[instrument(skip_all, name = "lending.grpc.approve_loan")]
    async fn approve_loan(
        &self,
        request: Request<lending::ApproveLoanRequest>,
    ) -> Result<Response<lending::ApproveLoanResponse>, Status> {
        let caller = caller_claims(&request);
        let service = self.service.clone();
        let wire = request.into_inner();

        recover("ApproveLoan", async move {
            let response = service
                .approve_loan(
                    caller.as_ref(),
                    ApproveLoanRequest {
                        loan_id: id_from_wire(wire.loan_id)?,
                        photo_proof_link: wire.photo_proof_link,
                        interest_rate: wire.interest_rate,
                        roi: wire.roi,
                    },
                )
                .await?;
            Ok(lending::ApproveLoanResponse {
                loan_id: id_to_wire(response.loan_id),
                state: response.state.to_string(),
                approval_date: Some(timestamp(response.approval_date)),
            })
        })
        .await
    }

    #[instrument(skip_all, name = "lending.grpc.invest_in_loan")]
    async fn invest_in_loan(
        &self,
        request: Request<lending::InvestInLoanRequest>,
    ) -> Result<Response<lending::InvestInLoanResponse>, Status> {
        let caller = caller_claims(&request);
        let service = self.service.clone();
        let wire = request.into_inner();

        recover("InvestInLoan", async move {
            let response = service
                .invest_in_loan(
                    caller.as_ref(),
                    InvestInLoanRequest {
                        loan_id: id_from_wire(wire.loan_id)?,
                        amount: wire.amount,
                    },
                )
                .await?;
            Ok(lending::InvestInLoanResponse {
                loan_id: id_to_wire(response.loan_id),
                invested_amount: response.invested_amount.to_string(),
                state: response.state.to_string(),
            })
        })
        .await
    }

    #[instrument(skip_all, name = "lending.grpc.disburse_loan")]
    async fn disburse_loan(
        &self,
        request: Request<lending::DisburseLoanRequest>,
    ) -> Result<Response<lending::DisburseLoanResponse>, Status> {
        let caller = caller_claims(&request);
        let service = self.service.clone();
        let wire = request.into_inner();

        recover("DisburseLoan", async move {
            let response = service
                .disburse_loan(
                    caller.as_ref(),
                    DisburseLoanRequest {
                        loan_id: id_from_wire(wire.loan_id)?,
                        signed_agreement_link: wire.signed_agreement_link,
                    },
                )
                .await?;
            Ok(lending::DisburseLoanResponse {
                loan_id: id_to_wire(response.loan_id),
                state: response.state.to_string(),
                disbursement_date: Some(timestamp(response.disbursement_date)),
            })
        })
        .await
    }
}
