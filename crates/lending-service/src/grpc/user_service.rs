//! `lending.v1.UserService` implementation.

use crate::grpc::{caller_claims, id_to_wire, recover};
use crate::models::IsUserExistRequest;
use crate::services::UserService;
use proto_gen::lending;
use proto_gen::lending::user_service_server::UserService as UserServiceRpc;
use tonic::{Request, Response, Status};
use tracing::instrument;

pub struct UserGrpcService {
    service: UserService,
}

impl UserGrpcService {
    pub fn new(service: UserService) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl UserServiceRpc for UserGrpcService {
    #[instrument(skip_all, name = "lending.grpc.is_user_exist")]
    async fn is_user_exist(
        &self,
        request: Request<lending::IsUserExistRequest>,
    ) -> Result<Response<lending::IsUserExistResponse>, Status> {
        let service = self.service.clone();
        let wire = request.into_inner();

        recover("IsUserExist", async move {
            let response = service
                .is_user_exist(IsUserExistRequest {
                    email: wire.email,
                    phone_number: wire.phone_number,
                })
                .await?;
            Ok(lending::IsUserExistResponse {
                is_exist: response.is_exist,
                reasons: response.reasons,
            })
        })
        .await
    }

    #[instrument(skip_all, name = "lending.grpc.close_account")]
    async fn close_account(
        &self,
        request: Request<lending::CloseAccountRequest>,
    ) -> Result<Response<lending::CloseAccountResponse>, Status> {
        let caller = caller_claims(&request);
        let service = self.service.clone();

        recover("CloseAccount", async move {
            let response = service.close_account(caller.as_ref()).await?;
            Ok(lending::CloseAccountResponse {
                user_id: id_to_wire(response.user_id),
                status: response.status.to_string(),
            })
        })
        .await
    }
}
