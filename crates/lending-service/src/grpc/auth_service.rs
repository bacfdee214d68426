//! `lending.v1.AuthService` implementation.

use crate::errors::LendingError;
use crate::grpc::{caller_claims, recover};
use crate::models::{
    LoginRequest, RefreshTokenRequest, RegisterRequest, RegisterStatusCode, RegisterUserDetail,
    TokenPair,
};
use crate::services::AuthService;
use common::secret::SecretString;
use proto_gen::lending;
use proto_gen::lending::auth_service_server::AuthService as AuthServiceRpc;
use tonic::{Request, Response, Status};
use tracing::instrument;

pub struct AuthGrpcService {
    service: AuthService,
}

impl AuthGrpcService {
    pub fn new(service: AuthService) -> Self {
        Self { service }
    }
}

fn register_request(wire: lending::RegisterRequest) -> Result<RegisterRequest, LendingError> {
    let user = wire
        .user
        .ok_or_else(|| LendingError::Validation("user is required.".to_string()))?;

    Ok(RegisterRequest {
        user: RegisterUserDetail {
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
            password: SecretString::from(user.password),
            // Out-of-range ids fall through to the role check.
            role_id: u8::try_from(user.role_id).unwrap_or(u8::MAX),
        },
    })
}

fn register_status(code: RegisterStatusCode) -> lending::RegisterStatusCode {
    match code {
        RegisterStatusCode::Succeed => lending::RegisterStatusCode::Succeed,
        RegisterStatusCode::Failed => lending::RegisterStatusCode::Failed,
    }
}

#[tonic::async_trait]
impl AuthServiceRpc for AuthGrpcService {
    #[instrument(skip_all, name = "lending.grpc.register")]
    async fn register(
        &self,
        request: Request<lending::RegisterRequest>,
    ) -> Result<Response<lending::RegisterResponse>, Status> {
        let caller = caller_claims(&request);
        let service = self.service.clone();
        let wire = request.into_inner();

        recover("Register", async move {
            let response = service
                .register(caller.as_ref(), register_request(wire)?)
                .await?;
            Ok(lending::RegisterResponse {
                code: register_status(response.code).into(),
                reasons: response.reasons,
            })
        })
        .await
    }

    #[instrument(skip_all, name = "lending.grpc.login")]
    async fn login(
        &self,
        request: Request<lending::LoginRequest>,
    ) -> Result<Response<lending::LoginResponse>, Status> {
        let service = self.service.clone();
        let wire = request.into_inner();

        recover("Login", async move {
            let TokenPair {
                access_token,
                refresh_token,
            } = service
                .login(LoginRequest {
                    user_id: wire.user_id,
                    password: SecretString::from(wire.password),
                    remember_me: wire.remember_me,
                })
                .await?;
            Ok(lending::LoginResponse {
                access_token,
                refresh_token,
            })
        })
        .await
    }

    #[instrument(skip_all, name = "lending.grpc.refresh_token")]
    async fn refresh_token(
        &self,
        request: Request<lending::RefreshTokenRequest>,
    ) -> Result<Response<lending::RefreshTokenResponse>, Status> {
        let service = self.service.clone();
        let wire = request.into_inner();

        recover("RefreshToken", async move {
            let TokenPair {
                access_token,
                refresh_token,
            } = service
                .refresh_token(RefreshTokenRequest {
                    refresh_token: SecretString::from(wire.refresh_token),
                })
                .await?;
            Ok(lending::RefreshTokenResponse {
                access_token,
                refresh_token,
            })
        })
        .await
    }
}
