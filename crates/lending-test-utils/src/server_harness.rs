//! Test harnesses for service-level and end-to-end tests.
//!
//! `TestLendingApp` wires the real services over in-memory stores, the
//! fixture signing keys and a recording mailer, and runs the notification
//! worker. `TestLendingServer` additionally serves the HTTP router and the
//! gRPC services on ephemeral ports.
//!
//! # Example
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_loan_flow_e2e() -> Result<(), anyhow::Error> {
//!     let app = TestLendingApp::new();
//!     let server = TestLendingServer::spawn(&app).await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

use crate::crypto_fixtures::test_jwt_config;
use crate::mailer::RecordingMailer;
use crate::memory_stores::{InMemoryLedgerStore, InMemoryUserStore, TEST_BCRYPT_COST};
use crate::test_ids::TEST_COUNTRY_CODE;
use axum::Router;
use lending_service::auth::{
    derive_jwks, Claims, StaticKeySource, TokenIssuer, TokenSubject, TokenType, TokenVerifier,
};
use lending_service::config::{DEFAULT_AUTH_EXCLUDED_METHODS, JwtConfig};
use lending_service::grpc::{AuthGrpcService, GrpcAuthLayer, LoanGrpcService, UserGrpcService};
use lending_service::models::{Jwks, User};
use lending_service::observability::health::HealthState;
use lending_service::observability::request::grpc_request_layers;
use lending_service::routes::{build_routes, AppState};
use lending_service::services::{
    AuthService, LoanService, NotificationDispatcher, NotificationWorker, UserService,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use proto_gen::lending::auth_service_server::AuthServiceServer;
use proto_gen::lending::loan_service_server::LoanServiceServer;
use proto_gen::lending::user_service_server::UserServiceServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

pub const TEST_NOTIFICATION_FROM: &str = "loan@service.com";

/// The service graph over in-memory stores.
///
/// Must be created inside a Tokio runtime: the notification worker is
/// spawned immediately.
pub struct TestLendingApp {
    pub ledger: Arc<InMemoryLedgerStore>,
    pub user_store: Arc<InMemoryUserStore>,
    pub mailer: Arc<RecordingMailer>,
    pub issuer: Arc<TokenIssuer>,
    pub verifier: Arc<TokenVerifier>,
    pub health: Arc<HealthState>,
    pub jwks: Jwks,
    pub auth: AuthService,
    pub users: UserService,
    pub loans: LoanService,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl TestLendingApp {
    pub fn new() -> Self {
        Self::with_jwt_config(&test_jwt_config())
    }

    pub fn with_jwt_config(jwt: &JwtConfig) -> Self {
        let ledger = Arc::new(InMemoryLedgerStore::new());
        let user_store = Arc::new(InMemoryUserStore::new());
        let mailer = Arc::new(RecordingMailer::new());

        let jwks = derive_jwks(&jwt.keys).expect("fixture keys derive a JWKS");
        let issuer = Arc::new(TokenIssuer::from_config(jwt).expect("fixture issuer"));
        let verifier = Arc::new(TokenVerifier::new(
            Arc::new(StaticKeySource::new(&jwks)),
            jwt.access_token_issuer.clone(),
            jwt.refresh_token_issuer.clone(),
        ));

        let (dispatcher, rx) = NotificationDispatcher::channel(64);
        let worker = NotificationWorker::new(
            ledger.clone(),
            user_store.clone(),
            mailer.clone(),
            TEST_NOTIFICATION_FROM.to_string(),
            rx,
        );
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(worker.run(shutdown.child_token()));

        let auth = AuthService::new(
            user_store.clone(),
            Arc::clone(&issuer),
            Arc::clone(&verifier),
            TEST_BCRYPT_COST,
            TEST_COUNTRY_CODE.to_string(),
        );
        let users = UserService::new(user_store.clone(), TEST_COUNTRY_CODE.to_string());
        let loans = LoanService::new(ledger.clone(), dispatcher);

        let health = Arc::new(HealthState::new());
        health.set_ready();

        Self {
            ledger,
            user_store,
            mailer,
            issuer,
            verifier,
            health,
            jwks,
            auth,
            users,
            loans,
            shutdown,
            worker,
        }
    }

    /// Access claims for `user`, as the verifier would produce them.
    pub fn claims_for(&self, user: &User) -> Claims {
        self.issuer
            .build_claims(&TokenSubject::from(user), TokenType::Access, false)
    }

    /// Signed access token for `user`.
    pub fn access_token_for(&self, user: &User) -> String {
        self.issuer
            .issue(&TokenSubject::from(user), TokenType::Access, false)
            .expect("fixture key signs")
    }

    /// The HTTP router with a private metrics registry.
    pub fn router(&self) -> Router {
        let metrics = PrometheusBuilder::new().build_recorder().handle();
        build_routes(Arc::new(AppState {
            jwks: self.jwks.clone(),
            ledger: self.ledger.clone(),
            health: Arc::clone(&self.health),
            metrics,
            verifier: Arc::clone(&self.verifier),
            auth: self.auth.clone(),
            users: self.users.clone(),
            loans: self.loans.clone(),
        }))
    }

    /// Stop the notification worker and wait for it.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.worker.await.expect("notification worker panicked");
    }
}

impl Default for TestLendingApp {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP and gRPC listeners on 127.0.0.1 ephemeral ports.
pub struct TestLendingServer {
    http_addr: SocketAddr,
    grpc_addr: SocketAddr,
    shutdown: CancellationToken,
    _http: JoinHandle<()>,
    _grpc: JoinHandle<()>,
}

impl TestLendingServer {
    pub async fn spawn(app: &TestLendingApp) -> Result<Self, anyhow::Error> {
        let shutdown = CancellationToken::new();

        let http_listener = TcpListener::bind("127.0.0.1:0").await?;
        let http_addr = http_listener.local_addr()?;
        let router = app.router();
        let http_token = shutdown.child_token();
        let http = tokio::spawn(async move {
            axum::serve(http_listener, router)
                .with_graceful_shutdown(async move { http_token.cancelled().await })
                .await
                .expect("test HTTP server failed");
        });

        let grpc_listener = TcpListener::bind("127.0.0.1:0").await?;
        let grpc_addr = grpc_listener.local_addr()?;
        let excluded: Vec<String> = DEFAULT_AUTH_EXCLUDED_METHODS
            .split(',')
            .map(String::from)
            .collect();
        let grpc_server = tonic::transport::Server::builder()
            .layer(grpc_request_layers())
            .layer(GrpcAuthLayer::new(Arc::clone(&app.verifier), &excluded))
            .add_service(AuthServiceServer::new(AuthGrpcService::new(
                app.auth.clone(),
            )))
            .add_service(UserServiceServer::new(UserGrpcService::new(
                app.users.clone(),
            )))
            .add_service(LoanServiceServer::new(LoanGrpcService::new(
                app.loans.clone(),
            )));
        let grpc_token = shutdown.child_token();
        let grpc = tokio::spawn(async move {
            grpc_server
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(grpc_listener),
                    grpc_token.cancelled_owned(),
                )
                .await
                .expect("test gRPC server failed");
        });

        Ok(Self {
            http_addr,
            grpc_addr,
            shutdown,
            _http: http,
            _grpc: grpc,
        })
    }

    /// Base URL of the HTTP server.
    pub fn url(&self) -> String {
        format!("http://{}", self.http_addr)
    }

    /// Endpoint for tonic clients.
    pub fn grpc_url(&self) -> String {
        format!("http://{}", self.grpc_addr)
    }
}

impl Drop for TestLendingServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
