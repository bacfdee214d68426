//! Lending Service
//!
//! # Servers
//!
//! - gRPC server for the auth, user and loan RPCs (default: 0.0.0.0:50051)
//! - HTTP server for JWKS, health checks, metrics and the JSON gateway
//!   (default: 0.0.0.0:8080)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing and the Prometheus recorder
//! 3. Connect to PostgreSQL and run migrations
//! 4. Build token issuer/verifier and the JWKS
//! 5. Spawn the notification worker
//! 6. Start the HTTP and gRPC servers
//! 7. Wait for shutdown signal, then cancel everything

use lending_service::auth::{
    derive_jwks, JwksClient, KeySource, StaticKeySource, TokenIssuer, TokenVerifier,
};
use lending_service::config::Config;
use lending_service::grpc::{AuthGrpcService, GrpcAuthLayer, LoanGrpcService, UserGrpcService};
use lending_service::mail::{LogMailer, MailSender, SmtpMailer};
use lending_service::observability::health::HealthState;
use lending_service::observability::request::grpc_request_layers;
use lending_service::observability::{init_tracing, metrics::init_metrics_recorder};
use lending_service::repositories::{LedgerStore, PgLedgerStore, PgUserStore, UserStore};
use lending_service::routes::{self, AppState};
use lending_service::services::{
    AuthService, LoanService, NotificationDispatcher, NotificationWorker, UserService,
};
use proto_gen::lending::auth_service_server::AuthServiceServer;
use proto_gen::lending::loan_service_server::LoanServiceServer;
use proto_gen::lending::user_service_server::UserServiceServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(false);
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    init_tracing(config.log_json);
    info!("Starting Lending Service");

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to initialize metrics recorder");
        e
    })?;

    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            e
        })?;
    info!("Database ready");

    let ledger: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(db_pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(db_pool));

    // Tokens
    let jwks = derive_jwks(&config.jwt.keys)?;
    let issuer = Arc::new(TokenIssuer::from_config(&config.jwt)?);
    let key_source: Arc<dyn KeySource> = match &config.jwks_url {
        Some(url) => {
            info!(url = %url, "Verifying tokens against remote JWKS");
            Arc::new(JwksClient::new(url.clone(), config.jwks_cache_ttl))
        }
        None => Arc::new(StaticKeySource::new(&jwks)),
    };
    let verifier = Arc::new(TokenVerifier::new(
        key_source,
        config.jwt.access_token_issuer.clone(),
        config.jwt.refresh_token_issuer.clone(),
    ));
    info!(kid = %issuer.kid(), keys = jwks.keys.len(), "Signing keys loaded");

    let shutdown_token = CancellationToken::new();

    // Notifications
    let mailer: Arc<dyn MailSender> = if config.smtp.enabled {
        info!(host = %config.smtp.host, port = config.smtp.port, "SMTP delivery enabled");
        Arc::new(SmtpMailer::new(&config.smtp))
    } else {
        Arc::new(LogMailer)
    };
    let (dispatcher, notification_rx) =
        NotificationDispatcher::channel(config.notification_queue_capacity);
    let worker = NotificationWorker::new(
        Arc::clone(&ledger),
        Arc::clone(&users),
        mailer,
        config.notification_from.clone(),
        notification_rx,
    );
    let worker_token = shutdown_token.child_token();
    let worker_handle = tokio::spawn(worker.run(worker_token));

    // Services
    let auth_service = AuthService::new(
        Arc::clone(&users),
        Arc::clone(&issuer),
        Arc::clone(&verifier),
        config.bcrypt_cost,
        config.default_country_code.clone(),
    );
    let user_service = UserService::new(Arc::clone(&users), config.default_country_code.clone());
    let loan_service = LoanService::new(Arc::clone(&ledger), dispatcher);

    let health_state = Arc::new(HealthState::new());

    // HTTP server
    let http_addr: SocketAddr = config.http_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.http_bind_address, "Invalid HTTP bind address");
        e
    })?;
    let app = routes::build_routes(Arc::new(AppState {
        jwks,
        ledger: Arc::clone(&ledger),
        health: Arc::clone(&health_state),
        metrics: prometheus_handle,
        verifier: Arc::clone(&verifier),
        auth: auth_service.clone(),
        users: user_service.clone(),
        loans: loan_service.clone(),
    }));
    let listener = tokio::net::TcpListener::bind(http_addr).await.map_err(|e| {
        error!(error = %e, addr = %http_addr, "Failed to bind HTTP server");
        e
    })?;

    let http_shutdown_token = shutdown_token.child_token();
    let http_handle = tokio::spawn(async move {
        info!(addr = %http_addr, "HTTP server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            http_shutdown_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    // gRPC server
    let grpc_addr: SocketAddr = config.grpc_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.grpc_bind_address, "Invalid gRPC bind address");
        e
    })?;
    let grpc_listener = tokio::net::TcpListener::bind(grpc_addr).await.map_err(|e| {
        error!(error = %e, addr = %grpc_addr, "Failed to bind gRPC server");
        e
    })?;
    let grpc_shutdown_token = shutdown_token.child_token();
    let grpc_server = tonic::transport::Server::builder()
        .layer(grpc_request_layers())
        .layer(GrpcAuthLayer::new(
            Arc::clone(&verifier),
            &config.auth_excluded_methods,
        ))
        .add_service(AuthServiceServer::new(AuthGrpcService::new(auth_service)))
        .add_service(UserServiceServer::new(UserGrpcService::new(user_service)))
        .add_service(LoanServiceServer::new(LoanGrpcService::new(loan_service)))
        .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), async move {
            grpc_shutdown_token.cancelled().await;
            info!("gRPC server shutting down");
        });

    let grpc_handle = tokio::spawn(async move {
        info!(addr = %grpc_addr, "gRPC server starting");
        if let Err(e) = grpc_server.await {
            error!(error = %e, "gRPC server failed");
        }
    });

    // Both listeners are bound.
    health_state.set_ready();
    info!("Lending Service running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");
    health_state.set_not_ready();
    shutdown_token.cancel();

    for (name, handle) in [
        ("http", http_handle),
        ("grpc", grpc_handle),
        ("notifications", worker_handle),
    ] {
        if let Err(e) = handle.await {
            error!(task = name, error = %e, "Task ended abnormally");
        }
    }

    info!("Lending Service shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT"),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
