//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop for the OAuth connector.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{delete, get},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::handlers::{self, authorize, integrations};
use crate::oauth::{OAuthConnector, ProviderClient};
use crate::repositories::{MembershipRepository, SeaOrmTokenStore};
use crate::telemetry::{TRACE_ID_HEADER, trace_id_middleware};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub connector: Arc<OAuthConnector>,
}

impl AppState {
    /// Wires the connector onto the database-backed token store and
    /// membership table.
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> anyhow::Result<Self> {
        let key_bytes = config
            .crypto_key
            .clone()
            .ok_or_else(|| anyhow!("DEALROOM_CRYPTO_KEY is required"))?;
        let crypto_key = CryptoKey::new(key_bytes).context("Invalid token encryption key")?;

        let shared_db = Arc::new(db.clone());
        let store = Arc::new(SeaOrmTokenStore::new(shared_db.clone(), crypto_key));
        let membership = Arc::new(MembershipRepository::new(shared_db));
        let client =
            ProviderClient::new(config.http_timeout()).context("Failed to build HTTP client")?;

        let connector = Arc::new(OAuthConnector::new(
            config.clone(),
            store,
            membership,
            client,
        ));

        Ok(Self {
            config,
            db,
            connector,
        })
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let mut app = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/auth/{provider}",
            get(authorize::start_authorization).post(authorize::start_authorization),
        )
        .route("/auth/{provider}/callback", get(authorize::oauth_callback))
        .route("/integrations/{provider}", delete(integrations::disconnect))
        .route(
            "/integrations/{provider}/status",
            get(integrations::connection_status),
        )
        .route(
            "/integrations/{provider}/identity",
            get(integrations::connection_identity),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id_middleware))
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    let origin = match config.frontend_origin.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(_) => {
            tracing::warn!(
                frontend_origin = %config.frontend_origin,
                "Frontend origin is not a valid header value; CORS disabled"
            );
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE, TRACE_ID_HEADER])
            .expose_headers([TRACE_ID_HEADER])
            .allow_credentials(true),
    )
}

/// Serves the API until `shutdown` is cancelled
pub async fn run_server(
    config: Arc<AppConfig>,
    db: DatabaseConnection,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config.bind_addr().context("Invalid server address")?;
    let state = AppState::new(config.clone(), db)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::authorize::start_authorization,
        crate::handlers::authorize::oauth_callback,
        crate::handlers::integrations::connection_status,
        crate::handlers::integrations::connection_identity,
        crate::handlers::integrations::disconnect,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::handlers::integrations::ConnectionStatusResponse,
            crate::oauth::IdentityProfile,
            crate::oauth::ProviderKind,
            crate::error::ApiError,
            crate::error::ProviderError,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Dealroom OAuth Connector API",
        description = "Provider authorization, token status and disconnect for Dealroom accounts",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
