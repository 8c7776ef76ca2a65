//! Process wiring for the Alerta server: shared state, account seeding and
//! the HTTP/WebSocket router.

pub mod config;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use alerta_api::media::{MAX_MEDIA_BYTES, MEDIA_URL_PREFIX, MediaStore};
use alerta_api::middleware::require_auth;
use alerta_api::{AppState, AppStateInner, auth, reports};
use alerta_db::NewUser;
use alerta_gateway::{ConnectionSettings, connection};
use alerta_types::api::HealthResponse;
use alerta_types::models::{MAX_MEDIA_PER_REPORT, Role};

use crate::config::{Config, SeedAccount, demo_citizen};

/// Room for a full set of attachments plus the text fields.
const MAX_REQUEST_BYTES: usize = MAX_MEDIA_PER_REPORT * MAX_MEDIA_BYTES + 1024 * 1024;

/// Create the media directory, wire the stores and seed configured accounts.
/// Fails if the media directory cannot be created.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let media = MediaStore::new(config.upload_dir.clone())
        .await
        .with_context(|| format!("cannot create upload directory {}", config.upload_dir.display()))?;

    let state = Arc::new(AppStateInner::new(&config.jwt_secret, media));

    if let Some(admin) = &config.admin {
        seed_account(&state, admin, Role::Admin)?;
    }
    if config.seed_demo {
        seed_account(&state, &demo_citizen(), Role::Citizen)?;
    }

    Ok(state)
}

fn seed_account(state: &AppStateInner, account: &SeedAccount, role: Role) -> anyhow::Result<()> {
    let profile = NewUser {
        email: account.email.clone(),
        phone: account.phone.clone(),
        national_id: account.national_id.clone(),
        display_name: account.display_name.clone(),
    };
    let user = state
        .identities
        .seed(profile, &account.password, role)
        .with_context(|| format!("cannot seed {role} account {}", account.email))?;

    info!("Seeded {} account {} ({})", role, user.email, user.id);
    Ok(())
}

/// Build the full router. `allowed_origin` restricts CORS to one origin;
/// `None` is permissive.
pub fn app(state: AppState, allowed_origin: Option<&str>) -> anyhow::Result<Router> {
    let cors = match allowed_origin {
        Some(origin) => {
            let origin: HeaderValue = origin
                .parse()
                .with_context(|| format!("invalid CORS origin {origin:?}"))?;
            CorsLayer::new()
                .allow_origin(AllowOrigin::exact(origin))
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        }
        None => CorsLayer::permissive(),
    };

    // Routes
    let public_routes = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/reports", get(reports::list_reports).post(reports::create_report))
        .route("/my-reports", get(reports::my_reports))
        .route("/reports/{id}/status", put(reports::update_status))
        .route("/reports/{id}", delete(reports::delete_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .nest_service(MEDIA_URL_PREFIX, ServeDir::new(state.media.dir()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

async fn index() -> impl IntoResponse {
    Json(json!({ "status": "Alerta API running" }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let verifier = state.token_verifier();
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, dispatcher, verifier, ConnectionSettings::default())
    })
}
