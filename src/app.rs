use crate::catalog::{CatalogPage, CatalogService, DetailOutcome};
use crate::config::Config;
use crate::episodes::EpisodeLookup;
use crate::error::CatalogError;
use crate::home::{self, HomeRows};
use crate::models::{Country, Episode, Genre, MediaKind, Provider};
use crate::query::{FilterParams, FilterState};
use crate::tmdb::{TmdbApi, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub episodes: Arc<EpisodeLookup>,
}

impl AppState {
    pub fn new(api: Arc<dyn TmdbApi>, region: impl Into<String>) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(api.clone(), region)),
            episodes: Arc::new(EpisodeLookup::new(api)),
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_config(&config)?);
    info!(
        language = %config.language,
        region = %config.region,
        "TMDB client ready"
    );
    let state = AppState::new(tmdb, config.region.clone());
    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/home", get(home_rows))
        .route("/api/countries", get(countries))
        .route("/api/movies", get(browse_movies))
        .route("/api/movies/genres", get(movie_genres))
        .route("/api/movies/providers", get(movie_providers))
        .route("/api/movies/:id", get(movie_detail))
        .route("/api/series", get(browse_series))
        .route("/api/series/genres", get(series_genres))
        .route("/api/series/providers", get(series_providers))
        .route("/api/series/:id", get(series_detail))
        .route("/api/series/:id/season/:season", get(season_episodes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Maps catalog failures onto HTTP: bad filters are the caller's fault,
/// everything else is an upstream problem.
pub struct ApiError(CatalogError);

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_invalid_filter() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        if status.is_server_error() {
            error!("Upstream failure: {}", self.0);
        } else {
            warn!("Rejected request: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

async fn health() -> &'static str {
    "OK"
}

async fn home_rows(State(state): State<AppState>) -> Json<HomeRows> {
    Json(home::load_home(&state.catalog).await)
}

async fn countries(State(state): State<AppState>) -> ApiResult<Vec<Country>> {
    Ok(Json(state.catalog.countries().await?))
}

async fn browse(state: &AppState, kind: MediaKind, params: FilterParams) -> ApiResult<CatalogPage> {
    let filter = FilterState::try_from(params)?;
    let page = state.catalog.browse(kind, &filter).await?;
    if !page.warnings.is_empty() {
        warn!(
            %kind,
            degraded = page.warnings.len(),
            "Catalog page served with degraded items"
        );
    }
    Ok(Json(page))
}

async fn browse_movies(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> ApiResult<CatalogPage> {
    browse(&state, MediaKind::Movie, params).await
}

async fn browse_series(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> ApiResult<CatalogPage> {
    browse(&state, MediaKind::Series, params).await
}

async fn movie_genres(State(state): State<AppState>) -> ApiResult<Vec<Genre>> {
    Ok(Json(state.catalog.genres(MediaKind::Movie).await?))
}

async fn series_genres(State(state): State<AppState>) -> ApiResult<Vec<Genre>> {
    Ok(Json(state.catalog.genres(MediaKind::Series).await?))
}

async fn movie_providers(State(state): State<AppState>) -> ApiResult<Vec<Provider>> {
    Ok(Json(state.catalog.providers(MediaKind::Movie).await?))
}

async fn series_providers(State(state): State<AppState>) -> ApiResult<Vec<Provider>> {
    Ok(Json(state.catalog.providers(MediaKind::Series).await?))
}

async fn movie_detail(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<DetailOutcome> {
    Ok(Json(state.catalog.open_detail(MediaKind::Movie, id).await?))
}

async fn series_detail(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<DetailOutcome> {
    state.episodes.open_series(id).await;
    Ok(Json(state.catalog.open_detail(MediaKind::Series, id).await?))
}

async fn season_episodes(
    State(state): State<AppState>,
    Path((id, season)): Path<(u64, u32)>,
) -> ApiResult<Vec<Episode>> {
    Ok(Json(state.episodes.fetch_episodes(id, season).await?))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
