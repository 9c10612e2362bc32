//! REST API Handlers
//!
//! Northbound endpoints for docks, pools, profiles, volumes, attachments
//! and snapshots, all under `/v1alpha`. The API version catalogue is served
//! under `/api`.

use crate::controlplane::controller::{
    Controller, CreateAttachmentInput, CreateSnapshotInput, CreateVolumeInput,
};
use crate::domain::model::{ExtraSpec, HostInfo, ProfileSpec};
use crate::error::{Error, ErrorKind};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Prefix of every northbound route
pub const API_PREFIX: &str = "/v1alpha";

/// Prefix of the API version catalogue
pub const VERSIONS_PREFIX: &str = "/api";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Selects the volume an attachment belongs to
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeQuery {
    pub volume_id: String,
}

/// Attachment update body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAttachmentRequest {
    pub mountpoint: String,
    pub host_info: HostInfo,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error returned by a handler
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation | ErrorKind::NoSupportedPool | ErrorKind::NoSupportedDock => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ApiErrorResponse {
                error: self.0.kind().to_string(),
                message: self.0.to_string(),
                details: None,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    controller: Arc<Controller>,
}

impl RestRouter {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            controller: self.controller,
        };

        let api = Router::new()
            // Docks and pools
            .route("/docks", get(list_docks))
            .route("/docks/:id", get(get_dock))
            .route("/block/pools", get(list_pools))
            .route("/block/pools/:id", get(get_pool))
            // Profiles
            .route("/profiles", get(list_profiles).post(create_profile))
            .route(
                "/profiles/:id",
                get(get_profile).put(update_profile).delete(delete_profile),
            )
            .route(
                "/profiles/:id/extras",
                get(list_extra_properties).post(add_extra_properties),
            )
            .route("/profiles/:id/extras/:key", delete(remove_extra_property))
            // Volumes
            .route("/block/volumes", get(list_volumes).post(create_volume))
            .route("/block/volumes/:id", get(get_volume).delete(delete_volume))
            // Attachments
            .route(
                "/block/attachments",
                get(list_attachments).post(create_attachment),
            )
            .route(
                "/block/attachments/:id",
                get(get_attachment)
                    .put(update_attachment)
                    .delete(delete_attachment),
            )
            // Snapshots
            .route("/block/snapshots", get(list_snapshots).post(create_snapshot))
            .route(
                "/block/snapshots/:id",
                get(get_snapshot).delete(delete_snapshot),
            );

        let versions = Router::new()
            .route("/", get(list_versions))
            .route("/:api_version", get(get_version));

        Router::new()
            .nest(VERSIONS_PREFIX, versions)
            .nest(API_PREFIX, api)
            .route("/health", get(health_check))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    controller: Arc<Controller>,
}

// =============================================================================
// Handlers: API versions
// =============================================================================

async fn list_versions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.list_versions())
}

async fn get_version(
    State(state): State<AppState>,
    Path(api_version): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.get_version(&api_version)?))
}

// =============================================================================
// Handlers: docks and pools
// =============================================================================

async fn list_docks(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_docks().await?))
}

async fn get_dock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.get_dock(&id).await?))
}

async fn list_pools(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_pools().await?))
}

async fn get_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.get_pool(&id).await?))
}

// =============================================================================
// Handlers: profiles
// =============================================================================

async fn create_profile(
    State(state): State<AppState>,
    Json(profile): Json<ProfileSpec>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.controller.create_profile(profile).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn list_profiles(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_profiles().await?))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.get_profile(&id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ProfileSpec>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.update_profile(&id, &input).await?))
}

async fn delete_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.controller.delete_profile(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_extra_properties(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(extra): Json<ExtraSpec>,
) -> ApiResult<impl IntoResponse> {
    let extra = state.controller.add_extra_properties(&id, extra).await?;
    Ok((StatusCode::CREATED, Json(extra)))
}

async fn list_extra_properties(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_extra_properties(&id).await?))
}

async fn remove_extra_property(
    State(state): State<AppState>,
    Path((id, key)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.controller.remove_extra_property(&id, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Handlers: volumes
// =============================================================================

async fn create_volume(
    State(state): State<AppState>,
    Json(input): Json<CreateVolumeInput>,
) -> ApiResult<impl IntoResponse> {
    info!("Creating volume {} ({} GiB)", input.name, input.size);
    let volume = state.controller.create_volume(input).await?;
    Ok((StatusCode::CREATED, Json(volume)))
}

async fn list_volumes(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_volumes().await?))
}

async fn get_volume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.get_volume(&id).await?))
}

async fn delete_volume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    info!("Deleting volume {}", id);
    state.controller.delete_volume(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Handlers: attachments
// =============================================================================

async fn create_attachment(
    State(state): State<AppState>,
    Json(input): Json<CreateAttachmentInput>,
) -> ApiResult<impl IntoResponse> {
    let attachment = state.controller.create_attachment(input).await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

async fn list_attachments(
    State(state): State<AppState>,
    Query(query): Query<VolumeQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_attachments(&query.volume_id).await?))
}

async fn get_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VolumeQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state.controller.get_attachment(&query.volume_id, &id).await?,
    ))
}

async fn update_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VolumeQuery>,
    Json(input): Json<UpdateAttachmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let attachment = state
        .controller
        .update_attachment(&query.volume_id, &id, &input.mountpoint, &input.host_info)
        .await?;
    Ok(Json(attachment))
}

async fn delete_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VolumeQuery>,
) -> ApiResult<impl IntoResponse> {
    state
        .controller
        .delete_attachment(&query.volume_id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Handlers: snapshots
// =============================================================================

async fn create_snapshot(
    State(state): State<AppState>,
    Json(input): Json<CreateSnapshotInput>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = state.controller.create_snapshot(input).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn list_snapshots(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_snapshots().await?))
}

async fn get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.get_snapshot(&id).await?))
}

async fn delete_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.controller.delete_snapshot(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
