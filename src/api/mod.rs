//! HTTP/JSON surface over the minting ledger.
//!
//! The API is the worker's only view of the ledger: it fetches its job queue
//! from `/api/pending-mints` and reports finished inscriptions to
//! `/api/confirm-mint`. `/api/status` and `/api/minted` exist for operators,
//! as do the HTML index and the Swagger UI at `/swagger-ui`
//! (`/openapi.json` carries the raw specification).

use axum::{Router, routing::get, routing::post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::daemon::MonitorStatus;
use crate::db::SqlitePool;
use std::sync::Arc;

mod error;
pub mod mints;
pub mod types;

pub use error::ApiError;

/// State shared by every API handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub status: Arc<MonitorStatus>,
    pub watched_address: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        mints::api_pending_mints,
        mints::api_confirm_mint,
        mints::api_status,
        mints::api_minted,
    ),
    components(
        schemas(
            crate::models::TransactionRecord,
            crate::models::MintStatus,
            types::PendingMintItem,
            types::ConfirmMintRequest,
            types::ConfirmMintResponse,
            types::StatusResponse,
            error::ApiError,
        )
    ),
    tags(
        (name = "mints", description = "Bitbar minting ledger API"),
    )
)]
pub struct ApiDoc;

/// Builds the monitor's router: minting API, HTML index, Swagger UI.
pub fn create_router(db_pool: SqlitePool, status: Arc<MonitorStatus>, watched_address: String) -> Router {
    let app_state = AppState {
        db_pool,
        status,
        watched_address,
    };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()))
        .route("/", get(mints::index))
        .route("/api/pending-mints", get(mints::api_pending_mints))
        .route("/api/confirm-mint", post(mints::api_confirm_mint))
        .route("/api/status", get(mints::api_status))
        .route("/api/minted", get(mints::api_minted))
        .with_state(app_state)
}
