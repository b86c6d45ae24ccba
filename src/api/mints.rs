//! Minting API endpoint handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/pending-mints` | Job queue for the minter worker |
//! | POST | `/api/confirm-mint` | Record an inscription id for a pending mint |
//! | GET | `/api/status` | Counters, uptime, last poll time |
//! | GET | `/api/minted` | Completed mints, newest first |

use axum::{Json, extract::State, response::Html};
use num_format::{Locale, ToFormattedString};

use super::AppState;
use super::error::ApiError;
use super::types::{ConfirmMintRequest, ConfirmMintResponse, PendingMintItem, StatusResponse};
use crate::db;
use crate::models::TransactionRecord;

/// Lists the transactions awaiting an inscription, oldest first.
#[utoipa::path(
    get,
    path = "/api/pending-mints",
    responses(
        (status = 200, description = "Pending mints, oldest first", body = [PendingMintItem]),
        (status = 500, description = "Ledger failure", body = ApiError),
    ),
    tag = "mints",
)]
pub async fn api_pending_mints(State(state): State<AppState>) -> Result<Json<Vec<PendingMintItem>>, ApiError> {
    let conn = state.db_pool.get().map_err(db::LedgerError::from)?;
    let pending = db::list_pending(&conn)?;
    Ok(Json(pending.into_iter().map(PendingMintItem::from).collect()))
}

/// Transitions a pending transaction to completed, binding the inscription id.
#[utoipa::path(
    post,
    path = "/api/confirm-mint",
    request_body = ConfirmMintRequest,
    responses(
        (status = 200, description = "Mint recorded", body = ConfirmMintResponse),
        (status = 400, description = "Missing field or already completed", body = ApiError),
        (status = 404, description = "Unknown txid", body = ApiError),
    ),
    tag = "mints",
)]
pub async fn api_confirm_mint(
    State(state): State<AppState>,
    Json(request): Json<ConfirmMintRequest>,
) -> Result<Json<ConfirmMintResponse>, ApiError> {
    let txid = match request.txid.as_deref() {
        Some(txid) if !txid.is_empty() => txid,
        _ => return Err(ApiError::MissingField("txid".to_string())),
    };
    let inscription_id = match request.inscription_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(ApiError::MissingField("inscription_id".to_string())),
    };

    let mut conn = state.db_pool.get().map_err(db::LedgerError::from)?;
    match db::confirm_mint(&mut conn, txid, inscription_id)? {
        db::ConfirmOutcome::Confirmed(transaction) => Ok(Json(ConfirmMintResponse {
            success: true,
            transaction: *transaction,
        })),
        db::ConfirmOutcome::AlreadyCompleted => Err(ApiError::AlreadyCompleted(txid.to_string())),
        db::ConfirmOutcome::NotFound => Err(ApiError::TransactionNotFound(txid.to_string())),
    }
}

/// Monitor health: ledger counters, uptime, last successful poll.
#[utoipa::path(
    get,
    path = "/api/status",
    responses((status = 200, body = StatusResponse)),
    tag = "mints",
)]
pub async fn api_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let conn = state.db_pool.get().map_err(db::LedgerError::from)?;
    let counts = db::count_transactions(&conn)?;
    Ok(Json(StatusResponse {
        total_transactions: counts.total,
        pending_mints: counts.pending,
        uptime: state.status.uptime_secs(),
        last_check: state.status.last_check_ms(),
    }))
}

/// Completed mints, newest first.
#[utoipa::path(
    get,
    path = "/api/minted",
    responses((status = 200, body = [TransactionRecord])),
    tag = "mints",
)]
pub async fn api_minted(State(state): State<AppState>) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    let conn = state.db_pool.get().map_err(db::LedgerError::from)?;
    Ok(Json(db::list_completed(&conn)?))
}

/// Minimal deposit page: the watched address plus recent mints.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let conn = state.db_pool.get().map_err(db::LedgerError::from)?;
    let counts = db::count_transactions(&conn)?;
    let completed = db::list_completed(&conn)?;

    let mut rows = String::new();
    for record in completed.iter().take(25) {
        rows.push_str(&format!(
            "<tr><td><code>{}</code></td><td>{} sats</td><td><code>{}</code></td></tr>\n",
            record.txid,
            record.amount_sats.to_formatted_string(&Locale::en),
            record.inscription_id.as_deref().unwrap_or("-"),
        ));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Bitbar monitor</title></head>
<body>
<h1>Bitbar deposit monitor</h1>
<p>Send to <code>{address}</code> to receive a bitbar inscription.</p>
<p>{total} transactions seen, {pending} mints pending.</p>
<h2>Recent mints</h2>
<table>
<tr><th>txid</th><th>amount</th><th>inscription</th></tr>
{rows}
</table>
</body>
</html>"#,
        address = state.watched_address,
        total = counts.total,
        pending = counts.pending,
        rows = rows,
    );

    Ok(Html(html))
}
