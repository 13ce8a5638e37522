//! Address lookup endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub address: String,
    pub known: bool,
    pub notified: bool,
}

/// GET /addresses/{address} - whether the relay has seen an address
pub async fn address_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AddressResponse>> {
    let book = state.book.lock().await;
    let known = book.is_known(&address);
    let notified = book.notified().contains(&address);

    if !known && !notified {
        return Err(AppError::NotFound(format!("address {} is not tracked", address)));
    }

    Ok(Json(AddressResponse {
        address,
        known,
        notified,
    }))
}
