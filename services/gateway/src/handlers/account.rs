use crate::error::AppError;
use crate::handlers::data_response;
use crate::state::AppState;
use axum::{Json, extract::State};
use serde_json::Value;
use session::SessionStatus;

pub async fn get_contract(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let contract = state.session.contract().await?;
    Ok(data_response(true, contract))
}

pub async fn get_position(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let position = state.session.position().await?;
    Ok(data_response(true, position))
}

pub async fn get_account(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let account = state.session.account().await?;
    Ok(data_response(true, Some(account)))
}

/// Connection and supervisor state for operators.
pub async fn get_health(State(state): State<AppState>) -> Result<Json<SessionStatus>, AppError> {
    Ok(Json(state.session.status().await?))
}
