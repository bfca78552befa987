pub mod account;
pub mod order;
pub mod ws;

use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

/// `{result, data}` body; a missing value is sent as `{}`.
pub(crate) fn data_response<T: Serialize>(result: bool, data: Option<T>) -> Json<Value> {
    let data = data
        .and_then(|value| serde_json::to_value(value).ok())
        .unwrap_or_else(|| json!({}));
    Json(json!({ "result": result, "data": data }))
}
