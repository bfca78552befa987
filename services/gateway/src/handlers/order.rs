use crate::error::AppError;
use crate::handlers::data_response;
use crate::models::{
    CancelOrderRequest, CancelOrderResponse, MakeOrderRequest, MakeOrderResponse,
    QueryOrderParams,
};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
};
use serde_json::Value;
use session::SessionError;
use tracing::{info, warn};
use types::errors::ValidationError;
use types::ids::OrderId;
use types::order::{OrderRecord, OrderTicket};

/// Client-facing text for a body that could not be read as JSON fields
const INVALID_BODY: &str = "invalid request body";

fn parse_order_id(raw: &str) -> Option<OrderId> {
    raw.trim().parse::<OrderId>().ok().filter(OrderId::is_valid)
}

pub async fn query_order(
    State(state): State<AppState>,
    Query(params): Query<QueryOrderParams>,
) -> Result<Json<Value>, AppError> {
    let record = match parse_order_id(&params.order_id) {
        Some(order_id) => state.session.query_order(order_id).await?,
        None => None,
    };
    Ok(data_response(record.is_some(), record.as_deref()))
}

pub async fn open_orders(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let orders = state.session.open_orders().await?;
    let records: Vec<&OrderRecord> = orders.iter().map(|order| order.as_ref()).collect();
    Ok(data_response(true, Some(records)))
}

pub async fn make_order(
    State(state): State<AppState>,
    payload: Result<Json<MakeOrderRequest>, JsonRejection>,
) -> Result<Json<MakeOrderResponse>, AppError> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Unreadable order entry");
            return Ok(Json(MakeOrderResponse::rejected(INVALID_BODY)));
        }
    };
    let ticket = match OrderTicket::parse(
        &payload.direction,
        &payload.order_type,
        &payload.price,
        &payload.volume,
    ) {
        Ok(ticket) => ticket,
        Err(e) => {
            info!(error = %e, direction = %payload.direction, order_type = %payload.order_type, "Order entry refused");
            return Ok(Json(MakeOrderResponse::rejected(e.to_string())));
        }
    };

    let order_id = state.session.place_order(ticket).await?;
    Ok(Json(MakeOrderResponse::accepted(order_id.value())))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    payload: Result<Json<CancelOrderRequest>, JsonRejection>,
) -> Result<Json<CancelOrderResponse>, AppError> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Unreadable cancel request");
            return Ok(Json(CancelOrderResponse {
                result: false,
                order_id: String::new(),
                err_msg: INVALID_BODY.to_string(),
            }));
        }
    };
    let result = match parse_order_id(&payload.order_id) {
        Some(order_id) => state.session.cancel_order(order_id).await,
        None => Err(ValidationError::InvalidOrderId.into()),
    };

    let err_msg = match result {
        Ok(()) => String::new(),
        Err(SessionError::RuntimeUnavailable) => return Err(AppError::Unavailable),
        Err(e) => e.to_string(),
    };
    Ok(Json(CancelOrderResponse {
        result: err_msg.is_empty(),
        order_id: payload.order_id,
        err_msg,
    }))
}
