use crate::handlers::{account, order, ws};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/contract", get(account::get_contract))
        .route("/position", get(account::get_position))
        .route("/account", get(account::get_account))
        .route("/health", get(account::get_health))
        .route("/query_order", get(order::query_order))
        .route("/open_order", get(order::open_orders))
        .route("/make_order", post(order::make_order))
        .route("/cancel_order", post(order::cancel_order));

    let stream_routes = Router::new()
        .route("/trade", get(ws::trade_ws))
        .route("/depth", get(ws::depth_ws))
        .route("/candle_stick", get(ws::candle_ws))
        .route("/order", get(ws::order_ws));

    Router::new()
        .merge(api_routes)
        .merge(stream_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
