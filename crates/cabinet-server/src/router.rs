use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, post};
use axum::Router;
use cabinet_protocol::endpoints;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all cabinet endpoints.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler))
        .route(endpoints::STATUS, get(handler::status_handler))
        .route(endpoints::PUT, post(handler::put_handler))
        .route(endpoints::REGISTER, post(handler::register_handler))
        .route(endpoints::TICKET, get(handler::get_handler))
        .route(endpoints::TICKET_STREAM, get(handler::stream_handler))
        .route(endpoints::QUERY, post(handler::query_handler))
        .route(endpoints::LIST, get(handler::list_handler))
        .route(endpoints::OPEN, post(handler::open_handler))
        .route(endpoints::CLOSE, post(handler::close_handler))
        .route(endpoints::LOAD, post(handler::load_handler))
        .route(endpoints::STATUS_WHERE, post(handler::status_where_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handler::handle_timeout_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
}
