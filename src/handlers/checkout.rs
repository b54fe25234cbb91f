use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::OrderId;
use crate::error::AppError;
use crate::services::CheckoutError;
use crate::AppState;

pub async fn process_payment(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response, AppError> {
    let client_ip = state
        .client_ip
        .resolve_with_peer(&headers, peer.map(|ConnectInfo(addr)| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_default();

    match state.checkout.process_payment(order_id, &client_ip).await {
        Ok(response) => Ok((StatusCode::OK, Json(response)).into_response()),
        Err(CheckoutError::Payment(message)) => Ok((
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "result": "failure",
                "message": format!("Payment error: {}", message),
            })),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}
