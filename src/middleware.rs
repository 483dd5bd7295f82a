use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::info;
use uuid::Uuid;

use crate::handlers::SharedState;
use crate::response::{insert_usage_headers, rejection_response};

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();

    info!(
        target: "textgate::middleware",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let response = next.run(request).await;

    info!(
        target: "textgate::middleware",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        "Request completed"
    );

    response
}

/// Gate a downstream handler. The request reaches `next` only on an allowed
/// verdict; everything else is answered here with a `429`.
pub async fn admission_middleware(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = peer_addr(&request);
    let verdict = state.admit(request.headers(), peer);

    if !verdict.is_allowed() {
        return rejection_response(&verdict, state.limits.max_requests);
    }

    let mut response = next.run(request).await;
    insert_usage_headers(response.headers_mut(), &verdict, state.limits.max_requests);
    response
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_peer_addr_from_connect_info() {
        let mut request = Request::new(Body::empty());
        let addr: SocketAddr = "198.51.100.7:4000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(peer_addr(&request), Some(addr));
    }

    #[test]
    fn test_peer_addr_missing() {
        let request = Request::new(Body::empty());
        assert_eq!(peer_addr(&request), None);
    }
}
