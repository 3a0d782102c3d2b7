use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// CORS for browser clients. Downloads expose `Content-Disposition` so the
/// original file name reaches the client.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_DISPOSITION])
}
