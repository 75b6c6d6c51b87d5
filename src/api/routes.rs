//! Router assembly: OpenAPI-documented routes, Swagger UI and middleware.

use std::time::Duration;

use axum::http::HeaderName;
use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::doc::ApiDoc;
use crate::api::handlers::{categories::category_routes, health::health_routes};
use crate::api::middleware::{
    REQUEST_ID_HEADER, global_error_handler, logging_middleware, request_id_middleware,
};
use crate::state::AppState;

/// Documented API routes, without middleware or state.
pub fn api_router() -> OpenApiRouter<AppState> {
    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/health", health_routes())
        .nest("/api/categories", category_routes())
}

/// Creates the application router.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let (router, api) = api_router().split_for_parts();

    let router =
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api));
    with_middleware(router, request_timeout).with_state(state)
}

/// Wraps `router` in the shared middleware stack.
///
/// # Middleware Order
/// Layers run outermost first:
/// 1. Compression and CORS
/// 2. Request ID - generates/propagates `x-request-id`
/// 3. Logging - span per request, keyed by the request ID
/// 4. Global error handler - uniform JSON error bodies
/// 5. Timeout - `408` after `server.request_timeout`
fn with_middleware<S>(router: Router<S>, request_timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]);

    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(global_error_handler))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HierarchyConfig;
    use diesel_async::AsyncPgConnection;
    use diesel_async::pooled_connection::AsyncDieselConnectionManager;
    use diesel_async::pooled_connection::bb8::Pool;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_openapi_lists_category_routes() {
        let (_, api) = api_router().split_for_parts();
        let paths: Vec<&str> = api.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/api/categories/bulk",
            "/api/categories/descendants",
            "/api/categories/{id}",
            "/api/categories/{id}/children",
            "/api/health/live",
            "/api/health/ready",
        ] {
            assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
        }
    }

    #[tokio::test]
    async fn test_router_builds_without_route_conflicts() {
        let manager =
            AsyncDieselConnectionManager::<AsyncPgConnection>::new("postgres://localhost/unused");
        let pool = Pool::builder().build_unchecked(manager);
        let state = AppState::new(pool, &HierarchyConfig::default());
        let _router = create_router(state, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_slow_request_times_out_with_json_body() {
        let slow = Router::new().route(
            "/slow",
            axum::routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            }),
        );
        let router = with_middleware(slow, Duration::from_millis(50));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { axum::serve(listener, router).await });

        let mut stream = tokio::net::TcpStream::connect(address).await.unwrap();
        stream
            .write_all(
                b"GET /slow HTTP/1.1\r\nHost: localhost\r\nx-request-id: slow-1\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        server.abort();

        assert!(raw.starts_with("HTTP/1.1 408"), "unexpected response: {raw}");
        assert!(raw.contains(r#""code":"REQUEST_TIMEOUT""#), "{raw}");
        assert!(raw.contains(r#""request_id":"slow-1""#), "{raw}");
    }
}
