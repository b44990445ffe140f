//! Listener setup for the functions

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hdims_db::Platform;

use crate::routes::create_router;
use crate::state::{ApiConfig, AppState};

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Router with request tracing, and permissive CORS when enabled
pub fn build_app(config: &ApiConfig, platform: Platform) -> Router {
    let app = create_router(AppState::new(platform, config.backend))
        .layer(TraceLayer::new_for_http());
    if !config.enable_cors {
        return app;
    }
    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    config: &ApiConfig,
    platform: Platform,
    shutdown: F,
) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listener.local_addr()?;
    info!(backend = %config.backend, cors = config.enable_cors, "HDIMS functions listening on {}", addr);
    axum::serve(listener, build_app(config, platform))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HDIMS functions stopped");
    Ok(())
}

/// Bind `config.host:config.port` and serve until Ctrl-C
pub async fn run_server(config: ApiConfig, platform: Platform) -> ServerResult<()> {
    let listener = TcpListener::bind(config.bind_addr()?).await?;
    serve_with_shutdown(listener, &config, platform, ctrl_c()).await
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler unavailable; serving until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method};
    use axum_test::TestServer;
    use hdims_db::MemoryPlatform;

    #[tokio::test]
    async fn test_cors_follows_config() {
        let platform = MemoryPlatform::new();
        let with_cors = TestServer::new(build_app(&ApiConfig::default(), platform.platform())).unwrap();
        let response = with_cors
            .method(Method::OPTIONS, "/functions/v1/health")
            .add_header(
                axum::http::header::ORIGIN,
                HeaderValue::from_static("http://localhost:5173"),
            )
            .add_header(
                axum::http::header::ACCESS_CONTROL_REQUEST_METHOD,
                HeaderValue::from_static("GET"),
            )
            .await;
        assert!(response
            .headers()
            .contains_key(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let config = ApiConfig {
            enable_cors: false,
            ..Default::default()
        };
        let without = TestServer::new(build_app(&config, platform.platform())).unwrap();
        let response = without
            .get("/functions/v1/health")
            .add_header(
                axum::http::header::ORIGIN,
                HeaderValue::from_static("http://localhost:5173"),
            )
            .await;
        response.assert_status_ok();
        assert!(!response
            .headers()
            .contains_key(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_graceful_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            serve_with_shutdown(
                listener,
                &ApiConfig::default(),
                MemoryPlatform::new().platform(),
                async {
                    let _ = stopped.await;
                },
            )
            .await
            .is_ok()
        });
        stop.send(()).unwrap();
        assert!(server.await.unwrap());
    }
}
