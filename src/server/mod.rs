pub mod errors;
pub mod handlers;
pub mod state;

use anyhow::{Result, Context};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// All endpoints of the service
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/start-scrape", get(handlers::start_scrape))
        .route("/fetch_url_metrics", post(handlers::fetch_url_metrics))
        .route("/fetch_url_metrics_csv", post(handlers::fetch_url_metrics_file))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn serve(bind: &str, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await
        .context(format!("Failed to bind {}", bind))?;
    info!("Listening on {}", bind);

    axum::serve(listener, routes(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::HarvesterConfig;
    use crate::crawler::pacing::CountingPacer;
    use crate::crawler::testing::{numbered_pages, FakeLauncher, FakeSite, NextControl};
    use crate::crawler::ScrapeSession;
    use crate::enrichment::api::MockMetricsApi;
    use crate::enrichment::{ApiReply, BatchMetricsClient};
    use crate::storage::sink::{MockListingSink, MockMetricsSink};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-HARVESTER-BOUNDARY";

    fn state_with(api: MockMetricsApi, sink: MockMetricsSink) -> Arc<AppState> {
        let site = FakeSite::new(numbered_pages(&[2, 1]), NextControl::Disabled);
        let mut listing_sink = MockListingSink::new();
        listing_sink.expect_name().return_const("database");
        listing_sink.expect_append_listings().returning(|_| Ok(()));

        let scrape = ScrapeSession::new(
            HarvesterConfig::default().site,
            Arc::new(FakeLauncher::new(site)),
            vec![Arc::new(listing_sink)],
        )
        .with_pacers(Arc::new(CountingPacer::default()), Arc::new(CountingPacer::default()));
        let metrics = BatchMetricsClient::new(Arc::new(api), Arc::new(sink), Arc::new(CountingPacer::default()));

        Arc::new(AppState::new(scrape, metrics, 2, None, "Sheet1".to_string()))
    }

    fn idle_state() -> Arc<AppState> {
        let mut api = MockMetricsApi::new();
        api.expect_url_metrics().never();
        let mut sink = MockMetricsSink::new();
        sink.expect_append_metrics().never();
        state_with(api, sink)
    }

    fn multipart_request(file_name: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = contents
        );
        Request::builder()
            .method("POST")
            .uri("/fetch_url_metrics_csv")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = routes(idle_state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "up", "message": "Service is running" }));
    }

    #[tokio::test]
    async fn test_start_scrape_returns_summary() {
        let response = routes(idle_state())
            .oneshot(Request::builder().uri("/start-scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["message"], "Scraped 3 domains from 2 pages");
        assert_eq!(body["domains"], json!(["p1-d1.ca", "p1-d2.ca", "p2-d1.ca"]));
    }

    #[tokio::test]
    async fn test_fetch_url_metrics_requires_targets() {
        let request = Request::builder()
            .method("POST")
            .uri("/fetch_url_metrics")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"urls": ["a.com"]}"#))
            .unwrap();

        let response = routes(idle_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "'targets' key is missing in the request");
    }

    #[tokio::test]
    async fn test_fetch_url_metrics_passes_payload_through() {
        let mut api = MockMetricsApi::new();
        api.expect_url_metrics()
            .withf(|targets| targets == ["a.com".to_string()])
            .times(1)
            .returning(|_| Ok(ApiReply { status: 200, body: r#"{"results":[{"page":"a.com/"}]}"#.to_string() }));
        let mut sink = MockMetricsSink::new();
        sink.expect_append_metrics().never();

        let request = Request::builder()
            .method("POST")
            .uri("/fetch_url_metrics")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"targets": ["a.com"]}"#))
            .unwrap();

        let response = routes(state_with(api, sink)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "results": [{ "page": "a.com/" }] }));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_surfaced() {
        let mut api = MockMetricsApi::new();
        api.expect_url_metrics()
            .returning(|_| Ok(ApiReply { status: 401, body: "bad token".to_string() }));
        let mut sink = MockMetricsSink::new();
        sink.expect_append_metrics().never();

        let request = Request::builder()
            .method("POST")
            .uri("/fetch_url_metrics")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"targets": ["a.com"]}"#))
            .unwrap();

        let response = routes(state_with(api, sink)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Failed to fetch data. Status code: 401", "message": "bad token" })
        );
    }

    #[tokio::test]
    async fn test_upload_with_unsupported_extension_is_rejected() {
        let response = routes(idle_state())
            .oneshot(multipart_request("targets.txt", "a.com\n"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Invalid file type. Only CSV and XLSX files are allowed"
        );
    }

    #[tokio::test]
    async fn test_upload_enriches_in_chunks() {
        let mut api = MockMetricsApi::new();
        api.expect_url_metrics()
            .times(2)
            .returning(|targets| {
                let results: Vec<Value> = targets.iter().map(|t| json!({ "page": t })).collect();
                Ok(ApiReply { status: 200, body: json!({ "results": results }).to_string() })
            });
        let mut sink = MockMetricsSink::new();
        sink.expect_append_metrics().times(2).returning(|_| Ok(()));

        let response = routes(state_with(api, sink))
            .oneshot(multipart_request("targets.csv", "domain\na.com\nb.com\nc.com\n"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!([
                { "results": [{ "page": "a.com" }, { "page": "b.com" }] },
                { "results": [{ "page": "c.com" }] }
            ])
        );
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{b}--\r\n",
            b = BOUNDARY
        );
        let request = Request::builder()
            .method("POST")
            .uri("/fetch_url_metrics_csv")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap();

        let response = routes(idle_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file uploaded");
    }
}
