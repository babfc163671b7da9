//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{any, get},
};

use crate::health::HealthSnapshot;
use crate::render::render_html;
use crate::service::LoadShedService;
use crate::stats::Snapshot;

async fn health_check(State(service): State<Arc<LoadShedService>>) -> Json<HealthSnapshot> {
    Json(service.health())
}

/// The gated endpoint. Any method is accepted; the body is ignored.
///
/// The request runs on its own task so every caller is recorded. If the
/// client disconnects, axum drops this future and the guard cancels the
/// request token: a caller still waiting at the gate leaves as `Cancelled`,
/// and admitted work finishes and is recorded as usual.
async fn pubsub(State(service): State<Arc<LoadShedService>>) -> impl IntoResponse {
    let cancel = service.request_token();
    let disconnect = cancel.clone().drop_guard();
    let result = tokio::spawn(async move { service.handle(&cancel).await }).await;
    disconnect.disarm();

    match result {
        Ok(Ok(())) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "admitted" })),
        ),
        // Exhausted and cancelled both mean the caller was not admitted.
        Ok(Err(e)) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "status": "rejected",
                "error": "concurrent request limit",
                "reason": e.to_string(),
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Request task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "status": "failed",
                    "error": "request task lost",
                })),
            )
        }
    }
}

async fn stats_page(State(service): State<Arc<LoadShedService>>) -> Html<String> {
    Html(render_html(&service.stats().snapshot_to_now()))
}

async fn stats_json(State(service): State<Arc<LoadShedService>>) -> Json<Snapshot> {
    Json(service.stats().snapshot_to_now())
}

pub fn routes(service: Arc<LoadShedService>) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/pubsub", any(pubsub))
        .route("/stats", get(stats_page))
        .route("/stats.json", get(stats_json))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{AdmissionController, AdmissionMode};
    use crate::stats::{Outcome, Stats};
    use crate::work::SleepWork;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeDelta, Utc};
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    const RAW_POST: &[u8] =
        b"POST /pubsub HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n";

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn create_service(limit: usize, mode: AdmissionMode) -> Arc<LoadShedService> {
        create_service_with_sleep(limit, mode, Duration::from_millis(1))
    }

    fn create_service_with_sleep(
        limit: usize,
        mode: AdmissionMode,
        sleep: Duration,
    ) -> Arc<LoadShedService> {
        // Start in the past so `snapshot_to_now` has completed seconds to show.
        let stats = Stats::with_start("test run", Utc::now() - TimeDelta::seconds(2));
        Arc::new(LoadShedService::new(
            AdmissionController::new(limit, mode).unwrap(),
            Arc::new(stats),
            Arc::new(SleepWork::new(sleep)),
        ))
    }

    /// Serve `routes` on an ephemeral port over real TCP.
    async fn spawn_server(service: Arc<LoadShedService>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, routes(service)).await.unwrap() });
        addr
    }

    async fn wait_until(what: &str, mut ready: impl FnMut() -> bool) {
        for _ in 0..2000 {
            if ready() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("timed out waiting for {what}");
    }

    fn total(service: &LoadShedService, outcome: Outcome) -> u64 {
        service.stats().totals().get(&outcome).copied().unwrap_or(0)
    }

    #[tokio::test]
    async fn health_check_reports_gate() {
        let app = routes(create_service(3, AdmissionMode::Blocking));

        let response = app
            .oneshot(Request::get("/health-check").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "READY");
        assert_eq!(json["mode"], "blocking");
        assert_eq!(json["capacity"], 3);
        assert_eq!(json["outstanding"], 0);
        assert!(json["version"]["loadshed"].is_string());
    }

    #[tokio::test]
    async fn pubsub_admits_when_free() {
        let service = create_service(1, AdmissionMode::NonBlocking);
        let app = routes(Arc::clone(&service));

        let response = app
            .oneshot(Request::post("/pubsub").body(Body::from("foo")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "admitted");
        assert_eq!(service.stats().totals()[&Outcome::Admitted], 1);
    }

    #[tokio::test]
    async fn pubsub_accepts_get() {
        let app = routes(create_service(1, AdmissionMode::NonBlocking));

        let response = app
            .oneshot(Request::get("/pubsub").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn pubsub_returns_429_at_capacity() {
        let service = create_service(1, AdmissionMode::NonBlocking);
        let held = service
            .admission()
            .acquire(&CancellationToken::new())
            .await
            .unwrap();
        let app = routes(Arc::clone(&service));

        let response = app
            .oneshot(Request::post("/pubsub").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let json = response_json(response).await;
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["error"], "concurrent request limit");
        assert_eq!(service.stats().totals()[&Outcome::Rejected], 1);

        service.admission().release(held);
    }

    #[tokio::test]
    async fn pubsub_blocking_waits_for_release() {
        let service = create_service(1, AdmissionMode::Blocking);
        let held = service
            .admission()
            .acquire(&CancellationToken::new())
            .await
            .unwrap();

        let request = {
            let app = routes(Arc::clone(&service));
            tokio::spawn(async move {
                app.oneshot(Request::post("/pubsub").body(Body::empty()).unwrap())
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!request.is_finished());
        assert_eq!(service.health().waiters, 1);

        service.admission().release(held);

        let response = tokio::time::timeout(Duration::from_secs(1), request)
            .await
            .expect("blocked request not admitted")
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stats_json_is_dense_snapshot() {
        let service = create_service(1, AdmissionMode::NonBlocking);
        service
            .stats()
            .record(Outcome::Rejected, Utc::now() - TimeDelta::seconds(1));
        let app = routes(Arc::clone(&service));

        let response = app
            .oneshot(Request::get("/stats.json").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["title"], "test run");
        let width = json["to"].as_i64().unwrap() - json["from"].as_i64().unwrap() + 1;
        let rejected = json["series"]["rejected"].as_array().unwrap();
        assert_eq!(rejected.len() as i64, width);
    }

    #[tokio::test]
    async fn stats_page_is_html_chart() {
        let app = routes(create_service(1, AdmissionMode::NonBlocking));

        let response = app
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/html"));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("<title>test run</title>"));
        assert!(body.contains("echarts.init"));
    }

    #[tokio::test]
    async fn client_disconnect_while_waiting_is_recorded_as_rejected() {
        let service = create_service(1, AdmissionMode::Blocking);
        let held = service
            .admission()
            .acquire(&CancellationToken::new())
            .await
            .unwrap();
        let addr = spawn_server(Arc::clone(&service)).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(RAW_POST).await.unwrap();
        wait_until("request to queue", || service.health().waiters == 1).await;

        drop(client);
        wait_until("rejection to be recorded", || {
            total(&service, Outcome::Rejected) == 1
        })
        .await;

        assert_eq!(service.health().waiters, 0);
        assert_eq!(total(&service, Outcome::Admitted), 0);
        assert!(!service.shutdown_token().is_cancelled());

        service.admission().release(held);
        assert_eq!(service.admission().pool().outstanding(), 0);
    }

    #[tokio::test]
    async fn client_disconnect_mid_work_is_recorded_as_admitted() {
        let service =
            create_service_with_sleep(1, AdmissionMode::NonBlocking, Duration::from_millis(200));
        let addr = spawn_server(Arc::clone(&service)).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(RAW_POST).await.unwrap();
        wait_until("request to be admitted", || service.health().outstanding == 1).await;

        drop(client);
        wait_until("admission to be recorded", || {
            total(&service, Outcome::Admitted) == 1
        })
        .await;

        assert_eq!(total(&service, Outcome::Rejected), 0);
        wait_until("permit to be released", || service.health().outstanding == 0).await;
    }
}
