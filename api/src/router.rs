use crate::config::RunMode;
use crate::handlers::{AppState, LIST_PATH, SUBMIT_PATH, list_recent, submit_proposal};
use crate::store::ProposalStore;
use axum::Router;
use axum::http::header::InvalidHeaderValue;
use axum::http::{HeaderValue, Method};
use axum::routing::{any_service, get, post};
use lovenote_mailer::Notifier;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Settings for everything around the two API routes.
#[derive(Debug, Clone)]
pub struct FrontConfig {
    /// The only origin allowed to call the API with credentials.
    pub frontend_url: String,
    pub pages_dir: PathBuf,
    pub mode: RunMode,
}

pub fn router<S: ProposalStore, N: Notifier>(
    state: Arc<AppState<S, N>>,
    front: &FrontConfig,
) -> Result<Router, InvalidHeaderValue> {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([HeaderValue::from_str(
            &front.frontend_url,
        )?]))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    // Everything under the proposal prefix that the API does not claim renders
    // the proposal page.
    let proposal_page = ServeFile::new(front.pages_dir.join("api/v1/Proposal/index.html"));

    let pages = ServeDir::new(&front.pages_dir).append_index_html_on_directories(true);
    let pages = match front.mode {
        RunMode::Production => pages.precompressed_gzip(),
        RunMode::Development => pages,
    };

    let app = Router::new()
        .route("/readyz", get(|| async { "OK" }))
        .route("/livez", get(|| async { "OK" }))
        .route(
            SUBMIT_PATH,
            post(submit_proposal::<S, N>).fallback_service(proposal_page.clone()),
        )
        .route(
            LIST_PATH,
            get(list_recent::<S, N>).fallback_service(proposal_page.clone()),
        )
        .route("/api/v1/Proposal", any_service(proposal_page.clone()))
        .route("/api/v1/Proposal/{*rest}", any_service(proposal_page))
        .fallback_service(pages)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryProposalStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use lovenote_mailer::{
        DeliveryError, DeliveryReceipt, Notification, RelayConfig, SmtpNotifier,
    };
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tower::ServiceExt;

    const FRONTEND: &str = "http://localhost:5173";

    /// Records each recipient instead of talking to a relay.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            notification: &Notification<'_>,
        ) -> Result<DeliveryReceipt, DeliveryError> {
            self.sent
                .lock()
                .unwrap()
                .push(notification.email.to_string());
            Ok(DeliveryReceipt {
                code: "250".to_string(),
                message: vec!["OK".to_string()],
            })
        }
    }

    fn front(pages_dir: PathBuf) -> FrontConfig {
        FrontConfig {
            frontend_url: FRONTEND.to_string(),
            pages_dir,
            mode: RunMode::Development,
        }
    }

    fn app<S: ProposalStore, N: Notifier>(state: &Arc<AppState<S, N>>) -> Router {
        router(state.clone(), &front(PathBuf::from("./does-not-exist"))).unwrap()
    }

    fn recording_state() -> Arc<AppState<MemoryProposalStore, RecordingNotifier>> {
        Arc::new(AppState::new(
            MemoryProposalStore::default(),
            RecordingNotifier::default(),
        ))
    }

    fn submit(body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(SUBMIT_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn list() -> Request<Body> {
        Request::builder()
            .uri(LIST_PATH)
            .body(Body::empty())
            .unwrap()
    }

    fn alex() -> Value {
        json!({"to": "Alex", "email": "alex@example.com", "from": "Sam", "message": "Hi"})
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_persists_and_notifies() {
        let state = recording_state();
        let response = app(&state).oneshot(submit(alex())).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Your message has been sent");
        assert_eq!(body["Purpose_by"]["to"], "Alex");
        assert_eq!(body["Purpose_by"]["email"], "alex@example.com");
        assert_eq!(body["Purpose_by"]["from"], "Sam");
        assert_eq!(body["Purpose_by"]["message"], "Hi");
        assert!(body["Purpose_by"]["createdAt"].is_string());

        let stored = state.store.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(body["Purpose_by"]["_id"], stored[0].id.to_string());
        assert_eq!(*state.notifier.sent.lock().unwrap(), ["alex@example.com"]);
    }

    #[tokio::test]
    async fn test_submit_with_empty_field_does_nothing() {
        let state = recording_state();
        let response = app(&state)
            .oneshot(submit(
                json!({"to": "", "email": "a@b.com", "from": "Sam", "message": "Hi"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "message": "Please fill all fields"})
        );
        assert!(state.store.all().is_empty());
        assert!(state.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_with_missing_or_null_field() {
        let state = recording_state();
        for body in [
            json!({"email": "a@b.com", "from": "Sam", "message": "Hi"}),
            json!({"to": "Alex", "email": null, "from": "Sam", "message": "Hi"}),
            json!({}),
        ] {
            let response = app(&state).oneshot(submit(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = app(&state).oneshot(list()).await.unwrap();
        assert_eq!(json_body(response).await["count"], 0);
    }

    #[tokio::test]
    async fn test_submit_without_body_is_missing_fields() {
        let state = recording_state();
        let request = Request::builder()
            .method(Method::POST)
            .uri(SUBMIT_PATH)
            .body(Body::empty())
            .unwrap();

        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "Please fill all fields");
    }

    #[tokio::test]
    async fn test_unparsed_bodies_are_missing_fields() {
        let state = recording_state();
        let bodies = [
            ("text/plain", alex().to_string()),
            ("application/json", String::new()),
            ("application/json; charset=utf-8", "  \n".to_string()),
        ];

        for (content_type, body) in bodies {
            let request = Request::builder()
                .method(Method::POST)
                .uri(SUBMIT_PATH)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap();

            let response = app(&state).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{content_type}");
            assert_eq!(
                json_body(response).await,
                json!({"success": false, "message": "Please fill all fields"})
            );
        }
        assert!(state.store.all().is_empty());
        assert!(state.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_takes_scalars_as_text() {
        let state = recording_state();
        let mut body = alex();
        body["to"] = json!(5);

        let response = app(&state).oneshot(submit(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["Purpose_by"]["to"], "5");
        assert_eq!(state.store.all()[0].to, "5");
    }

    #[tokio::test]
    async fn test_submit_accepts_urlencoded() {
        let state = recording_state();
        let request = Request::builder()
            .method(Method::POST)
            .uri(SUBMIT_PATH)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                "to=Alex&email=alex%40example.com&from=Sam&message=Hi+there",
            ))
            .unwrap();

        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(state.store.all()[0].message, "Hi there");
    }

    #[tokio::test]
    async fn test_submit_with_malformed_json_goes_through_mapper() {
        let state = recording_state();
        let request = Request::builder()
            .method(Method::POST)
            .uri(SUBMIT_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"to\":"))
            .unwrap();

        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
        assert!(state.store.all().is_empty());
    }

    #[tokio::test]
    async fn test_store_and_delivery_failures_share_a_message() {
        let failing_store = Arc::new(AppState::new(
            MemoryProposalStore::failing(),
            RecordingNotifier::default(),
        ));
        let response = app(&failing_store).oneshot(submit(alex())).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let store_body = json_body(response).await;
        assert!(failing_store.notifier.sent.lock().unwrap().is_empty());

        // Nothing listens on a port we just released, so the relay connection fails.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let notifier = SmtpNotifier::new(&RelayConfig {
            host: "127.0.0.1".to_string(),
            port,
            username: "relay@example.com".to_string(),
            password: "secret".to_string(),
            sender: "relay@example.com".to_string(),
            link_base_url: "https://notes.example.com".to_string(),
        })
        .unwrap();
        let failing_relay = Arc::new(AppState::new(MemoryProposalStore::default(), notifier));
        let response = app(&failing_relay).oneshot(submit(alex())).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let relay_body = json_body(response).await;

        assert_eq!(store_body["message"], "Failed to send email");
        assert_eq!(relay_body["message"], store_body["message"]);
        assert_eq!(store_body["success"], false);
        assert!(store_body["error"].is_string());
        assert!(relay_body["error"].is_string());
        // The record is kept even though the email never left.
        assert_eq!(failing_relay.store.all().len(), 1);
    }

    #[tokio::test]
    async fn test_list_returns_three_newest_senders() {
        let state = recording_state();
        for from in ["Ana", "Ben", "Cleo", "Dan", "Eve"] {
            let mut body = alex();
            body["from"] = json!(from);
            let response = app(&state).oneshot(submit(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app(&state).oneshot(list()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "success": true,
                "message": "All proposal",
                "count": 5,
                "Proposal": ["Eve", "Dan", "Cleo"],
            })
        );
    }

    #[tokio::test]
    async fn test_list_with_fewer_than_three() {
        let state = recording_state();
        app(&state).oneshot(submit(alex())).await.unwrap();

        let body = json_body(app(&state).oneshot(list()).await.unwrap()).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["Proposal"], json!(["Sam"]));
    }

    #[tokio::test]
    async fn test_list_failure_goes_through_mapper() {
        let state = Arc::new(AppState::new(
            MemoryProposalStore::failing(),
            RecordingNotifier::default(),
        ));

        let response = app(&state).oneshot(list()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "message": sqlx::Error::PoolTimedOut.to_string()})
        );
    }

    #[tokio::test]
    async fn test_cors_allows_only_frontend() {
        let state = recording_state();
        let preflight = |origin: &str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri(SUBMIT_PATH)
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let response = app(&state).oneshot(preflight(FRONTEND)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        for method in ["GET", "POST", "PUT", "DELETE"] {
            assert!(methods.contains(method), "{methods} lacks {method}");
        }

        let response = app(&state)
            .oneshot(preflight("https://elsewhere.example.com"))
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );

        let request = Request::builder()
            .uri(LIST_PATH)
            .header(header::ORIGIN, "https://elsewhere.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_probes() {
        let state = recording_state();
        for path in ["/livez", "/readyz"] {
            let request = Request::builder().uri(path).body(Body::empty()).unwrap();
            let response = app(&state).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_pages_fallback() {
        let pages = tempfile::tempdir().unwrap();
        std::fs::write(pages.path().join("index.html"), "home").unwrap();
        std::fs::create_dir_all(pages.path().join("api/v1/Proposal")).unwrap();
        std::fs::write(
            pages.path().join("api/v1/Proposal/index.html"),
            "proposal page",
        )
        .unwrap();

        let state = recording_state();
        let app = router(state, &front(pages.path().to_path_buf())).unwrap();

        let expectations = [
            ("/", "home"),
            ("/api/v1/Proposal", "proposal page"),
            ("/api/v1/Proposal/anything/else", "proposal page"),
            (SUBMIT_PATH, "proposal page"),
        ];
        for (path, expected) in expectations {
            let request = Request::builder().uri(path).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(bytes, expected.as_bytes(), "{path}");
        }

        let request = Request::builder()
            .uri("/missing.html")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
