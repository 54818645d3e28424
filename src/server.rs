//! Axum router construction.
//!
//! The [`app`] function wires every page to its handler and returns a
//! ready-to-serve [`axum::Router`].  `/health` and `/metrics` are mounted
//! only when enabled in the `observability` config section.

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::errors::{generate_request_id, AppError};
use crate::handlers::{self, blobs, customers, files, queue};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Build the axum [`Router`] with all page routes.
pub fn app(state: Arc<AppState>) -> Router {
    let observability = state.config.observability.clone();
    let max_upload_size = state.config.server.max_upload_size;

    let mut router = Router::new()
        .route("/", get(handlers::home))
        // Customer profiles (table)
        .route("/customers", get(customers::list).post(customers::create))
        .route(
            "/customers/:row_key/edit",
            get(customers::edit_page).post(customers::update),
        )
        .route("/customers/:row_key/delete", post(customers::delete))
        // Product images (blob container)
        .route("/blobs", get(blobs::list))
        .route("/blobs/upload", post(blobs::upload))
        .route("/blobs/delete", post(blobs::delete))
        .route("/blobs/rename", get(blobs::rename_page).post(blobs::rename))
        // Contracts (file share)
        .route("/files", get(files::list))
        .route("/files/upload", post(files::upload))
        .route("/files/delete", post(files::delete))
        .route("/files/rename", get(files::rename_page).post(files::rename))
        // Order events (queue)
        .route("/queue", get(queue::list))
        .route("/queue/send", post(queue::send))
        .route("/queue/delete", post(queue::delete));

    if observability.health_check {
        router = router.route("/health", get(health_check));
    }
    if observability.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    let router = router
        .fallback(not_found)
        .with_state(state)
        // common_headers_middleware is innermost (closest to handlers).
        .layer(middleware::from_fn(common_headers_middleware));

    // metrics_middleware sits outside so it sees the final status.
    let router = if observability.metrics {
        router.layer(middleware::from_fn(metrics_middleware))
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_upload_size))
}

// -- Common headers middleware -----------------------------------------------

/// Adds `x-request-id` (unless the error page already set one) and
/// `Server: retailstore` to every response.
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert("x-request-id", value);
        }
    }
    headers.insert("server", HeaderValue::from_static("retailstore"));

    response
}

// -- Health check --------------------------------------------------------------

/// `GET /health` -- liveness only; does not touch storage.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

async fn not_found() -> AppError {
    AppError::NotFound
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::errors::StorageError;
    use crate::models::{CustomerProfile, TableEntity};
    use crate::storage::backend::{BackendFuture, TableBackend};
    use crate::storage::Backends;
    use axum::body::Body;
    use tower::ServiceExt;

    fn test_config() -> Config {
        let mut config = Config::default();
        // Leave the global recorder alone in unit tests.
        config.observability.metrics = false;
        config
    }

    fn state_with(backends: Backends) -> Arc<AppState> {
        Arc::new(AppState::new(test_config(), backends))
    }

    fn test_state() -> Arc<AppState> {
        state_with(Backends::in_memory())
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_upload(uri: &str, file_name: &str, content: &str) -> Request<Body> {
        let boundary = "X-RETAILSTORE-BOUNDARY";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Table backend whose every call fails remotely.
    struct UnavailableTables;

    impl TableBackend for UnavailableTables {
        fn create_table_if_not_exists(&self, _table: &str) -> BackendFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn query_partition(
            &self,
            _table: &str,
            _partition_key: &str,
        ) -> BackendFuture<'_, Vec<TableEntity>> {
            Box::pin(async {
                Err::<Vec<TableEntity>, _>(StorageError::Remote {
                    operation: "QueryEntities",
                    status: 503,
                    body: "ServerBusy".to_string(),
                })
            })
        }

        fn get_entity(&self, _t: &str, _p: &str, _r: &str) -> BackendFuture<'_, TableEntity> {
            Box::pin(async { Err::<TableEntity, _>(StorageError::Config("no account".to_string())) })
        }

        fn upsert_replace(&self, _table: &str, _entity: TableEntity) -> BackendFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn delete_entity(&self, _t: &str, _p: &str, _r: &str) -> BackendFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app(test_state());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_health_check_can_be_disabled() {
        let mut config = test_config();
        config.observability.health_check = false;
        let state = Arc::new(AppState::new(config, Backends::in_memory()));
        let response = app(state).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_home_lists_resources() {
        let response = app(test_state()).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("CustomerProfiles"));
        assert!(html.contains("order-events"));
    }

    #[tokio::test]
    async fn test_unknown_route_renders_404_page() {
        let response = app(test_state()).oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("404"));
    }

    #[tokio::test]
    async fn test_create_customer_then_list() {
        let state = test_state();
        let app = app(state.clone());

        let response = app
            .clone()
            .oneshot(post_form(
                "/customers",
                "full_name=Ada+Lovelace&email=ada%40example.com&favorite_product=Tea&loyalty_tier=",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/customers");

        let stored = state.storage.list_customers().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].loyalty_tier, "Bronze");
        assert_eq!(stored[0].email, "ada@example.com");

        let html = body_text(app.oneshot(get("/customers")).await.unwrap()).await;
        assert!(html.contains("Ada Lovelace"));
        assert!(html.contains(&format!("/customers/{}/edit", stored[0].row_key)));
    }

    #[tokio::test]
    async fn test_edit_missing_customer_is_404() {
        let app = app(test_state());
        let response = app
            .clone()
            .oneshot(get("/customers/does-not-exist/edit"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(post_form("/customers/does-not-exist/edit", "full_name=X"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_edit_and_delete_customer() {
        let state = test_state();
        let stored = state
            .storage
            .add_customer(CustomerProfile::new("Grace", "g@example.com", "Cobol", "Gold"))
            .await
            .unwrap();
        let app = app(state.clone());

        let edit_uri = format!("/customers/{}/edit", stored.row_key);
        let page = body_text(app.clone().oneshot(get(&edit_uri)).await.unwrap()).await;
        assert!(page.contains("g@example.com"));

        let response = app
            .clone()
            .oneshot(post_form(
                &edit_uri,
                "full_name=Grace+Hopper&email=&favorite_product=Ships&loyalty_tier=Platinum",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let updated = state.storage.get_customer(&stored.row_key).await.unwrap().unwrap();
        assert_eq!(updated.full_name, "Grace Hopper");
        assert_eq!(updated.email, "");
        assert_eq!(updated.loyalty_tier, "Platinum");

        let response = app
            .oneshot(post_form(
                &format!("/customers/{}/delete", stored.row_key),
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.storage.get_customer(&stored.row_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blob_upload_uses_base_name() {
        let state = test_state();
        let app = app(state.clone());
        let response = app
            .clone()
            .oneshot(post_upload("/blobs/upload", "C:\\fakepath\\shoe.png", "png-bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/blobs");
        assert_eq!(state.storage.list_blobs().await.unwrap(), vec!["shoe.png"]);

        let html = body_text(app.oneshot(get("/blobs")).await.unwrap()).await;
        assert!(html.contains("shoe.png"));
    }

    #[tokio::test]
    async fn test_empty_upload_is_ignored() {
        let state = test_state();
        let response = app(state.clone())
            .oneshot(post_upload("/files/upload", "empty.pdf", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_rename_flow() {
        let state = test_state();
        let app = app(state.clone());
        app.clone()
            .oneshot(post_upload("/files/upload", "draft.pdf", "%PDF"))
            .await
            .unwrap();

        let page = body_text(
            app.clone()
                .oneshot(get("/files/rename?name=draft.pdf"))
                .await
                .unwrap(),
        )
        .await;
        assert!(page.contains("draft.pdf"));

        let response = app
            .oneshot(post_form("/files/rename", "old_name=draft.pdf&new_name=final.pdf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(state.storage.list_files().await.unwrap(), vec!["final.pdf"]);
    }

    #[tokio::test]
    async fn test_rename_page_requires_name() {
        let response = app(test_state())
            .oneshot(get("/blobs/rename"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blob_rename_of_missing_source_is_404() {
        let response = app(test_state())
            .oneshot(post_form("/blobs/rename", "old_name=ghost.png&new_name=x.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_delete_is_ignored() {
        let response = app(test_state())
            .oneshot(post_form("/blobs/delete", "name=+"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_queue_send_peek_delete() {
        let state = test_state();
        let app = app(state.clone());

        let response = app
            .clone()
            .oneshot(post_form("/queue/send", "message=Order+%2342&status=Shipped"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/queue");

        let html = body_text(app.clone().oneshot(get("/queue")).await.unwrap()).await;
        assert!(html.contains("Order #42 - Shipped"));

        let peeked = state.storage.peek_messages(32).await.unwrap();
        assert_eq!(peeked.len(), 1);
        let response = app
            .clone()
            .oneshot(post_form(
                "/queue/delete",
                &format!("message_id={}", peeked[0].id),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.storage.peek_messages(32).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_send_requires_both_parts() {
        let state = test_state();
        app(state.clone())
            .oneshot(post_form("/queue/send", "message=Order+%2343"))
            .await
            .unwrap();
        assert!(state.storage.peek_messages(32).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_502() {
        let state = state_with(Backends {
            tables: Arc::new(UnavailableTables),
            ..Backends::in_memory()
        });
        let response = app(state).oneshot(get("/customers")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_config_failure_is_500() {
        let state = state_with(Backends {
            tables: Arc::new(UnavailableTables),
            ..Backends::in_memory()
        });
        let response = app(state)
            .oneshot(get("/customers/any/edit"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
