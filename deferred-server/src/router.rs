use std::future::ready;

use axum::{routing::get, Router};
use deferred::DeferredHandler;
use tower_http::trace::TraceLayer;

use crate::metrics::{setup_metrics_recorder, track_metrics};

async fn liveness() -> &'static str {
    "ok"
}

/// Every path without a route of its own goes to `handler`.
pub fn router(handler: DeferredHandler, metrics: bool) -> Router {
    let router = Router::new()
        .route("/_liveness", get(liveness))
        .fallback_service(handler)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics));

    // Don't install metrics unless asked to
    // Installing a global recorder when the server is used as a library (during tests etc)
    // does not work well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();

        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use deferred::{Options, Unavailable};
    use http_body_util::BodyExt;
    use std::convert::Infallible;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn cancelled_handler() -> DeferredHandler {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        DeferredHandler::new(
            shutdown,
            || async { Ok::<Router, Infallible>(Router::new()) },
            Options::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn liveness_does_not_wait_for_handler() {
        let app = router(cancelled_handler(), false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/_liveness")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn other_paths_go_to_handler() {
        let app = router(cancelled_handler(), false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/anything/else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], Unavailable::Permanent.to_string().as_bytes());
    }
}
