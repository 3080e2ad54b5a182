// src/service.rs

//! HTTP surface for storage-event delivery (Cloud Run / Eventarc style).

use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use tracing::{error, info_span, warn, Instrument};
use warp::{
    http::StatusCode,
    hyper::body::Bytes,
    reply::{self, Json, WithStatus},
    Filter, Rejection, Reply,
};

use crate::ingest::{parse_event, Ingestor};

pub const SERVICE_NAME: &str = "household-ingest";

/// Events are small JSON documents; anything bigger is not one.
const MAX_EVENT_BYTES: u64 = 64 * 1024;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: Option<String>,
}

fn error_reply(status: StatusCode, error: &str, details: String) -> WithStatus<Json> {
    reply::with_status(
        reply::json(&ErrorResponse {
            error: error.to_string(),
            details: Some(details),
        }),
        status,
    )
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(reply::json(&serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME
    })))
}

async fn handle_event(
    ce_id: Option<String>,
    body: Bytes,
    ingestor: Arc<Ingestor>,
) -> Result<WithStatus<Json>, Infallible> {
    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("rejecting undecodable event: {:#}", e);
            return Ok(error_reply(
                StatusCode::BAD_REQUEST,
                "Invalid event",
                format!("{:#}", e),
            ));
        }
    };

    let span = info_span!("event", ce_id = %ce_id.as_deref().unwrap_or("-"));
    match ingestor.handle(&event).instrument(span).await {
        Ok(outcome) => Ok(reply::with_status(reply::json(&outcome), StatusCode::OK)),
        Err(e) => {
            // A non-2xx status makes the trigger redeliver.
            error!(bucket = %event.bucket, name = %event.name, "ingestion failed: {:#}", e);
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Processing failed",
                format!("{:#}", e),
            ))
        }
    }
}

fn with_ingestor(
    ingestor: Arc<Ingestor>,
) -> impl Filter<Extract = (Arc<Ingestor>,), Error = Infallible> + Clone {
    warp::any().map(move || ingestor.clone())
}

/// `GET /health` and `POST /` (one storage event per request).
pub fn routes(
    ingestor: Arc<Ingestor>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let events = warp::path::end()
        .and(warp::post())
        .and(warp::header::optional::<String>("ce-id"))
        .and(warp::body::content_length_limit(MAX_EVENT_BYTES))
        .and(warp::body::bytes())
        .and(with_ingestor(ingestor))
        .and_then(handle_event);

    health.or(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStore, ObjectStore};
    use crate::warehouse::{LocalWarehouse, TableRef};
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    fn service() -> (TempDir, Arc<LocalStore>, Arc<Ingestor>) {
        crate::logging::init_for_tests();
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalStore::new(dir.path().join("objects")));
        let warehouse = Arc::new(LocalWarehouse::new(dir.path().join("warehouse")));
        let ingestor = Ingestor::new(
            store.clone(),
            warehouse,
            TableRef::new("p", "household", "household_data"),
        );
        (dir, store, Arc::new(ingestor))
    }

    fn body_json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_service() {
        let (_dir, _store, ingestor) = service();
        let res = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&routes(ingestor))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res.body());
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);
    }

    #[tokio::test]
    async fn loads_uploaded_csv() -> Result<()> {
        let (_dir, store, ingestor) = service();
        store
            .upload("uploads", "a.csv", b"Country,Foodx\nX,3\n".to_vec())
            .await?;

        let res = warp::test::request()
            .method("POST")
            .path("/")
            .header("ce-id", "evt-1")
            .body(r#"{"bucket":"uploads","name":"a.csv","generation":"1"}"#)
            .reply(&routes(ingestor))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res.body());
        assert_eq!(body["status"], "loaded");
        assert_eq!(body["rows"], 1);
        assert!(store.exists("uploads", "processed/a.csv.done").await?);
        Ok(())
    }

    #[tokio::test]
    async fn skipped_events_are_acknowledged() {
        let (_dir, _store, ingestor) = service();
        let res = warp::test::request()
            .method("POST")
            .path("/")
            .body(r#"{"bucket":"uploads","name":"notes.txt"}"#)
            .reply(&routes(ingestor))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res.body());
        assert_eq!(body["status"], "skipped");
        assert_eq!(body["reason"], "not_csv");
    }

    #[tokio::test]
    async fn bad_event_is_a_client_error() {
        let (_dir, _store, ingestor) = service();
        let res = warp::test::request()
            .method("POST")
            .path("/")
            .body("{}")
            .reply(&routes(ingestor))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn processing_failure_is_a_server_error() {
        let (_dir, _store, ingestor) = service();
        // object was never uploaded
        let res = warp::test::request()
            .method("POST")
            .path("/")
            .body(r#"{"bucket":"uploads","name":"missing.csv"}"#)
            .reply(&routes(ingestor))
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res.body())["error"], "Processing failed");
    }
}
