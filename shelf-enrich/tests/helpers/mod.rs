//! Shared fixtures for shelf-enrich integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use shelf_common::events::EventBus;
use shelf_enrich::services::{EnrichmentPipeline, ImageStore};
use shelf_enrich::sources::{BookSource, SourceError};
use shelf_enrich::types::{PartialRecord, SourceKind};
use shelf_enrich::AppState;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Canned answers per title; titles not listed get `Ok(None)`
pub struct ScriptedSource {
    kind: SourceKind,
    answers: HashMap<String, Result<PartialRecord, SourceError>>,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            answers: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer `title` with a record whose publisher is `publisher`
    pub fn found(mut self, title: &str, publisher: &str) -> Self {
        let mut record = PartialRecord::empty(self.kind);
        record.title = Some(title.to_string());
        record.publisher = Some(publisher.to_string());
        record.info_link = Some(format!("https://{}.test/{}", self.kind, title));
        self.answers.insert(title.to_string(), Ok(record));
        self
    }

    /// Fail every query for `title`
    pub fn failing(mut self, title: &str) -> Self {
        self.answers.insert(
            title.to_string(),
            Err(SourceError::Network("connection reset".to_string())),
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn query(
        &self,
        title: &str,
        _author: Option<&str>,
    ) -> Result<Option<PartialRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(title) {
            Some(Ok(record)) => Ok(Some(record.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(None),
        }
    }
}

pub fn pipeline(
    generative: ScriptedSource,
    catalog: ScriptedSource,
    open_catalog: ScriptedSource,
) -> EnrichmentPipeline {
    EnrichmentPipeline::new(Arc::new(generative), Arc::new(catalog), Arc::new(open_catalog))
}

/// App state over an in-memory catalog and a temporary root folder
pub struct TestApp {
    pub state: AppState,
    pub root: TempDir,
}

impl TestApp {
    pub async fn new(pipeline: EnrichmentPipeline) -> Self {
        let root = TempDir::new().unwrap();
        let db = shelf_enrich::db::init_memory_pool().await.unwrap();
        let image_store = ImageStore::new(root.path());
        let library = root.path().join("library");
        std::fs::create_dir_all(&library).unwrap();

        let state = AppState::new(
            db,
            EventBus::new(100),
            Arc::new(pipeline),
            image_store,
            library,
        );

        Self { state, root }
    }

    pub fn library(&self) -> PathBuf {
        self.state.library_folder.clone()
    }

    /// Write a photo into `<library>/<location>/<photo>`
    pub fn add_photo(&self, location: &str, photo: &str, bytes: &[u8]) {
        let dir = self.library().join(location);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(photo), bytes).unwrap();
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_bytes(&self, uri: &str, bytes: Vec<u8>) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/octet-stream")
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
    }

    pub async fn raw(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        shelf_enrich::build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.raw(request).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
