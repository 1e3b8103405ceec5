//! End-to-end exercise of the registry HTTP surface against fresh paths.
//!
//! Compiled artifacts are seeded directly into the cache partition so the
//! publish path runs without the external toolchain.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use cmodel_cache::{CacheConfig, PluginCache};
use cmodel_compiler::{CompilerConfig, PluginCompiler};
use cmodel_module::{Resolver, ResolverConfig};
use cmodel_registry::{ConfigModelRegistry, RegistryConfig, RegistryService, router};
use serde_json::{Value, json};
use tower::ServiceExt;

const MANIFEST: &str = "module github.com/onosproject/onos-config\n\ngo 1.16\n";

struct Harness {
    router: Router,
    cache: Arc<PluginCache>,
    _dirs: Vec<tempfile::TempDir>,
}

fn harness() -> Harness {
    let registry_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let build_dir = tempfile::tempdir().unwrap();
    let mod_dir = tempfile::tempdir().unwrap();

    std::fs::write(mod_dir.path().join("go.mod"), MANIFEST).unwrap();
    std::fs::write(mod_dir.path().join("mod.md5"), b"h1:e2e=").unwrap();
    let resolver = Arc::new(Resolver::new(ResolverConfig {
        path: mod_dir.path().to_path_buf(),
        target: String::new(),
        replace: String::new(),
    }));

    let registry = Arc::new(ConfigModelRegistry::new(RegistryConfig {
        path: registry_dir.path().to_path_buf(),
    }));
    let cache = Arc::new(PluginCache::new(
        CacheConfig {
            path: cache_dir.path().to_path_buf(),
        },
        Arc::clone(&resolver),
    ));
    let compiler = Arc::new(PluginCompiler::new(
        CompilerConfig {
            build_path: build_dir.path().to_path_buf(),
            ..Default::default()
        },
        Some(resolver),
    ));

    let service = Arc::new(RegistryService::new(registry, Arc::clone(&cache), compiler));
    Harness {
        router: router(service),
        cache,
        _dirs: vec![registry_dir, cache_dir, build_dir, mod_dir],
    }
}

async fn seed_artifact(harness: &Harness, name: &str, version: &str) {
    let path = harness.cache.get_path(name, version).await.unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"\x7fELF").unwrap();
}

async fn request(harness: &Harness, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = harness.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn push_body() -> Value {
    json!({
        "model": {
            "name": "foo",
            "version": "1.0.0",
            "modules": [{
                "name": "bar",
                "organization": "ONF",
                "revision": "2020-11-18",
                "file": "bar.yang"
            }],
            "files": { "bar.yang": b"Hello world!".to_vec() }
        }
    })
}

#[tokio::test]
async fn publish_get_delete_round_trip() {
    let harness = harness();
    seed_artifact(&harness, "foo", "1.0.0").await;

    let (status, _) = request(&harness, "POST", "/v1/models", Some(push_body())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&harness, "GET", "/v1/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"].as_array().unwrap().len(), 1);

    let (status, body) = request(&harness, "GET", "/v1/models/foo/1.0.0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"]["name"], "foo");
    assert_eq!(body["model"]["modules"][0]["revision"], "2020-11-18");
    // Get responses omit file payloads.
    assert!(body["model"].get("files").is_none());

    let (status, _) = request(&harness, "DELETE", "/v1/models/foo/1.0.0", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&harness, "GET", "/v1/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["models"].as_array().unwrap().is_empty());

    let (status, body) = request(&harness, "GET", "/v1/models/foo/1.0.0", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn duplicate_publish_conflicts() {
    let harness = harness();
    seed_artifact(&harness, "foo", "1.0.0").await;

    let (status, _) = request(&harness, "POST", "/v1/models", Some(push_body())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&harness, "POST", "/v1/models", Some(push_body())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    // Exactly one descriptor and one artifact exist regardless.
    let (_, body) = request(&harness, "GET", "/v1/models", None).await;
    assert_eq!(body["models"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_publish_is_a_bad_request() {
    let harness = harness();
    let mut body = push_body();
    body["model"]["name"] = json!("");

    let (status, body) = request(&harness, "POST", "/v1/models", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid"));
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let harness = harness();
    let (status, body) = request(&harness, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
