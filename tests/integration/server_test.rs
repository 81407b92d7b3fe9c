//! End-to-end tests through the loaded visit-counter extension.

use serde_json::Value;

use lynx_cache::CacheStore;
use plugin_visit_counter::hooks::visit_key;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_builtin_extension_loads_and_unknown_artifact_fails() {
    let app = TestApp::new(&["ghost.wsp", "visit-counter.wsp"]);

    let loaded: Vec<&str> = app.manager.extensions().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(loaded, vec!["visit-counter"]);

    let failed: Vec<&str> = app.manager.failures().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, vec!["ghost"]);
}

#[tokio::test]
async fn test_requests_are_counted_and_stamped() {
    let app = TestApp::new(&["visit-counter.wsp"]);

    for _ in 0..3 {
        let (status, headers, body) = app.get("/").await;
        assert_eq!(status, 200);
        assert_eq!(body, "<h1>lynx</h1>");
        assert_eq!(headers["x-served-by"], "lynx/visit-counter");
        assert!(headers["x-content-digest"].to_str().unwrap().starts_with("sha-256="));
    }

    let (status, headers, _) = app.get("/missing.txt").await;
    assert_eq!(status, 404);
    assert_eq!(headers["x-served-by"], "lynx/visit-counter");

    let reloaded = CacheStore::load(&app.cache_file);
    assert_eq!(reloaded.get(&visit_key("/")), Some(Value::from(3u64)));
    assert_eq!(reloaded.get(&visit_key("/missing.txt")), Some(Value::from(1u64)));
}

#[tokio::test]
async fn test_without_artifacts_no_hooks_run() {
    let app = TestApp::new(&[]);

    let (status, headers, _) = app.get("/").await;
    assert_eq!(status, 200);
    assert!(headers.get("x-served-by").is_none());
    assert!(app.manager.registry().is_empty());
    assert!(app.manager.cache().is_empty());
}

#[tokio::test]
async fn test_extension_work_dir_is_created() {
    let app = TestApp::new(&["visit-counter.wsp"]);

    let record = &app.manager.extensions()[0];
    assert!(record.work_dir.is_dir());
    assert!(record.work_dir.ends_with("visit-counter"));
}

#[tokio::test]
async fn test_cache_file_untouched_unless_an_extension_saves() {
    let corrupt: &[u8] = b"{ not json";
    let app = TestApp::with_cache_file(&[], Some(corrupt));
    app.manager.cache().set("scratch", 1);

    let (status, _, _) = app.get("/").await;
    assert_eq!(status, 200);

    assert!(app.manager.cache().contains_key("scratch"));
    assert_eq!(std::fs::read(&app.cache_file).unwrap(), corrupt);
}
