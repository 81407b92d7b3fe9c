//! End-to-end tests of loading and dispatch through `ExtensionManager`.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::json;

use lynx_cache::CacheStore;
use lynx_plugin::hooks::definitions::{ClientHandle, Connection, Session};
use lynx_plugin::prelude::*;
use lynx_plugin::{BuiltinCatalog, CapabilityInjector, ExtensionManager, Toolkit};

fn touch(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"").unwrap();
}

fn injector(root: &Path, cache: Arc<CacheStore>) -> CapabilityInjector {
    CapabilityInjector::new(cache, Arc::new(Toolkit::new("ffmpeg").unwrap()), root)
}

fn request() -> Request {
    Request::new(
        "GET",
        "/index.html",
        "HTTP/1.1",
        ClientHandle::new("127.0.0.1:40000".parse().unwrap()),
    )
}

fn tag_request(header: &'static str) -> impl Fn(&mut ExtensionContext) -> anyhow::Result<()> {
    move |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
        ctx.hooks().before_request(move |req| {
            req.set_header(header, "1");
            Ok(())
        });
        Ok(())
    }
}

#[test]
fn test_failing_registration_is_skipped_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let wsp = dir.path().join("wsp");
    std::fs::create_dir_all(&wsp).unwrap();
    for name in ["a.wsp", "b.wsp", "c.wsp", "d.wsp"] {
        touch(&wsp, name);
    }

    let catalog = BuiltinCatalog::new()
        .with("a", tag_request("X-A"))
        .with("b", |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
            ctx.hooks().before_request(|req| {
                req.set_header("X-B", "1");
                Ok(())
            });
            anyhow::bail!("missing configuration")
        })
        .with("c", |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
            ctx.hooks().after_request(|_, _| Ok(()));
            panic!("registration bug")
        })
        .with("d", tag_request("X-D"));

    let mut manager = ExtensionManager::new(
        injector(dir.path(), Arc::new(CacheStore::in_memory())),
        catalog,
    );
    manager.load_all(&wsp, "wsp").unwrap();

    let loaded: Vec<&str> = manager.extensions().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(loaded, vec!["a", "d"]);

    let failed: Vec<&str> = manager.failures().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, vec!["b", "c"]);
    assert!(manager.failures()[0].message.contains("missing configuration"));
    assert!(manager.failures()[1].message.contains("registration bug"));
    assert!(manager.failures()[1].trace.is_some());

    let dispatcher = manager.dispatcher();
    assert_eq!(dispatcher.registry().len(HookKind::BeforeRequest), 2);
    assert_eq!(dispatcher.registry().len(HookKind::AfterRequest), 0);

    let mut req = request();
    dispatcher.before_request(&mut req);
    assert_eq!(req.header("x-a"), Some("1"));
    assert_eq!(req.header("x-b"), None);
    assert_eq!(req.header("x-d"), Some("1"));
}

#[test]
fn test_unknown_artifact_is_a_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let wsp = dir.path().join("wsp");
    std::fs::create_dir_all(&wsp).unwrap();
    touch(&wsp, "ghost.wsp");
    touch(&wsp, "real.wsp");

    let catalog = BuiltinCatalog::new().with("real", tag_request("X-Real"));
    let mut manager = ExtensionManager::new(
        injector(dir.path(), Arc::new(CacheStore::in_memory())),
        catalog,
    );
    manager.load_all(&wsp, "wsp").unwrap();

    assert_eq!(manager.extensions().len(), 1);
    assert_eq!(manager.failures().len(), 1);
    assert_eq!(manager.failures()[0].name, "ghost");
}

#[test]
fn test_chain_order_follows_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let wsp = dir.path().join("wsp");
    std::fs::create_dir_all(&wsp).unwrap();
    for name in ["20-second.wsp", "10-first.wsp", "30-third.wsp"] {
        touch(&wsp, name);
    }

    let append = |label: &'static str| {
        move |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
            ctx.hooks().after_request(move |_, resp| {
                let mut trail = resp.header("X-Trail").unwrap_or("").to_string();
                trail.push_str(label);
                resp.set_header("X-Trail", trail);
                Ok(())
            });
            Ok(())
        }
    };

    let catalog = BuiltinCatalog::new()
        .with("30-third", append("3"))
        .with("10-first", append("1"))
        .with("20-second", append("2"));
    let mut manager = ExtensionManager::new(
        injector(dir.path(), Arc::new(CacheStore::in_memory())),
        catalog,
    );
    manager.load_all(&wsp, "wsp").unwrap();

    let mut req = request();
    let mut resp = Response::new(200);
    manager.dispatcher().after_request(&mut req, &mut resp);
    assert_eq!(resp.header("x-trail"), Some("123"));
}

#[test]
fn test_mid_chain_failure_does_not_stop_later_callbacks() {
    let dir = tempfile::tempdir().unwrap();
    let wsp = dir.path().join("wsp");
    std::fs::create_dir_all(&wsp).unwrap();
    for name in ["1.wsp", "2.wsp", "3.wsp"] {
        touch(&wsp, name);
    }

    let catalog = BuiltinCatalog::new()
        .with("1", tag_request("X-A"))
        .with("2", |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
            ctx.hooks().before_request(|req| {
                let _ = req.header("x-a");
                panic!("callback bug")
            });
            Ok(())
        })
        .with("3", |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
            ctx.hooks().before_request(|req| {
                let seen = req.header("x-a").unwrap_or("no").to_string();
                req.set_header("X-C-Saw-A", seen);
                Ok(())
            });
            Ok(())
        });
    let mut manager = ExtensionManager::new(
        injector(dir.path(), Arc::new(CacheStore::in_memory())),
        catalog,
    );
    manager.load_all(&wsp, "wsp").unwrap();

    let mut req = request();
    let report = manager.dispatcher().before_request(&mut req);

    assert_eq!(report.invoked, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].extension, "2");
    assert!(report.failures[0].panicked);
    assert_eq!(req.header("x-c-saw-a"), Some("1"));
}

fn record_order(
    order: Arc<Mutex<Vec<usize>>>,
    index: usize,
    fail: bool,
) -> impl Fn(&mut ExtensionContext) -> anyhow::Result<()> {
    move |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
        let order = Arc::clone(&order);
        ctx.hooks().before_request(move |_| {
            order.lock().push(index);
            if fail {
                anyhow::bail!("callback {index} failed");
            }
            Ok(())
        });
        Ok(())
    }
}

#[test]
fn test_erroring_callback_runs_once_in_order_with_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let wsp = dir.path().join("wsp");
    std::fs::create_dir_all(&wsp).unwrap();
    for name in ["1.wsp", "2.wsp", "3.wsp"] {
        touch(&wsp, name);
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let catalog = BuiltinCatalog::new()
        .with("1", record_order(Arc::clone(&order), 1, false))
        .with("2", record_order(Arc::clone(&order), 2, true))
        .with("3", record_order(Arc::clone(&order), 3, false));
    let mut manager = ExtensionManager::new(
        injector(dir.path(), Arc::new(CacheStore::in_memory())),
        catalog,
    );
    manager.load_all(&wsp, "wsp").unwrap();

    let mut req = request();
    let report = manager.dispatcher().before_request(&mut req);

    assert_eq!(*order.lock(), vec![1, 2, 3]);
    assert_eq!(report.invoked, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].position, 1);
    assert!(!report.failures[0].panicked);
    assert!(report.failures[0].message.contains("callback 2 failed"));
}

#[test]
fn test_contexts_share_cache_and_get_private_work_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let wsp = dir.path().join("wsp");
    std::fs::create_dir_all(&wsp).unwrap();
    touch(&wsp, "reader.wsp");
    touch(&wsp, "writer.wsp");
    let cache_file = dir.path().join("cache.dat");

    let catalog = BuiltinCatalog::new()
        // loads second
        .with("writer", |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
            assert_eq!(ctx.cache().get("reader_saw"), Some(json!(false)));
            ctx.cache().set("writer", ctx.work_dir().display().to_string());
            ctx.save_cache()?;
            Ok(())
        })
        .with("reader", |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
            ctx.cache().set("reader_saw", ctx.cache().contains_key("writer"));
            assert!(ctx.work_dir().is_dir());
            Ok(())
        });

    let cache = Arc::new(CacheStore::load(&cache_file));
    let mut manager = ExtensionManager::new(injector(dir.path(), Arc::clone(&cache)), catalog);
    manager.load_all(&wsp, "wsp").unwrap();

    assert_eq!(manager.extensions().len(), 2);
    assert!(dir.path().join("reader").is_dir());
    assert!(dir.path().join("writer").is_dir());
    assert_eq!(
        manager.extensions()[1].work_dir,
        dir.path().join("writer")
    );

    let reloaded = CacheStore::load(&cache_file);
    assert_eq!(
        reloaded.get("writer"),
        Some(json!(dir.path().join("writer").display().to_string()))
    );
}

#[test]
fn test_concurrent_dispatch_counts_every_request() {
    const REQUESTS: usize = 200;
    let dir = tempfile::tempdir().unwrap();
    let wsp = dir.path().join("wsp");
    std::fs::create_dir_all(&wsp).unwrap();
    touch(&wsp, "counter.wsp");

    let catalog = BuiltinCatalog::new().with("counter", |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
        let cache = Arc::clone(ctx.cache());
        ctx.hooks().before_request(move |_| {
            cache.update("hits", |v| *v = json!(v.as_u64().unwrap_or(0) + 1));
            Ok(())
        });
        Ok(())
    });
    let cache = Arc::new(CacheStore::in_memory());
    let mut manager = ExtensionManager::new(injector(dir.path(), Arc::clone(&cache)), catalog);
    manager.load_all(&wsp, "wsp").unwrap();
    let dispatcher = manager.dispatcher();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let dispatcher = dispatcher.clone();
            scope.spawn(move || {
                for _ in 0..REQUESTS / 8 {
                    dispatcher.before_request(&mut request());
                }
            });
        }
    });

    assert_eq!(cache.get("hits"), Some(json!(REQUESTS)));
}

#[test]
fn test_websocket_hooks_reply_through_connection() {
    let dir = tempfile::tempdir().unwrap();
    let wsp = dir.path().join("wsp");
    std::fs::create_dir_all(&wsp).unwrap();
    touch(&wsp, "echo.wsp");

    let connects = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&connects);
    let catalog = BuiltinCatalog::new().with("echo", move |ctx: &mut ExtensionContext| -> anyhow::Result<()> {
        let seen = Arc::clone(&seen);
        ctx.hooks()
            .websocket_connect(move |conn, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                conn.send_text("welcome")?;
                Ok(())
            })
            .websocket_message(|conn, _, msg| {
                if let Some(text) = msg.as_text() {
                    conn.send_text(text.to_uppercase())?;
                }
                Ok(())
            });
        Ok(())
    });
    let mut manager = ExtensionManager::new(
        injector(dir.path(), Arc::new(CacheStore::in_memory())),
        catalog,
    );
    manager.load_all(&wsp, "wsp").unwrap();
    let dispatcher = manager.dispatcher();

    let (conn, mut rx) = Connection::new(8);
    let session = Session::new(conn, "10.1.1.1:5555".parse().unwrap());
    dispatcher.websocket_connect(&session);
    dispatcher.websocket_message(&session, &WsMessage::Text("hi".into()));
    dispatcher.websocket_close(&session);

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(rx.try_recv().unwrap(), WsMessage::Text("welcome".into()));
    assert_eq!(rx.try_recv().unwrap(), WsMessage::Text("HI".into()));
}
