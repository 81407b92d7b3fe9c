//! Hook callbacks for the visit counter.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;

use lynx_cache::CacheStore;
use lynx_plugin::prelude::*;

/// Request header carrying the visit count for the requested path.
pub const VISIT_COUNT_HEADER: &str = "x-visit-count";

/// Response header naming the extension that served the request.
pub const SERVED_BY_HEADER: &str = "X-Served-By";

/// Response header carrying the SHA-256 of the body.
pub const DIGEST_HEADER: &str = "X-Content-Digest";

/// Cache key prefix for per-path counters.
const KEY_PREFIX: &str = "visits:";

/// Cache key holding the count for `path`.
pub fn visit_key(path: &str) -> String {
    format!("{KEY_PREFIX}{path}")
}

/// Increments the counter for the request path and exposes it as a header.
pub fn count_visit(cache: &Arc<CacheStore>, req: &mut Request) -> anyhow::Result<()> {
    let key = visit_key(req.path_only());
    let count = cache.update(&key, |value| {
        let next = value.as_u64().unwrap_or(0) + 1;
        *value = Value::from(next);
        next
    });
    req.set_header(VISIT_COUNT_HEADER, count.to_string());

    if let Err(e) = cache.save() {
        tracing::warn!(key = %key, error = %e, "Failed to persist visit count");
    }
    Ok(())
}

/// Sets the body digest header.
pub fn stamp_digest(toolkit: &Toolkit, resp: &mut Response) {
    let digest = toolkit.sha256_hex(&resp.body);
    resp.set_header(DIGEST_HEADER, format!("sha-256={digest}"));
}

/// Greets a new WebSocket client.
pub fn greet(conn: &Connection, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::debug!(conn_id = %conn.id(), client = %addr, "Greeting WebSocket client");
    conn.send_text("welcome")?;
    Ok(())
}

/// Sends every message back to its sender.
pub fn echo(conn: &Connection, _addr: SocketAddr, message: &WsMessage) -> anyhow::Result<()> {
    conn.send(message.clone())?;
    Ok(())
}

/// Logs the end of a WebSocket session.
pub fn farewell(conn: &Connection, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::debug!(conn_id = %conn.id(), client = %addr, "WebSocket client left");
    Ok(())
}

#[cfg(test)]
mod tests {
    use lynx_plugin::hooks::definitions::ClientHandle;

    use super::*;

    fn request(path: &str) -> Request {
        Request::new("GET", path, "HTTP/1.1", ClientHandle::new("127.0.0.1:1".parse().unwrap()))
    }

    #[test]
    fn test_count_visit_increments_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::load(dir.path().join("cache.dat")));

        let mut first = request("/a?x=1");
        count_visit(&cache, &mut first).unwrap();
        let mut second = request("/a");
        count_visit(&cache, &mut second).unwrap();
        let mut other = request("/b");
        count_visit(&cache, &mut other).unwrap();

        assert_eq!(first.header(VISIT_COUNT_HEADER), Some("1"));
        assert_eq!(second.header(VISIT_COUNT_HEADER), Some("2"));
        assert_eq!(other.header(VISIT_COUNT_HEADER), Some("1"));

        let reloaded = CacheStore::load(dir.path().join("cache.dat"));
        assert_eq!(reloaded.get(&visit_key("/a")), Some(Value::from(2u64)));
    }

    #[test]
    fn test_count_visit_tolerates_detached_cache() {
        let cache = Arc::new(CacheStore::in_memory());
        let mut req = request("/");
        assert!(count_visit(&cache, &mut req).is_ok());
        assert_eq!(req.header(VISIT_COUNT_HEADER), Some("1"));
    }

    #[test]
    fn test_stamp_digest() {
        let toolkit = Toolkit::new("ffmpeg").unwrap();
        let mut resp = Response::text(200, "abc");
        stamp_digest(&toolkit, &mut resp);
        assert_eq!(
            resp.header(DIGEST_HEADER),
            Some("sha-256=ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[tokio::test]
    async fn test_echo_and_greet() {
        let (conn, mut rx) = Connection::new(4);
        let addr: SocketAddr = "127.0.0.1:2".parse().unwrap();

        greet(&conn, addr).unwrap();
        echo(&conn, addr, &WsMessage::Text("ping".into())).unwrap();

        assert_eq!(rx.recv().await, Some(WsMessage::Text("welcome".into())));
        assert_eq!(rx.recv().await, Some(WsMessage::Text("ping".into())));
    }
}
