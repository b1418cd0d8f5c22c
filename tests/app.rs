use async_trait::async_trait;
use axum::Router;
use httpspy::{
    app::AppState,
    db::{RequestReader, RequestWriter, SqliteStore},
    error::StorageError,
    http,
    models::request::captured_request::CapturedRequest,
};
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

struct TestServer {
    base: String,
    shutdown: CancellationToken,
    _dir: Option<TempDir>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn serve<S>(store: S, dir: Option<TempDir>) -> TestServer
where
    S: RequestReader + RequestWriter + Clone,
{
    let shutdown = CancellationToken::new();
    let (state, _writer) =
        AppState::new(store, shutdown.clone(), 1000, Duration::from_secs(5));
    let app: Router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await
            .unwrap();
    });
    TestServer {
        base: format!("http://{}", addr),
        shutdown,
        _dir: dir,
    }
}

async fn start_server() -> TestServer {
    let dir = TempDir::new().unwrap();
    let db_url = format!("sqlite://{}", dir.path().join("httpspy.db").display());
    let store = SqliteStore::connect(&db_url).await.expect("open sqlite");
    store.ensure_schema().await.expect("schema");
    serve(store, Some(dir)).await
}

/// Reads server-sent events off a streaming response, skipping keep-alive comments.
struct EventReader {
    res: reqwest::Response,
    buf: String,
}

impl EventReader {
    async fn connect(base: &str) -> EventReader {
        let res = reqwest::get(format!("{}/SSEUpdate", base)).await.unwrap();
        assert!(res.status().is_success());
        let ctype = res.headers()["content-type"].to_str().unwrap().to_string();
        assert!(ctype.starts_with("text/event-stream"), "got {ctype}");
        assert_eq!(res.headers()["cache-control"], "no-cache");
        EventReader {
            res,
            buf: String::new(),
        }
    }

    /// Next event within `wait`, `None` on timeout or end of stream.
    async fn next(&mut self, wait: Duration) -> Option<String> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(pos) = self.buf.find("\n\n") {
                let event: String = self.buf.drain(..pos + 2).collect();
                if event.starts_with(':') {
                    continue;
                }
                return Some(event);
            }
            let chunk = timeout_at(deadline, self.res.chunk()).await.ok()?.ok()??;
            self.buf.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    async fn count(&mut self, wait: Duration) -> usize {
        let deadline = Instant::now() + wait;
        let mut n = 0;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match self.next(remaining).await {
                Some(_) => n += 1,
                None => break,
            }
        }
        n
    }
}

async fn list(client: &reqwest::Client, base: &str, query: &str) -> Vec<Value> {
    let res = client
        .get(format!("{}/requests{}", base, query))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let v: Value = res.json().await.unwrap();
    v.as_array().unwrap().clone()
}

fn ids(rows: &[Value]) -> Vec<i64> {
    rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
}

#[tokio::test]
async fn capture_echoes_the_persisted_record() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/hook", srv.base))
        .header("x-probe", "one")
        .body("ping")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let v: Value = res.json().await.unwrap();
    assert_eq!(v["id"], 1);
    assert_eq!(v["method"], "POST");
    assert_eq!(v["url"], "/hook");
    assert_eq!(v["body"], "ping");
    assert!(v["timestamp"].as_str().is_some());
    let headers: Value = serde_json::from_str(v["headers"].as_str().unwrap()).unwrap();
    assert_eq!(headers["x-probe"], serde_json::json!(["one"]));

    let rows = list(&client, &srv.base, "").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[0]["body"], "ping");
}

#[tokio::test]
async fn any_method_and_query_string_is_captured() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let res = client
        .put(format!("{}/deep/path?a=1&b=two", srv.base))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let v: Value = res.json().await.unwrap();
    assert_eq!(v["method"], "PUT");
    assert_eq!(v["url"], "/deep/path?a=1&b=two");
    assert_eq!(v["body"], "");
}

#[tokio::test]
async fn list_is_newest_first_and_filters_by_exact_url() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let mut returned = Vec::new();
    for path in ["/a", "/b", "/a", "/a?x=1"] {
        let v: Value = client
            .get(format!("{}{}", srv.base, path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        returned.push(v["id"].as_i64().unwrap());
    }
    assert_eq!(returned, vec![1, 2, 3, 4]);

    let all = list(&client, &srv.base, "").await;
    assert_eq!(ids(&all), vec![4, 3, 2, 1]);
    assert_eq!(list(&client, &srv.base, "?url=").await, all);

    let a = list(&client, &srv.base, "?url=/a").await;
    assert_eq!(ids(&a), vec![3, 1]);
    assert!(a.iter().all(|r| r["url"] == "/a"));

    assert!(list(&client, &srv.base, "?url=/").await.is_empty());
    let with_query = list(&client, &srv.base, "?url=%2Fa%3Fx%3D1").await;
    assert_eq!(ids(&with_query), vec![4]);
}

#[tokio::test]
async fn concurrent_captures_get_distinct_ids() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let tasks: Vec<_> = (0..100)
        .map(|i| {
            let client = client.clone();
            let url = format!("{}/burst/{}", srv.base, i);
            tokio::spawn(async move {
                let v: Value = client.post(url).body("x").send().await.unwrap().json().await.unwrap();
                v["id"].as_i64().unwrap()
            })
        })
        .collect();

    let mut got = Vec::new();
    for t in tasks {
        got.push(t.await.unwrap());
    }
    got.sort_unstable();
    assert_eq!(got, (1..=100).collect::<Vec<_>>());

    let rows = list(&client, &srv.base, "").await;
    let mut stored = ids(&rows);
    stored.sort_unstable();
    assert_eq!(stored, got);
}

#[tokio::test]
async fn clear_empties_the_log() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    for path in ["/one", "/two"] {
        let res = client.get(format!("{}{}", srv.base, path)).send().await.unwrap();
        assert!(res.status().is_success());
    }

    let res = client.post(format!("{}/clear", srv.base)).send().await.unwrap();
    assert!(res.status().is_success());
    let v: Value = res.json().await.unwrap();
    assert_eq!(v["cleared"], 2);
    assert!(list(&client, &srv.base, "").await.is_empty());

    let res = client.delete(format!("{}/clear", srv.base)).send().await.unwrap();
    let v: Value = res.json().await.unwrap();
    assert_eq!(v["cleared"], 0);
}

#[tokio::test]
async fn stream_announces_capture_after_reply() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let mut events = EventReader::connect(&srv.base).await;

    let first = events.next(Duration::from_secs(2)).await.expect("initial event");
    assert!(first.contains("data: updated"));
    assert_eq!(events.count(Duration::from_millis(200)).await, 0);

    let v: Value = client
        .post(format!("{}/hook", srv.base))
        .body("ping")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = v["id"].as_i64().unwrap();

    let event = events.next(Duration::from_secs(2)).await.expect("update event");
    assert!(event.contains("data: updated"));

    // The announced record is already readable.
    let rows = list(&client, &srv.base, "").await;
    assert_eq!(ids(&rows), vec![id]);
}

#[tokio::test]
async fn clear_notifies_each_subscriber_once() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let mut a = EventReader::connect(&srv.base).await;
    let mut b = EventReader::connect(&srv.base).await;
    assert!(a.next(Duration::from_secs(2)).await.is_some());
    assert!(b.next(Duration::from_secs(2)).await.is_some());

    let res = client.post(format!("{}/clear", srv.base)).send().await.unwrap();
    assert!(res.status().is_success());

    assert_eq!(a.count(Duration::from_millis(500)).await, 1);
    assert_eq!(b.count(Duration::from_millis(500)).await, 1);
}

#[tokio::test]
async fn shutdown_ends_live_streams() {
    let srv = start_server().await;
    let mut events = EventReader::connect(&srv.base).await;
    assert!(events.next(Duration::from_secs(2)).await.is_some());

    srv.shutdown.cancel();
    let end = timeout_at(Instant::now() + Duration::from_secs(2), events.res.chunk()).await;
    assert!(matches!(end, Ok(Ok(None)) | Ok(Err(_))));
}

#[tokio::test]
async fn static_watch_assets_are_served_uncached() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    for (path, ctype) in [
        ("/watch", "text/html"),
        ("/watch.js", "text/javascript"),
        ("/watch.css", "text/css"),
        ("/favicon.ico", "image/svg+xml"),
    ] {
        let res = client.get(format!("{}{}", srv.base, path)).send().await.unwrap();
        assert!(res.status().is_success(), "{path}");
        assert_eq!(res.headers()["cache-control"], "no-cache");
        assert!(res.headers()["content-type"].to_str().unwrap().starts_with(ctype));
    }
    assert!(list(&client, &srv.base, "").await.is_empty());
}

#[derive(Clone)]
struct BrokenStore;

fn broken() -> StorageError {
    sqlx::Error::Protocol("disk full".into()).into()
}

#[async_trait]
impl RequestReader for BrokenStore {
    async fn query_all(&self) -> Result<Vec<CapturedRequest>, StorageError> {
        Err(broken())
    }

    async fn query_by_url(&self, _url: &str) -> Result<Vec<CapturedRequest>, StorageError> {
        Err(broken())
    }
}

#[async_trait]
impl RequestWriter for BrokenStore {
    async fn insert(&self, _record: &CapturedRequest) -> Result<i64, StorageError> {
        Err(broken())
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        Err(broken())
    }
}

#[tokio::test]
async fn storage_failures_surface_as_server_errors_without_notifying() {
    let srv = serve(BrokenStore, None).await;
    let client = reqwest::Client::new();
    let mut events = EventReader::connect(&srv.base).await;
    assert!(events.next(Duration::from_secs(2)).await.is_some());

    let res = client.post(format!("{}/hook", srv.base)).body("ping").send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.text().await.unwrap().contains("disk full"));

    let res = client.post(format!("{}/clear", srv.base)).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    let res = client.get(format!("{}/requests", srv.base)).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(events.count(Duration::from_millis(300)).await, 0);
}
