//! End-to-end tests against a local HTTP server speaking the search protocol

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lenze_core::{
    ClientConfig, ConversationHistoryLoader, SearchApiClient, SearchPhase, SearchSnapshot,
    SessionId, SessionStreamController,
};
use tokio::sync::mpsc;

struct Route {
    prefix: &'static str,
    status: u16,
    content_type: &'static str,
    body: String,
}

fn route(prefix: &'static str, status: u16, content_type: &'static str, body: &str) -> Route {
    Route {
        prefix,
        status,
        content_type,
        body: body.to_string(),
    }
}

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    url: String,
    accept: Option<String>,
}

struct TestServer {
    config: ClientConfig,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl TestServer {
    fn start(routes: Vec<Route>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let accept = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Accept"))
                    .map(|h| h.value.as_str().to_string());
                recorded.lock().unwrap().push(Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    accept,
                });

                let response = match routes.iter().find(|r| request.url().starts_with(r.prefix)) {
                    Some(r) => tiny_http::Response::from_string(r.body.clone())
                        .with_status_code(r.status)
                        .with_header(
                            tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                r.content_type.as_bytes(),
                            )
                            .unwrap(),
                        ),
                    None => tiny_http::Response::from_string("no route").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });

        let config = ClientConfig {
            base_url: format!("http://{addr}"),
            ..Default::default()
        };
        Self { config, requests }
    }

    fn requests_to(&self, prefix: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .cloned()
            .collect()
    }
}

async fn wait_for(
    snapshots: &mut mpsc::UnboundedReceiver<SearchSnapshot>,
    predicate: impl Fn(&SearchSnapshot) -> bool,
) -> SearchSnapshot {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = snapshots.recv().await.expect("controller stopped");
            if predicate(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

fn watch(
    controller: &SessionStreamController,
) -> (
    lenze_core::Subscription,
    mpsc::UnboundedReceiver<SearchSnapshot>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = controller
        .subscribe(move |snapshot| {
            let _ = tx.send(snapshot.clone());
        })
        .unwrap();
    (subscription, rx)
}

const FULL_STREAM: &str = concat!(
    "event: source\n",
    "data: [{\"title\":\"S1\",\"link\":\"http://x\"}]\n",
    "\n",
    "data: Hello\n",
    "\n",
    ": keep-alive\n",
    "data:  world\n",
    "\n",
    "event: finaljson\n",
    "data: {\"related\":[\"q1\",\"q2\"],\"time_taken\":\"1.2s\"}\n",
    "\n",
);

#[tokio::test]
async fn test_stream_over_http_finalizes() {
    let server = TestServer::start(vec![
        route("/web-search-stream/", 200, "text/event-stream", FULL_STREAM),
        route(
            "/conversation/",
            200,
            "application/json",
            r#"[{"query":"before","response":"earlier answer"}]"#,
        ),
    ]);
    let controller = SessionStreamController::from_config(&server.config).unwrap();
    let (_subscription, mut snapshots) = watch(&controller);

    controller
        .start_search(SessionId::new("abc"), "rust streams")
        .unwrap();
    let snapshot = wait_for(&mut snapshots, |s| s.phase == SearchPhase::Finalized).await;

    assert_eq!(snapshot.answer_text, "Hello world");
    assert_eq!(snapshot.sources.len(), 1);
    assert_eq!(snapshot.sources[0].link, "http://x");
    assert_eq!(snapshot.related_queries, ["q1", "q2"]);
    assert_eq!(snapshot.time_taken, "1.2s");

    let opened = server.requests_to("/web-search-stream/");
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].method, "POST");
    assert_eq!(opened[0].url, "/web-search-stream/abc?query=rust+streams");
    assert_eq!(opened[0].accept.as_deref(), Some("text/event-stream"));

    // History loads alongside the stream and may land before or after Final
    let with_history = if snapshot.history.is_empty() {
        wait_for(&mut snapshots, |s| !s.history.is_empty()).await
    } else {
        snapshot
    };
    assert_eq!(with_history.history[0].query, "before");
    assert_eq!(with_history.phase, SearchPhase::Finalized);

    controller.dispose().await;
}

#[tokio::test]
async fn test_open_not_found_fails_once() {
    let server = TestServer::start(vec![route(
        "/web-search-stream/",
        404,
        "text/plain",
        "Not Found",
    )]);
    let controller = SessionStreamController::from_config(&server.config).unwrap();
    let (_subscription, mut snapshots) = watch(&controller);

    controller.start_search(SessionId::new("abc"), "q").unwrap();
    let snapshot = wait_for(&mut snapshots, |s| s.phase == SearchPhase::Failed).await;

    assert!(snapshot.answer_text.is_empty());
    assert!(!snapshot.searching);
    assert!(!snapshot.streaming);
    let error = snapshot.last_error.unwrap();
    assert!(error.contains("404"), "{error}");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.requests_to("/web-search-stream/").len(), 1);
}

#[tokio::test]
async fn test_rate_limited_open_is_fatal() {
    let server = TestServer::start(vec![route(
        "/web-search-stream/",
        429,
        "text/plain",
        "Too Many Requests",
    )]);
    let controller = SessionStreamController::from_config(&server.config).unwrap();
    let (_subscription, mut snapshots) = watch(&controller);

    controller.start_search(SessionId::new("abc"), "q").unwrap();
    let snapshot = wait_for(&mut snapshots, |s| s.phase == SearchPhase::Failed).await;
    assert!(snapshot.last_error.unwrap().contains("rate limited"));
}

#[tokio::test]
async fn test_peer_close_without_final() {
    let server = TestServer::start(vec![route(
        "/web-search-stream/",
        200,
        "text/event-stream",
        "data: cut\n\ndata:  short\n\n",
    )]);
    let controller = SessionStreamController::from_config(&server.config).unwrap();
    let (_subscription, mut snapshots) = watch(&controller);

    controller.start_search(SessionId::new("abc"), "q").unwrap();
    let snapshot = wait_for(&mut snapshots, |s| s.phase == SearchPhase::Closed).await;
    assert_eq!(snapshot.answer_text, "cut short");
    assert!(snapshot.last_error.is_none());
    assert!(snapshot.turn.is_none());
}

#[tokio::test]
async fn test_history_loader_over_http() {
    let server = TestServer::start(vec![
        route("/conversation/empty", 200, "application/json", "[]"),
        route("/conversation/broken", 200, "application/json", "{not json"),
        route("/conversation/down", 500, "text/plain", "boom"),
    ]);
    let client = SearchApiClient::new(server.config.endpoints().unwrap());
    let loader = ConversationHistoryLoader::new(Arc::new(client));

    let empty = loader.load(&SessionId::new("empty")).await;
    assert!(empty.turns.is_empty());
    assert!(empty.warning.is_none());

    let broken = loader.load(&SessionId::new("broken")).await;
    assert!(broken.turns.is_empty());
    assert!(broken.warning.is_some());

    let down = loader.load(&SessionId::new("down")).await;
    assert!(down.turns.is_empty());
    assert!(down.warning.unwrap().contains("500"));
}

#[tokio::test]
async fn test_session_endpoints() {
    let server = TestServer::start(vec![
        route(
            "/start-session",
            200,
            "application/json",
            r#"{"session_id":"f00d"}"#,
        ),
        route(
            "/search-history",
            200,
            "application/json",
            r#"[{"session_id":"f00d","first_query":"what is rust"},{"session_id":7,"first_query":"tokio"}]"#,
        ),
    ]);
    let client = SearchApiClient::new(server.config.endpoints().unwrap());

    let session = client.create_session().await.unwrap();
    assert_eq!(session, SessionId::new("f00d"));
    assert_eq!(server.requests_to("/start-session")[0].method, "POST");

    let sessions = client.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].first_query, "what is rust");
    assert_eq!(sessions[1].session_id.as_str(), "7");
}
