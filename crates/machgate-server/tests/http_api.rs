//! End-to-end tests for the control surface: a real listener, a started
//! manager over a recording transport double, and a plain HTTP client.

use async_trait::async_trait;
use machgate_core::TransportError;
use machgate_machine::{
    LineConfig, MachineManager, ManagerConfig, MatchFilter, Transport, TransportHandle,
    TransportSink,
};
use machgate_settings::MemoryStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    sent: Mutex<Vec<Vec<u8>>>,
    bauds: Mutex<Vec<u32>>,
    sink: Mutex<Option<TransportSink>>,
}

struct MockTransport {
    state: Arc<MockState>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        _filter: &MatchFilter,
        sink: TransportSink,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        *self.state.sink.lock() = Some(sink);
        Ok(Box::new(MockHandle {
            state: self.state.clone(),
        }))
    }
}

struct MockHandle {
    state: Arc<MockState>,
}

#[async_trait]
impl TransportHandle for MockHandle {
    async fn set_line_config(&self, config: LineConfig) -> Result<(), TransportError> {
        self.state.bauds.lock().push(config.baud_rate);
        Ok(())
    }

    async fn send(&self, bytes: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        self.state.sent.lock().push(bytes.to_vec());
        Ok(())
    }

    async fn close(&self) {}
}

struct TestServer {
    base: String,
    manager: Arc<MachineManager>,
    state: Arc<MockState>,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

impl TestServer {
    async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        let store = Arc::new(MemoryStore::new());
        let manager = Arc::new(MachineManager::new(
            Arc::new(MockTransport {
                state: state.clone(),
            }),
            store.clone(),
            ManagerConfig {
                open_retry_delay: Duration::from_millis(10),
                send_retry_delay: Duration::from_millis(5),
                send_timeout: Duration::from_millis(200),
                ..ManagerConfig::default()
            },
        ));
        manager.start().unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(machgate_server::serve(listener, manager.clone()));

        let server = Self {
            base: format!("http://{}", addr),
            manager,
            state,
            store,
            client: reqwest::Client::new(),
        };
        server.wait_connected().await;
        server
    }

    async fn wait_connected(&self) {
        for _ in 0..300 {
            if self.manager.is_connected() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("device never opened");
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..300 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn test_health_reports_identity() {
    let server = TestServer::spawn().await;

    let response = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["name"], "machgate");
    assert!(!body["version"].as_str().unwrap().is_empty());
    assert!(!body["build_date"].as_str().unwrap().is_empty());

    server.manager.shutdown();
}

#[tokio::test]
async fn test_machine_status_reflects_connection() {
    let server = TestServer::spawn().await;

    let body: serde_json::Value = server
        .client
        .get(server.url("/machine-status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["connected"], true);

    server.manager.shutdown();
}

#[tokio::test]
async fn test_post_commands_enqueues_in_order() {
    let server = TestServer::spawn().await;

    let response = server
        .client
        .post(server.url("/commands"))
        .json(&serde_json::json!({ "commands": ["G28", "M114"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["accepted"], 2);

    let state = server.state.clone();
    wait_until("both frames transmitted", || state.sent.lock().len() == 2).await;
    assert_eq!(
        state.sent.lock().clone(),
        vec![b"G28\n".to_vec(), b"M114\n".to_vec()]
    );

    server.manager.shutdown();
}

#[tokio::test]
async fn test_post_commands_validation() {
    let server = TestServer::spawn().await;

    let response = server
        .client
        .post(server.url("/commands"))
        .json(&serde_json::json!({ "commands": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // The batch stops at the first invalid command and reports progress.
    let response = server
        .client
        .post(server.url("/commands"))
        .json(&serde_json::json!({ "commands": ["G28", ""] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["accepted"], 1);

    server.manager.shutdown();
}

#[tokio::test]
async fn test_stop_start_cycle_and_misuse_codes() {
    let server = TestServer::spawn().await;

    let stop = server.client.put(server.url("/stop")).send().await.unwrap();
    assert_eq!(stop.status(), 204);

    // Pausing a paused gate times out.
    let stop_again = server.client.put(server.url("/stop")).send().await.unwrap();
    assert_eq!(stop_again.status(), 504);

    let start = server.client.put(server.url("/start")).send().await.unwrap();
    assert_eq!(start.status(), 204);

    // Resuming a resumed gate is a conflict.
    let start_again = server.client.put(server.url("/start")).send().await.unwrap();
    assert_eq!(start_again.status(), 409);

    server.manager.shutdown();
}

#[tokio::test]
async fn test_clear_empties_pending_queue() {
    let server = TestServer::spawn().await;

    server.client.put(server.url("/stop")).send().await.unwrap();
    server
        .client
        .post(server.url("/commands"))
        .json(&serde_json::json!({ "commands": ["G1 X1", "G1 X2", "G1 X3"] }))
        .send()
        .await
        .unwrap();

    let clear = server.client.put(server.url("/clear")).send().await.unwrap();
    assert_eq!(clear.status(), 204);

    server.client.put(server.url("/start")).send().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.state.sent.lock().len() <= 1);

    server.manager.shutdown();
}

#[tokio::test]
async fn test_responses_drain_is_bounded() {
    let server = TestServer::spawn().await;

    let empty = server
        .client
        .get(server.url("/responses"))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 200);
    assert!(empty.bytes().await.unwrap().is_empty());

    server
        .state
        .sink
        .lock()
        .as_ref()
        .unwrap()
        .bytes_arrived(b"ok\nX:10\n");

    let partial = server
        .client
        .get(server.url("/responses?max_bytes=3"))
        .send()
        .await
        .unwrap();
    assert_eq!(&partial.bytes().await.unwrap()[..], b"ok\n");

    let rest = server
        .client
        .get(server.url("/responses"))
        .send()
        .await
        .unwrap();
    assert_eq!(&rest.bytes().await.unwrap()[..], b"X:10\n");

    server.manager.shutdown();
}

#[tokio::test]
async fn test_machine_config_put_persists_and_recycles() {
    use machgate_core::ConfigStore;

    let server = TestServer::spawn().await;

    let bad = server
        .client
        .put(server.url("/machine-config"))
        .json(&serde_json::json!({ "baud_rate": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);

    let ok = server
        .client
        .put(server.url("/machine-config"))
        .json(&serde_json::json!({ "baud_rate": 9600 }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 204);
    assert_eq!(server.store.get_u32("baud_rate"), Some(9600));

    let state = server.state.clone();
    wait_until("reopened at 9600", || state.bauds.lock().last() == Some(&9600)).await;

    server.manager.shutdown();
}
