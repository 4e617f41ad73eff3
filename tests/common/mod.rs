//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use donation_core::config::ServiceConfig;
use donation_core::gateway::SandboxGateway;
use donation_core::http::{AppState, HttpServer};
use donation_core::ledger::{
    Donation, GatewayTransaction, InMemoryLedger, LedgerStore, StoreError, StoreResult,
    TransactionStatus, Transition,
};
use donation_core::lifecycle::{assemble, Shutdown};
use donation_core::notify::{Notifier, NotifyError};

pub const ADMIN_KEY: &str = "test-admin-key";

/// Start a programmable mock backend on an ephemeral port.
///
/// The handler receives the request method and path and returns a status
/// code and a JSON body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some((method, path)) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(method, path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read one request (head plus Content-Length body) and return method and path.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<(String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    Some((method, path))
}

/// Counts notifications; can be told to fail.
#[derive(Debug, Default)]
pub struct CountingNotifier {
    pub receipts: AtomicUsize,
    pub admin_alerts: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingNotifier {
    pub fn receipts(&self) -> usize {
        self.receipts.load(Ordering::SeqCst)
    }

    pub fn admin_alerts(&self) -> usize {
        self.admin_alerts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn send_receipt(&self, _donation: &Donation, _reference: &str) -> Result<(), NotifyError> {
        self.receipts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("relay down".into()));
        }
        Ok(())
    }

    async fn notify_admins(&self, _donation: &Donation, _reference: &str) -> Result<(), NotifyError> {
        self.admin_alerts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("relay down".into()));
        }
        Ok(())
    }
}

/// Ledger whose `create_pair` can be switched off to simulate an outage,
/// or made to report a reference another writer took first.
#[derive(Default)]
pub struct FlakyLedger {
    pub inner: InMemoryLedger,
    pub fail_creates: AtomicBool,
    pub collide_creates: AtomicBool,
}

#[async_trait]
impl LedgerStore for FlakyLedger {
    async fn create_pair(&self, donation: Donation, transaction: GatewayTransaction) -> StoreResult<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("database offline".into()));
        }
        if self.collide_creates.load(Ordering::SeqCst) {
            return Err(StoreError::DuplicateReference(transaction.reference));
        }
        self.inner.create_pair(donation, transaction).await
    }

    async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<(GatewayTransaction, Donation)>> {
        self.inner.find_by_reference(reference).await
    }

    async fn get_donation(&self, id: Uuid) -> StoreResult<Option<Donation>> {
        self.inner.get_donation(id).await
    }

    async fn settle(
        &self,
        transaction_id: Uuid,
        expected: TransactionStatus,
        new_status: TransactionStatus,
        provider_status: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        self.inner
            .settle(transaction_id, expected, new_status, provider_status, at)
            .await
    }

    async fn record_attempt(
        &self,
        transaction_id: Uuid,
        provider_status: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<GatewayTransaction> {
        self.inner.record_attempt(transaction_id, provider_status, at).await
    }

    async fn record_callback(&self, reference: &str, at: DateTime<Utc>) -> StoreResult<GatewayTransaction> {
        self.inner.record_callback(reference, at).await
    }

    async fn list_pending(&self, older_than: DateTime<Utc>, attempts_below: u32) -> StoreResult<Vec<GatewayTransaction>> {
        self.inner.list_pending(older_than, attempts_below).await
    }

    async fn list_exhausted(&self, attempts_at_least: u32) -> StoreResult<Vec<GatewayTransaction>> {
        self.inner.list_exhausted(attempts_at_least).await
    }

    async fn flag_for_review(&self, transaction_id: Uuid, reason: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.flag_for_review(transaction_id, reason, at).await
    }

    async fn list_flagged(&self) -> StoreResult<Vec<GatewayTransaction>> {
        self.inner.list_flagged().await
    }
}

/// Everything a test needs to drive the service in-process.
pub struct TestApp {
    pub state: AppState,
    pub ledger: Arc<FlakyLedger>,
    pub gateway: Arc<SandboxGateway>,
    pub notifier: Arc<CountingNotifier>,
}

/// Config tuned for tests: no grace period, no backoff, known admin key.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.admin.api_key = ADMIN_KEY.to_string();
    config.scheduler.grace_period_secs = 0;
    config.scheduler.backoff_base_secs = 0;
    config.scheduler.backoff_max_secs = 0;
    config.scheduler.max_attempts = 3;
    config
        .roles
        .insert("root".to_string(), vec!["super_admin".to_string()]);
    config
        .roles
        .insert("ops".to_string(), vec!["admin".to_string()]);
    config
        .roles
        .insert("guest".to_string(), vec!["user".to_string()]);
    config
}

pub fn test_app(config: ServiceConfig) -> TestApp {
    let ledger = Arc::new(FlakyLedger::default());
    let gateway = Arc::new(SandboxGateway::new());
    let notifier = Arc::new(CountingNotifier::default());
    let state = assemble(config, ledger.clone(), gateway.clone(), notifier.clone());
    TestApp {
        state,
        ledger,
        gateway,
        notifier,
    }
}

/// Serve `state` on an ephemeral port.
pub async fn spawn_server(state: AppState) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(state);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Give the accept loop a moment.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
