//! lockd integration test harness.
//!
//! Each test starts an in-process daemon (device gateway, HTTP API and
//! liveness monitor) on ephemeral loopback ports with an in-memory
//! directory, and drives it with fake locks speaking the real WebSocket
//! protocol.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use lockd_core::{DeviceRecord, SharedClock, SystemClock};
use lockd_services::{
    CommandRouter, ConnectionRegistry, LivenessMonitor, MemoryDirectory, SharedDirectory,
    TaskScheduler,
};

mod commands;
mod handshake;
mod liveness;
mod removal;

/// How long a fake lock waits for a frame before giving up.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

// ── Daemon ────────────────────────────────────────────────────────────────────

pub struct Daemon {
    pub device_url: String,
    pub api_url: String,
    pub directory: SharedDirectory,
    pub registry: ConnectionRegistry,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Start with a heartbeat long enough that it never fires during a test.
    pub async fn start() -> Result<Self> {
        Self::with_heartbeat(Duration::from_secs(3600)).await
    }

    pub async fn with_heartbeat(heartbeat: Duration) -> Result<Self> {
        let directory: SharedDirectory = Arc::new(MemoryDirectory::new());
        let registry = ConnectionRegistry::new();
        let scheduler = TaskScheduler::new();
        let clock: SharedClock = Arc::new(SystemClock);
        let (shutdown, _) = broadcast::channel(1);

        let device_listener = TcpListener::bind("127.0.0.1:0").await?;
        let api_listener = TcpListener::bind("127.0.0.1:0").await?;
        let device_url = format!("ws://{}/", device_listener.local_addr()?);
        let api_url = format!("http://{}/api", api_listener.local_addr()?);

        let gateway = lockd_api::GatewayState {
            directory: directory.clone(),
            registry: registry.clone(),
            clock: clock.clone(),
        };
        let api = lockd_api::ApiState {
            directory: directory.clone(),
            registry: registry.clone(),
            router: CommandRouter::new(
                directory.clone(),
                registry.clone(),
                scheduler.clone(),
                clock.clone(),
                Duration::from_millis(200),
            ),
            clock: clock.clone(),
        };
        let monitor = LivenessMonitor::new(
            directory.clone(),
            registry.clone(),
            scheduler,
            clock,
            heartbeat,
        );

        let tasks = vec![
            tokio::spawn(async move {
                let _ = lockd_api::serve_devices_on(device_listener, gateway).await;
            }),
            tokio::spawn(async move {
                let _ = lockd_api::serve_api_on(api_listener, api).await;
            }),
            tokio::spawn(monitor.run(shutdown.subscribe())),
        ];

        Ok(Self {
            device_url,
            api_url,
            directory,
            registry,
            shutdown,
            tasks,
        })
    }

    pub fn record(&self, mac: &str) -> Option<DeviceRecord> {
        self.directory.find(mac).ok().flatten()
    }

    pub async fn get(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::get(format!("{}{}", self.api_url, path)).await?;
        read(resp).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new()
            .post(format!("{}{}", self.api_url, path))
            .json(&body)
            .send()
            .await?;
        read(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new()
            .delete(format!("{}{}", self.api_url, path))
            .send()
            .await?;
        read(resp).await
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn read(resp: reqwest::Response) -> Result<(u16, Value)> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok((status, body))
}

/// Poll `cond` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Fake lock ─────────────────────────────────────────────────────────────────

pub struct FakeLock {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl FakeLock {
    /// Open a socket without announcing.
    pub async fn connect(daemon: &Daemon) -> Result<Self> {
        let (ws, _) = connect_async(daemon.device_url.as_str())
            .await
            .context("device gateway refused the connection")?;
        Ok(Self { ws })
    }

    /// Connect, consume the identity request, and announce `mac`.
    pub async fn online(daemon: &Daemon, mac: &str) -> Result<Self> {
        let mut lock = Self::connect(daemon).await?;
        let first = lock.recv().await?;
        if first != serde_json::json!({ "request": "SEND_MAC" }) {
            bail!("expected identity request, got {first}");
        }
        let registry = daemon.registry.clone();
        let previous = registry.lookup(mac).map(|c| c.id());
        lock.announce(mac).await?;
        // A fresh binding always carries a fresh connection id.
        if !wait_until(RECV_TIMEOUT, || registry.lookup(mac).map(|c| c.id()) != previous).await {
            bail!("{mac} never became routable");
        }
        Ok(lock)
    }

    pub async fn announce(&mut self, mac: &str) -> Result<()> {
        self.send(serde_json::json!({ "macAddress": mac })).await
    }

    pub async fn pong(&mut self, mac: &str) -> Result<()> {
        self.send(serde_json::json!({ "macAddress": mac, "response": "PONG" }))
            .await
    }

    pub async fn send(&mut self, value: Value) -> Result<()> {
        self.send_raw(Message::Text(value.to_string().into())).await
    }

    pub async fn send_raw(&mut self, msg: Message) -> Result<()> {
        self.ws.send(msg).await.context("send to gateway failed")
    }

    /// Next JSON text frame from the server.
    pub async fn recv(&mut self) -> Result<Value> {
        loop {
            let next = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for a frame")?;
            match next {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).context("server sent invalid JSON");
                }
                Some(Ok(Message::Close(_))) | None => bail!("connection closed"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => bail!("socket error: {e}"),
            }
        }
    }

    /// True if nothing arrives within `within`.
    pub async fn stays_quiet(&mut self, within: Duration) -> bool {
        match tokio::time::timeout(within, self.ws.next()).await {
            Err(_) => true,
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => true,
            Ok(_) => false,
        }
    }

    /// Wait for the server to close the socket.
    pub async fn closed(&mut self) -> bool {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.ws.next()).await {
                Err(_) => return false,
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn hang_up(mut self) {
        let _ = self.ws.close(None).await;
    }
}
