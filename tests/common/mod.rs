//! Shared test utilities

#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use switchboard::config::SwitchboardConfigFile;
use switchboard::transports::{ClientRef, ConnectionParams, HandlerRef};
use switchboard::{TaskUnits, TransportKind, TransportSpec, TransportUnits};

/// Transport units that run real unit tasks but remember every reference
/// handed out, and can be told to hang or panic on a given IRC host
#[derive(Default)]
pub struct RecordingUnits {
    pub handlers: Mutex<Vec<HandlerRef>>,
    pub clients: Mutex<Vec<ClientRef>>,
    pub hang_on_host: Option<String>,
    pub panic_on_host: Option<String>,
}

impl RecordingUnits {
    pub fn hanging_on(host: &str) -> Self {
        Self {
            hang_on_host: Some(host.to_string()),
            ..Self::default()
        }
    }

    pub fn panicking_on(host: &str) -> Self {
        Self {
            panic_on_host: Some(host.to_string()),
            ..Self::default()
        }
    }

    pub fn handlers(&self) -> Vec<HandlerRef> {
        self.handlers.lock().unwrap().clone()
    }

    pub fn clients(&self) -> Vec<ClientRef> {
        self.clients.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportUnits for RecordingUnits {
    fn start_handler(&self, kind: TransportKind) -> HandlerRef {
        let handler = TaskUnits.start_handler(kind);
        self.handlers.lock().unwrap().push(handler.clone());
        handler
    }

    async fn start_client(
        &self,
        handler: &HandlerRef,
        params: ConnectionParams,
    ) -> switchboard::Result<ClientRef> {
        if let ConnectionParams::Irc { host, .. } = &params {
            if self.hang_on_host.as_ref() == Some(host) {
                std::future::pending::<()>().await;
            }
            if self.panic_on_host.as_ref() == Some(host) {
                panic!("client for {host} crashed while connecting");
            }
        }

        let client = TaskUnits.start_client(handler, params).await?;
        self.clients.lock().unwrap().push(client.clone());
        Ok(client)
    }
}

/// Parse `[[transports]]` entries from a TOML snippet
pub fn transports(toml: &str) -> Vec<TransportSpec> {
    let file: SwitchboardConfigFile = toml::from_str(toml).expect("invalid transport toml");
    file.transports
}

/// IRC transport TOML with the given host and `use_ssl` literal
pub fn irc(host: &str, use_ssl: &str) -> String {
    format!(
        r##"
[[transports]]
protocol = "irc"
nick = "switchbot"
channel = "#bots"
host = "{host}"
options = {{ port = 6667, use_ssl = {use_ssl} }}
"##
    )
}

/// Create an empty file (and parent directories) under `dir`
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture dir");
    }
    std::fs::write(&path, "").expect("failed to write fixture");
    path
}

/// Poll an async condition until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
