//! Orchestrator - the single coordinating actor
//!
//! Owns the plugin registry and the list of running transports. All reads
//! and writes happen inside the actor task, one command at a time, so the
//! registry and transport list never need a lock. Slow work (directory
//! walks, transport launches) runs on separate tasks that report back
//! through the same mailbox.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::plugins::{PluginRecord, PluginWatcher, find_plugin, load_registry};
use crate::transports::{
    TransportHandle, TransportSpec, TransportSummary, TransportUnits, launch_reporting,
};
use crate::{Error, Result};

/// Mailbox capacity of the orchestrator
const MAILBOX_CAPACITY: usize = 64;

/// Everything the orchestrator needs to start up
#[derive(Debug)]
pub struct InitRequest {
    /// Root of the plugin tree
    pub plugin_dir: PathBuf,
    /// Transports to launch
    pub transports: Vec<TransportSpec>,
    /// Poll interval of the hot-reload watcher; `None` disables it
    pub watch_interval: Option<Duration>,
}

/// Authoritative orchestrator state
#[derive(Debug, Default)]
pub struct OrchestratorState {
    /// Plugin registry in discovery order
    pub plugins: Vec<PluginRecord>,
    /// Successfully launched transports
    pub transports: Vec<TransportHandle>,
}

enum Command {
    Initialize(InitRequest),
    GetPlugin {
        name: String,
        reply: oneshot::Sender<Option<PluginRecord>>,
    },
    GetAllPlugins {
        reply: oneshot::Sender<Vec<PluginRecord>>,
    },
    GetTransports {
        reply: oneshot::Sender<Vec<TransportSummary>>,
    },
    ApplyRegistryUpdate(Vec<PluginRecord>),
    RecordTransports(Vec<TransportHandle>),
    WatcherStarted(JoinHandle<()>),
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// The orchestrator actor
pub struct Orchestrator {
    state: OrchestratorState,
    units: Arc<dyn TransportUnits>,
    rx: mpsc::Receiver<Command>,
    self_tx: mpsc::WeakSender<Command>,
    watcher: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Spawn the orchestrator on its own task
    ///
    /// Returns the handle collaborators talk to it through, and the actor's
    /// join handle. The actor starts with an empty registry and no
    /// transports; send [`OrchestratorHandle::initialize`] to populate them.
    #[must_use]
    pub fn spawn(units: Arc<dyn TransportUnits>) -> (OrchestratorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = Self {
            state: OrchestratorState::default(),
            units,
            rx,
            self_tx: tx.downgrade(),
            watcher: None,
        };

        let task = tokio::spawn(actor.run());
        (OrchestratorHandle { tx }, task)
    }

    async fn run(mut self) {
        tracing::debug!("orchestrator started");

        while let Some(command) = self.rx.recv().await {
            if !self.handle(command) {
                break;
            }
        }

        self.stop_all();
        tracing::info!("orchestrator stopped");
    }

    /// Process one command; returns `false` when the actor should exit
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Initialize(request) => self.initialize(request),
            Command::GetPlugin { name, reply } => {
                let found = find_plugin(&self.state.plugins, &name).cloned();
                if found.is_none() {
                    tracing::debug!(name = %name, "wrong plugin requested");
                }
                let _ = reply.send(found);
            }
            Command::GetAllPlugins { reply } => {
                let _ = reply.send(self.state.plugins.clone());
            }
            Command::GetTransports { reply } => {
                let summaries = self
                    .state
                    .transports
                    .iter()
                    .map(TransportHandle::summary)
                    .collect();
                let _ = reply.send(summaries);
            }
            Command::ApplyRegistryUpdate(plugins) => {
                tracing::debug!(count = plugins.len(), "plugin registry replaced");
                self.state.plugins = plugins;
            }
            Command::RecordTransports(transports) => {
                tracing::debug!(count = transports.len(), "transport list replaced");
                self.state.transports = transports;
            }
            Command::WatcherStarted(watcher) => {
                if let Some(previous) = self.watcher.replace(watcher) {
                    previous.abort();
                }
            }
            Command::Shutdown { reply } => {
                self.stop_all();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Kick off registry loading and transport launching; neither blocks
    /// the mailbox or each other
    ///
    /// Both tasks only hold weak handles, so dropping every caller handle
    /// still ends the actor while a launch hangs.
    fn initialize(&self, request: InitRequest) {
        let handle = WeakOrchestratorHandle {
            tx: self.self_tx.clone(),
        };

        tracing::info!(
            plugin_dir = %request.plugin_dir.display(),
            transports = request.transports.len(),
            watch = request.watch_interval.is_some(),
            "initializing orchestrator"
        );

        tokio::spawn(load_plugins(
            handle.clone(),
            request.plugin_dir,
            request.watch_interval,
        ));
        tokio::spawn(launch_transports(
            handle,
            Arc::clone(&self.units),
            request.transports,
        ));
    }

    fn stop_all(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        for transport in self.state.transports.drain(..) {
            tracing::debug!(identity = %transport.identity, "stopping transport");
            transport.stop();
        }
    }
}

async fn load_plugins(weak: WeakOrchestratorHandle, dir: PathBuf, watch: Option<Duration>) {
    let root = dir.clone();
    let plugins = match tokio::task::spawn_blocking(move || load_registry(&root)).await {
        Ok(Ok(plugins)) => plugins,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "plugin registry unavailable, continuing without plugins");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "plugin registry load task failed");
            return;
        }
    };

    let Some(handle) = weak.upgrade() else {
        return;
    };
    if handle.apply_registry_update(plugins.clone()).await.is_err() {
        return;
    }

    if let Some(interval) = watch {
        let watcher = PluginWatcher::new(dir, interval, plugins).spawn(weak);
        if let Err(e) = handle.send(Command::WatcherStarted(watcher)).await {
            tracing::debug!(error = %e, "orchestrator gone before watcher registered");
        }
    }
}

async fn launch_transports(
    weak: WeakOrchestratorHandle,
    units: Arc<dyn TransportUnits>,
    specs: Vec<TransportSpec>,
) {
    if specs.is_empty() {
        tracing::warn!("no transports configured");
        return;
    }

    launch_reporting(units, specs, |handles| {
        let handle = weak.upgrade();
        async move {
            match handle {
                Some(handle) => handle.record_transports(handles).await.is_ok(),
                None => false,
            }
        }
    })
    .await;
}

/// Cloneable handle used to talk to the orchestrator
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Command>,
}

impl OrchestratorHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::OrchestratorStopped)
    }

    async fn call<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response.await.map_err(|_| Error::OrchestratorStopped)
    }

    /// Start loading plugins and launching transports
    ///
    /// Returns as soon as the request is queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrchestratorStopped`] if the actor has exited
    pub async fn initialize(&self, request: InitRequest) -> Result<()> {
        self.send(Command::Initialize(request)).await
    }

    /// Look up a plugin by name
    ///
    /// Returns `Ok(None)` when no plugin has that name. When several share
    /// it, the first in registry order is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrchestratorStopped`] if the actor has exited
    pub async fn get_plugin(&self, name: impl Into<String>) -> Result<Option<PluginRecord>> {
        let name = name.into();
        self.call(|reply| Command::GetPlugin { name, reply }).await
    }

    /// Snapshot of the full plugin registry
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrchestratorStopped`] if the actor has exited
    pub async fn all_plugins(&self) -> Result<Vec<PluginRecord>> {
        self.call(|reply| Command::GetAllPlugins { reply }).await
    }

    /// Status of every recorded transport
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrchestratorStopped`] if the actor has exited
    pub async fn transports(&self) -> Result<Vec<TransportSummary>> {
        self.call(|reply| Command::GetTransports { reply }).await
    }

    /// Replace the plugin registry wholesale
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrchestratorStopped`] if the actor has exited
    pub async fn apply_registry_update(&self, plugins: Vec<PluginRecord>) -> Result<()> {
        self.send(Command::ApplyRegistryUpdate(plugins)).await
    }

    /// Replace the transport list wholesale
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrchestratorStopped`] if the actor has exited
    pub async fn record_transports(&self, transports: Vec<TransportHandle>) -> Result<()> {
        self.send(Command::RecordTransports(transports)).await
    }

    /// Stop every transport and the watcher, then end the actor
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrchestratorStopped`] if the actor had already exited
    pub async fn shutdown(&self) -> Result<()> {
        self.call(|reply| Command::Shutdown { reply }).await
    }

    /// Handle that does not keep the orchestrator alive
    #[must_use]
    pub fn downgrade(&self) -> WeakOrchestratorHandle {
        WeakOrchestratorHandle {
            tx: self.tx.downgrade(),
        }
    }

    /// Whether the orchestrator is still accepting commands
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Weak counterpart of [`OrchestratorHandle`]
#[derive(Clone)]
pub struct WeakOrchestratorHandle {
    tx: mpsc::WeakSender<Command>,
}

impl WeakOrchestratorHandle {
    /// Upgrade to a strong handle if the orchestrator is still running
    #[must_use]
    pub fn upgrade(&self) -> Option<OrchestratorHandle> {
        self.tx.upgrade().map(|tx| OrchestratorHandle { tx })
    }
}
