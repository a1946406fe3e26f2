//! Switchboard - orchestration core for a multi-protocol chat bot
//!
//! This library provides the coordinating pieces of the bot:
//! - Plugin discovery and classification by interpreter
//! - Hot-reload of the plugin directory
//! - Launch and supervision of per-network transports (IRC, XMPP, Campfire)
//! - The orchestrator actor that owns the registry and transport list
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Orchestrator                      │
//! │        plugin registry  │  transport handles          │
//! └──────▲──────────────────┴──────────────▲─────────────┘
//!        │ registry updates                │ launched handles
//! ┌──────┴──────────────┐      ┌───────────┴─────────────┐
//! │ Loader  │  Watcher  │      │   Transport launcher     │
//! └─────────────────────┘      │ handler ⇄ client (× N)   │
//!                              └──────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plugins;
pub mod transports;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{InitRequest, Orchestrator, OrchestratorHandle, WeakOrchestratorHandle};
pub use plugins::{Interpreter, PluginRecord, PluginWatcher, classify, load_registry};
pub use transports::{
    TaskUnits, TransportHandle, TransportIdentity, TransportKind, TransportSpec,
    TransportSummary, TransportUnits,
};
