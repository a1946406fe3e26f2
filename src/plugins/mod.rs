//! Plugin registry
//!
//! Plugins are executable scripts found anywhere below the plugin directory.
//! Each file is classified by its extension into an interpreter; unsupported
//! files are skipped. The optional watcher re-scans the directory and pushes
//! new snapshots to the orchestrator.

pub mod classifier;
pub mod loader;
pub mod watcher;

pub use classifier::{Interpreter, PluginRecord, classify};
pub use loader::{find_plugin, load_registry, scan_registry};
pub use watcher::PluginWatcher;
