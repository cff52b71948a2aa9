//! # Canopy
//!
//! Persistence for a hierarchical namespace of groups and workspaces, with
//! atomic subtree migration.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! canopy = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use canopy::config::StoreConfig;
//! use canopy::store::{SqliteStore, Store};
//! use canopy::types::NewGroup;
//!
//! let store = SqliteStore::with_config(&StoreConfig::default()).unwrap();
//! store.initialize().unwrap();
//!
//! let platform = store.create_group(&NewGroup {
//!     name: "platform".into(),
//!     created_by: "admin".into(),
//!     ..Default::default()
//! }).unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the `canopy` admin binary. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod store;
pub mod types;
