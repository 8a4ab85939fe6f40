//! # Darkroom Editor
//!
//! Headless host of the darkroom history engine.
//!
//! - [`config`]: `darkroom.toml` settings
//! - [`store`]: the RON file history store
//! - [`script`]: session scripts
//! - [`session`]: one image, its modules and history, driven by a script

pub mod config;
pub mod script;
pub mod session;
pub mod store;

pub use config::{Config, ConfigError};
pub use script::{Command, ScriptError};
pub use session::Session;
pub use store::{FileStore, StoreError};
