//! JSON configuration for the user service.
//!
//! The embedded `res/app-config.json` is the default; `APP_CONFIG_PATH`
//! (optionally set through a `.env` file) points at a replacement.

mod config_loader;
pub use config_loader::*;
