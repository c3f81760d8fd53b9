pub mod app_catalog;
pub mod cooldown;
pub mod draft;
pub mod error;
pub mod macro_store;
pub mod notify;
pub mod quick_actions;
pub mod remote;
pub mod runner;
pub mod settings;
pub mod step;
pub mod storage;
pub mod transport;

#[cfg(feature = "desktop")]
pub mod commands;

pub use error::{AppError, AppResult};
pub use remote::Remote;
