pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod reconcile;
pub mod social;

pub use config::Config;
pub use error::{AppError, Result};
pub use reconcile::{Reconciler, Signal, ViewState};
