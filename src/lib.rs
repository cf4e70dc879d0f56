//! liftlog - Personal workout tracker
//!
//! Plans, finished session logs, best-set and one-rep-max progress, and
//! JSON backups of the whole local store.

pub mod backup;
pub mod db;
pub mod error;
pub mod metrics;
pub mod session;
pub mod tui;

pub use db::Database;
pub use error::{Error, Result};
