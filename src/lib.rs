pub mod abi;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod presenter;
pub mod registry;
pub mod store;

pub use error::{LedgerError, Result};
