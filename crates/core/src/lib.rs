#![allow(clippy::collapsible_if)]

pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_helpers;

pub use config::Config;
pub use error::{Error, Result};
