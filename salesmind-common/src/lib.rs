//! # SalesMind Common Library
//!
//! Shared code for the SalesMind services:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Short-lived result caching

pub mod cache;
pub mod config;
pub mod error;

pub use cache::ResultCache;
pub use error::{Error, Result};
