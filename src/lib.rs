// src/lib.rs

pub mod config;
pub mod core;
pub mod logging;

pub use crate::core::error::{Error, Result};
pub use crate::core::service::Sentinel;
