#![doc = include_str!("../README.md")]

pub mod config;
mod error;
pub mod install;
pub mod process;
pub mod session;
pub mod vault;

pub use config::Config;
pub use error::{Error, Result};
