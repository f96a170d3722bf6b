pub mod chunker;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod extract;
pub mod retry;
pub mod tokens;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
