// Engine library root: budget allocation, legacy migration, progress
// tracking and certificate assembly, plus the service that persists them.

pub mod allocator;
pub mod certificate;
pub mod config;
pub mod data;
pub mod error;
pub mod migration;
pub mod progress;
pub mod services;

pub use error::EngineError;
