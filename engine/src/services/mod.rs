// Workflow services over a record store.
pub mod obra_service;

pub use obra_service::ObraService;
