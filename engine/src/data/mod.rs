pub mod csv_parser;
pub mod record_store;

pub use csv_parser::BudgetCsvParser;
pub use record_store::{MemoryStore, RecordStore};
