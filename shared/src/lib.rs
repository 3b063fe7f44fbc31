// Records exchanged between the engine and whatever stores or displays them,
// plus the number/period helpers every component relies on.
pub mod models;
pub mod period;
pub mod utils;

pub use period::Period;
