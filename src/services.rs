pub mod query;
pub mod tasks;
pub mod timer;
