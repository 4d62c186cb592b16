pub mod execution_records;
pub mod interfaces;
pub mod memory;
pub mod model;
pub mod repo;
