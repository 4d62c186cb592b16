pub mod api;
pub mod binding;
pub mod clock;
pub mod config;
pub mod execution_record;
pub mod http;
pub mod interface;
pub mod invocation;
pub mod json_path;
pub mod persistence;
pub mod request;
#[cfg(test)]
mod testing;
