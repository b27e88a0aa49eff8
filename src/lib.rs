pub mod api;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod invoker;
