pub mod compare;
pub mod config;
pub mod discount;
pub mod narrative;
pub mod output;
pub mod search;
pub mod server;
pub mod sources;
pub mod store;
pub mod types;
