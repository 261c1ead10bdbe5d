pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod operator;
pub mod scan;
