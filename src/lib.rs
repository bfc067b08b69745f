// Kirie Image Proxy Library

pub mod cache;
pub mod config;
pub mod constants;
pub mod edge;
pub mod fetch;
pub mod logging;
pub mod optimizer;
pub mod server;
