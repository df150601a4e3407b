//! HTTP API Module

mod http;

pub use http::{AppState, HttpServer};
