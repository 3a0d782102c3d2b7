//! HTTP surface of the CRA document service.
pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod upload;
