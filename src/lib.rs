// Library exports for slid
// This allows integration tests and the binary to share the modules

pub mod audit;
pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod extractors;
pub mod graph;
pub mod identity;
pub mod media;
pub mod notice;
pub mod oauth;
pub mod profile;
pub mod routes;
pub mod state;
pub mod sync;
