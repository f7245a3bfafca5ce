// Library exports for Quill
// The binary and the integration tests both build on these modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod mail;
pub mod reactions;
pub mod routes;
pub mod state;
