//! Carina Core
//!
//! Core library for an infrastructure tool that reads remote state through
//! typed, schema-described data sources

pub mod provider;
pub mod resource;
pub mod schema;
pub mod timeouts;
