//! Geofenced, once-per-day attendance service.

pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod geo;
pub mod model;
pub mod report;
pub mod routes;
pub mod state;
pub mod store;
