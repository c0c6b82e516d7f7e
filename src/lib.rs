//! Car status prediction service
//!
//! Dispatches stored car images to an external inference service, either
//! inline or through a durable job queue, and records every attempt as a
//! prediction.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
