//! # Fleet Monitor Library
//!
//! Event store API for a fleet of edge gateways, roadside units and on-board
//! units, plus the dashboard logic that turns the device hierarchy and the
//! live event stream into a diagram and a filtered event list.

pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod query;
pub mod repositories;
pub mod retention;
pub mod server;
pub mod telemetry;
pub use migration;
