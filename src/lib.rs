//! Sensor Chart - temperature charts from Monnit sensor history
//!
//! This library exposes the fetch and render pipeline for testing and reuse.

pub mod chart;
pub mod common;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod monnit;
pub mod routes;
