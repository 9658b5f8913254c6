//! Uptime timeline - availability history of Home Assistant sensors as bars
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod entity;
pub mod error;
pub mod hass;
pub mod routes;
pub mod services;
pub mod sync;
pub mod timeline;
