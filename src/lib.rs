//! Fishing Time - session and countdown tracker for fishing stations
//!
//! Tracks timed table sessions, reconciles them as completed once their
//! purchased duration runs out, and serves the current sets over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
