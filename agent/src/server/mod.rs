//! Local HTTP surface: health, version, and log queries

pub mod handlers;
pub mod serve;
pub mod state;
