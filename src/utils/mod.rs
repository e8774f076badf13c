//! Parsing helpers shared by the upstream sources

pub mod embedded_json;
pub mod iso8601;

pub use embedded_json::extract_assigned_json;
pub use iso8601::parse_duration_secs;
