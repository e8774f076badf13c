//! Stream status resolution service
//!
//! Resolves whether a single channel is live, about to go live or idle by
//! reconciling a scraped live page, an aggregation API, the channel's social
//! timeline and a video metadata API against a persistent cache.

pub mod classifier;
pub mod config;
pub mod database;
pub mod errors;
pub mod models;
pub mod repositories;
pub mod services;
pub mod sources;
pub mod utils;
pub mod web;
