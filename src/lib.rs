pub mod acquire;
pub mod analyzer;
pub mod config;
pub mod db;
pub mod export;
pub mod sources;
pub mod stats;

/// Application name for XDG paths
pub const APP_NAME: &str = "trackmood";
