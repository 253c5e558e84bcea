pub mod api;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod normalize;
pub mod notifier;
pub mod ranker;
pub mod reporter;
pub mod state;
pub mod types;

/// NBA schedule and stats API base URL (keys required, see `config::Credentials`)
pub const NBA_API_BASE: &str = "https://api.nba.com/v0";
