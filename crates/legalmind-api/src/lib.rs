pub mod auth;
pub mod client;

pub use auth::EnvTokenProvider;
pub use client::AnalysisClient;
