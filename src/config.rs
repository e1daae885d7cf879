//! Runtime configuration from environment variables.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the HTTP server binds to.
    pub port: u16,
    /// Interval between SSE heartbeat comment frames.
    pub sse_heartbeat: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .unwrap_or(3001);

        let heartbeat_secs = std::env::var("SSE_HEARTBEAT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        Self {
            port,
            sse_heartbeat: Duration::from_secs(heartbeat_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            sse_heartbeat: Duration::from_secs(30),
        }
    }
}
