//! Odds Board - terminal client for the odds composer backend.
//!
//! Connects to the backend's SSE stream and renders the live fixture as a
//! player/market table with manual balance-line selection per cell.
//!
//! Keyboard:
//!   Q/Esc     - Quit
//!   Tab / 1-3 - Switch tabs
//!   Arrows    - Move selection / switch milestone market
//!   + / -     - Cycle the selected cell's balance line
//!   F         - Flush fixture data on the backend

use anyhow::Result;
use clap::Parser;

use odds_composer_backend::board::tui;

#[derive(Parser, Debug)]
#[command(name = "odds-board", about = "Live odds board for the odds composer backend")]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "ODDS_BOARD_URL", default_value = "http://localhost:3001")]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tui::run(args.url.trim_end_matches('/').to_string()).await
}
