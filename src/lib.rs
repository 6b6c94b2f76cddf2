//! Breakout Scanner
//!
//! An unattended equity scanner for Alpaca-style brokerages. Each cycle it
//! screens a fixed universe for volume-confirmed 20-bar breakouts, ranks them
//! by breakout strength in ATR units, sizes one bounded-risk position and
//! sends it as a bracket order (market entry, ATR stop, ATR target).
//!
//! ## Example
//! ```no_run
//! use breakout_scanner::broker::AlpacaClient;
//! use breakout_scanner::scanner::Scanner;
//! use breakout_scanner::Config;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("configs/default.json")?;
//!     let client = AlpacaClient::with_config(
//!         config.broker.credentials()?,
//!         config.broker.client_config(),
//!     )?;
//!     let scanner = Scanner::new(client, config.scan);
//!     println!("{}", scanner.run_cycle().await?);
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod config;
pub mod indicators;
pub mod orders;
pub mod risk;
pub mod scanner;
pub mod scheduler;
pub mod screener;
pub mod types;

pub use config::Config;
pub use types::*;
