//! Spotify Release Sync Library
//!
//! This library synchronizes the artists a user follows on Spotify, together
//! with their releases, into one consistent snapshot. The heavy lifting lives in
//! the [`sync`] engine: a rate-limited fetch client, a bounded worker pool, a
//! cursor paginator and the orchestrating state machine on top of them.
//!
//! # Modules
//!
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `management` - Token and snapshot persistence
//! - `spotify` - Spotify Web API endpoints expressed as page sources
//! - `sync` - The synchronization engine
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relsync::{config::SyncConfig, management::TokenManager, sync};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> relsync::Res<()> {
//!     let config = SyncConfig::from_env()?;
//!     let credentials = Arc::new(TokenManager::load().await?);
//!     let client = sync::FetchClient::from_config(&config, credentials)?;
//!     let handle = sync::SyncOrchestrator::new(config, Arc::new(client))
//!         .spawn(CancellationToken::new());
//!     let snapshot = handle.join().await?;
//!     println!("{} albums", snapshot.album_count());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod management;
pub mod spotify;
pub mod sync;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used by the command-line layer where errors of different origins meet.
/// Library components return their own typed errors instead.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```rust,ignore
/// info!("Found {} releases", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```rust,ignore
/// success!("Synchronized {} artists", count);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only the command-line layer uses this macro. The engine reports failures
/// through its return values and never terminates the process.
///
/// # Example
///
/// ```rust,ignore
/// error!("Failed to load configuration");
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```rust,ignore
/// warning!("Snapshot not found, run relsync sync first");
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
