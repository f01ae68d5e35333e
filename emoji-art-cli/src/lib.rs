//! # EmojiArt CLI
//!
//! Command-line host for the autosaved EmojiArt document and the palette
//! store, both kept in one data directory.
//!
//! ## Usage
//!
//! ```bash
//! emoji-art add 😀 10 20 --size 40
//! emoji-art move 1 5 -5
//! emoji-art background https://example.com/sky.jpg
//! emoji-art palettes list
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `AppConfig` - Data directory, palette store and timing settings
//! - `Workspace` - Opens the document and palettes over a `FileStore`
//! - `run` - Executes one command and flushes the autosave

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod commands;

pub use commands::{run, Workspace};

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

/// Command-line arguments for emoji-art.
#[derive(Debug, Clone, Parser)]
#[command(name = "emoji-art")]
#[command(about = "Arrange emoji over a background image")]
#[command(version)]
pub struct CliArgs {
    /// Directory holding the autosaved document and palettes
    #[arg(long, env = "EMOJI_ART_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Name of the palette store
    #[arg(long, env = "EMOJI_ART_PALETTE_STORE", default_value = "Main")]
    pub palette_store: String,

    /// Quiet period before an edit is autosaved, in milliseconds
    #[arg(long, env = "EMOJI_ART_AUTOSAVE_MS", default_value = "5000")]
    pub autosave_ms: u64,

    /// Background fetch timeout in seconds
    #[arg(long, env = "EMOJI_ART_FETCH_TIMEOUT", default_value = "30")]
    pub fetch_timeout: u64,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Document and palette commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the background and every emoji
    Show {
        /// Print the saved document bytes instead
        #[arg(long)]
        json: bool,
    },

    /// Place an emoji on top of the others
    #[command(allow_negative_numbers = true)]
    Add {
        /// The emoji to place
        emoji: String,
        /// Horizontal offset from the canvas centre
        x: i32,
        /// Vertical offset from the canvas centre
        y: i32,
        /// Font size in points
        #[arg(long, default_value = "40")]
        size: f64,
    },

    /// Offset an emoji
    #[command(allow_negative_numbers = true)]
    Move {
        /// Emoji id
        id: u64,
        /// Horizontal offset
        dx: i32,
        /// Vertical offset
        dy: i32,
    },

    /// Multiply an emoji's size
    Scale {
        /// Emoji id
        id: u64,
        /// Scale factor, greater than zero
        factor: f64,
    },

    /// Remove an emoji
    Remove {
        /// Emoji id
        id: u64,
    },

    /// Set the background to a URL, a local image, or `none`
    Background {
        /// URL, file path, or `none`
        source: String,
        /// Embed the file's bytes in the document instead of linking to it
        #[arg(long)]
        embed: bool,
    },

    /// Write the document to a file
    Export {
        /// Destination file
        file: PathBuf,
    },

    /// Replace the document with one read from a file
    Import {
        /// Source file
        file: PathBuf,
    },

    /// Manage emoji palettes
    Palettes {
        /// Palette operation
        #[command(subcommand)]
        command: PaletteCommand,
    },
}

/// Palette store commands.
#[derive(Debug, Clone, Subcommand)]
pub enum PaletteCommand {
    /// List palettes in order
    List,

    /// Insert a new palette
    Add {
        /// Palette name
        name: String,
        /// Initial emoji
        #[arg(long)]
        emojis: Option<String>,
        /// Position to insert at
        #[arg(long, default_value = "0")]
        index: usize,
    },

    /// Remove the palette at an index
    Remove {
        /// Palette index
        index: usize,
    },

    /// Rename a palette
    Rename {
        /// Palette id
        id: u64,
        /// New name
        name: String,
    },

    /// Prepend emoji to a palette
    AddEmojis {
        /// Palette id
        id: u64,
        /// Emoji to add; anything that is not an emoji is ignored
        emojis: String,
    },

    /// Remove one emoji from a palette
    RemoveEmoji {
        /// Palette id
        id: u64,
        /// Emoji to remove
        emoji: String,
    },

    /// Move a palette to another position
    Move {
        /// Current index
        from: usize,
        /// Destination index
        to: usize,
    },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the autosaved document and palettes.
    pub data_dir: PathBuf,
    /// Name of the palette store.
    pub palette_store: String,
    /// Quiet period before an autosave.
    pub autosave_delay: Duration,
    /// Background fetch timeout.
    pub fetch_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_dir: default_data_dir(),
            palette_store: "Main".to_string(),
            autosave_delay: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl From<CliArgs> for AppConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            data_dir: args.data_dir.unwrap_or_else(default_data_dir),
            palette_store: args.palette_store,
            autosave_delay: Duration::from_millis(args.autosave_ms),
            fetch_timeout: Duration::from_secs(args.fetch_timeout),
        }
    }
}

/// `~/Documents/EmojiArt`, or `./EmojiArt` when there is no documents directory.
fn default_data_dir() -> PathBuf {
    let mut path = dirs::document_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("EmojiArt");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["emoji-art", "show"]).expect("parse");
        assert_eq!(args.palette_store, "Main");
        assert_eq!(args.autosave_ms, 5000);

        let config = AppConfig::from(args);
        assert_eq!(config.autosave_delay, Duration::from_secs(5));
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert!(config.data_dir.ends_with("EmojiArt"));
    }

    #[test]
    fn test_negative_offsets_parse() {
        let args = CliArgs::try_parse_from(["emoji-art", "move", "1", "5", "-5"]).expect("parse");
        assert!(matches!(
            args.command,
            Command::Move {
                id: 1,
                dx: 5,
                dy: -5
            }
        ));
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let args = CliArgs::try_parse_from([
            "emoji-art",
            "--data-dir",
            "/tmp/art",
            "--autosave-ms",
            "250",
            "palettes",
            "list",
        ])
        .expect("parse");
        let config = AppConfig::from(args);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/art"));
        assert_eq!(config.autosave_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_add_size_defaults_to_forty() {
        let args = CliArgs::try_parse_from(["emoji-art", "add", "😀", "-10", "20"]).expect("parse");
        match args.command {
            Command::Add { emoji, x, y, size } => {
                assert_eq!(emoji, "😀");
                assert_eq!((x, y), (-10, 20));
                assert!((size - 40.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
