//! # EmojiArt Core
//!
//! Value types and persistence for EmojiArt documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               emoji-art-core                │
//! ├─────────────────────────────────────────────┤
//! │  Canvas Model    │  Palettes                │
//! │  - Background    │  - Named emoji sets      │
//! │  - Emoji z-order │  - Stable ids            │
//! │  - JSON format   │  - Persist on change     │
//! ├─────────────────────────────────────────────┤
//! │  Key-value storage │  Undo transactions     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Nothing here performs async work; the document controller that fetches
//! backgrounds and autosaves lives in `emoji-art-document`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod model;
pub mod palette;
pub mod storage;
pub mod undo;

pub use error::{ModelError, ModelResult, StorageError, StorageResult};
pub use model::{Background, Emoji, EmojiArtModel, EmojiId, MAX_EMOJI_ID};
pub use palette::{Palette, PaletteStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use undo::{DocumentEdit, NoUndo, TransactionRecorder, UndoStack};

/// Core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
