//! # EmojiArt Document
//!
//! The controller around an [`emoji_art_core::EmojiArtModel`]:
//!
//! - undoable intents (add, move, scale, remove emoji; set background)
//! - background image fetching with generation-tagged cancellation
//! - coalesced autosave to a [`emoji_art_core::KeyValueStore`]
//!
//! ## Flow
//!
//! ```text
//! intent ──► model mutated ──► inverse registered ──► hooks
//!                                                     ├─ autosave timer re-armed
//!                                                     └─ background changed?
//!                                                          └─ cancel + refetch
//! fetch task ──► completion channel ──► poll_fetch / settle_fetch
//!                                        └─ stale generation? discard
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod autosave;
pub mod decode;
pub mod document;
pub mod error;
pub mod fetch;

pub use autosave::{Autosaver, AUTOSAVE_KEY, DEFAULT_AUTOSAVE_DELAY};
pub use decode::{DecodedImage, ImageDecoder, ImageFormat, RasterDecoder};
pub use document::{DocumentConfig, DocumentServices, EmojiArtDocument};
pub use error::{DocumentError, DocumentResult, FetchError, ImageDecodeError};
pub use fetch::{
    FetchCompletion, FetchStatus, HttpImageFetcher, ImageFetcher, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_BYTES,
};
