//! The canvas document: a background plus positioned emoji.

use base64::Engine;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};

/// Largest emoji id a document may contain.
///
/// Documents written by other hosts store ids as signed 64-bit integers, and
/// the headroom above this bound keeps the id counter from overflowing.
pub const MAX_EMOJI_ID: u64 = u64::MAX >> 1;

/// Unique identifier for an emoji within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct EmojiId(u64);

impl TryFrom<u64> for EmojiId {
    type Error = ModelError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        if raw > MAX_EMOJI_ID {
            return Err(ModelError::InvalidEmojiId(raw));
        }
        Ok(Self(raw))
    }
}

impl From<EmojiId> for u64 {
    fn from(id: EmojiId) -> Self {
        id.0
    }
}

impl EmojiId {
    /// Wrap a raw id value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EmojiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The backdrop of a document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "BackgroundRepr", try_from = "BackgroundRepr")]
pub enum Background {
    /// No background.
    #[default]
    Blank,
    /// An image referenced by URL, fetched on demand.
    Url(Url),
    /// Image bytes embedded in the document.
    ImageData(Vec<u8>),
}

impl Background {
    /// The referenced URL, if this is a URL background.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Url(url) => Some(url),
            _ => None,
        }
    }

    /// The embedded bytes, if this is an image-data background.
    #[must_use]
    pub fn image_data(&self) -> Option<&[u8]> {
        match self {
            Self::ImageData(data) => Some(data),
            _ => None,
        }
    }

    /// Whether there is no background.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank)
    }
}

/// On-disk shape of [`Background`].
///
/// `theURL` is the key older documents were written with.
#[derive(Serialize, Deserialize)]
struct BackgroundRepr {
    #[serde(rename = "theURL", default, skip_serializing_if = "Option::is_none")]
    the_url: Option<String>,
    #[serde(rename = "imageData", default, skip_serializing_if = "Option::is_none")]
    image_data: Option<String>,
}

impl From<Background> for BackgroundRepr {
    fn from(background: Background) -> Self {
        match background {
            Background::Blank => Self {
                the_url: None,
                image_data: None,
            },
            Background::Url(url) => Self {
                the_url: Some(url.into()),
                image_data: None,
            },
            Background::ImageData(data) => Self {
                the_url: None,
                image_data: Some(base64::engine::general_purpose::STANDARD.encode(data)),
            },
        }
    }
}

impl TryFrom<BackgroundRepr> for Background {
    type Error = ModelError;

    fn try_from(repr: BackgroundRepr) -> Result<Self, Self::Error> {
        match (repr.the_url, repr.image_data) {
            (None, None) => Ok(Self::Blank),
            (Some(url), None) => Url::parse(&url)
                .map(Self::Url)
                .map_err(|e| ModelError::InvalidBackground(format!("bad URL {url:?}: {e}"))),
            (None, Some(encoded)) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Self::ImageData)
                .map_err(|e| ModelError::InvalidBackground(format!("bad image data: {e}"))),
            (Some(_), Some(_)) => Err(ModelError::InvalidBackground(
                "both theURL and imageData present".to_string(),
            )),
        }
    }
}

/// A glyph placed on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    /// The glyph, expected to be a single emoji grapheme.
    pub text: String,
    /// Horizontal offset from the document center.
    pub x: i32,
    /// Vertical offset from the document center.
    pub y: i32,
    /// Nominal font size in points.
    pub size: i32,
    id: EmojiId,
}

impl Emoji {
    /// This emoji's identity within its document.
    #[must_use]
    pub const fn id(&self) -> EmojiId {
        self.id
    }
}

/// Serializable state of one document.
///
/// Emoji order is z-order: later entries draw on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmojiArtModel {
    background: Background,
    emojis: Vec<Emoji>,
    /// Last id handed out. Not persisted; rebuilt from the emoji on decode.
    #[serde(skip)]
    unique_emoji_id: u64,
}

impl PartialEq for EmojiArtModel {
    fn eq(&self, other: &Self) -> bool {
        self.background == other.background && self.emojis == other.emojis
    }
}

impl Eq for EmojiArtModel {}

impl EmojiArtModel {
    /// Create an empty document with a blank background.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a document from its JSON byte form.
    ///
    /// The id counter resumes after the largest id present, so emoji added
    /// after a reload never collide with existing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid document.
    pub fn from_json(bytes: &[u8]) -> ModelResult<Self> {
        let mut model: Self = serde_json::from_slice(bytes)?;
        model.unique_emoji_id = model
            .emojis
            .iter()
            .map(|e| e.id.get())
            .max()
            .unwrap_or(0);
        Ok(model)
    }

    /// Encode the document as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> ModelResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ModelError::Serialization)
    }

    /// The current background.
    #[must_use]
    pub fn background(&self) -> &Background {
        &self.background
    }

    /// Replace the whole background.
    pub fn set_background(&mut self, background: Background) {
        self.background = background;
    }

    /// All emoji in z-order.
    #[must_use]
    pub fn emojis(&self) -> &[Emoji] {
        &self.emojis
    }

    /// Look up an emoji by id.
    #[must_use]
    pub fn emoji(&self, id: EmojiId) -> Option<&Emoji> {
        self.emojis.iter().find(|e| e.id == id)
    }

    /// Position of an emoji in z-order.
    #[must_use]
    pub fn index_of(&self, id: EmojiId) -> Option<usize> {
        self.emojis.iter().position(|e| e.id == id)
    }

    /// Append a new emoji on top of the others and return its fresh id.
    pub fn add_emoji(&mut self, text: impl Into<String>, at: (i32, i32), size: i32) -> EmojiId {
        self.unique_emoji_id += 1;
        let id = EmojiId(self.unique_emoji_id);
        self.emojis.push(Emoji {
            text: text.into(),
            x: at.0,
            y: at.1,
            size,
            id,
        });
        id
    }

    /// Mutate the emoji with the given id in place.
    ///
    /// Returns `false` without calling `f` if no such emoji exists.
    pub fn update_emoji<F>(&mut self, id: EmojiId, f: F) -> bool
    where
        F: FnOnce(&mut Emoji),
    {
        match self.emojis.iter_mut().find(|e| e.id == id) {
            Some(emoji) => {
                f(emoji);
                true
            }
            None => false,
        }
    }

    /// Remove an emoji, returning it together with its former index.
    pub fn remove_emoji(&mut self, id: EmojiId) -> Option<(usize, Emoji)> {
        let index = self.index_of(id)?;
        Some((index, self.emojis.remove(index)))
    }

    /// Put a previously removed emoji back at `index` (clamped to the end).
    pub fn insert_emoji(&mut self, index: usize, emoji: Emoji) {
        self.unique_emoji_id = self.unique_emoji_id.max(emoji.id.get());
        let index = index.min(self.emojis.len());
        self.emojis.insert(index, emoji);
    }
}
