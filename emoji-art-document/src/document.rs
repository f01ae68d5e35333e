//! The document controller.
//!
//! [`EmojiArtDocument`] owns the current [`EmojiArtModel`] and everything
//! derived from it. Intents mutate the model, report their inverse to a
//! [`TransactionRecorder`], and then run the post-mutation hooks: autosave is
//! re-armed, and a background change restarts the image fetch.

use std::sync::Arc;
use std::time::Duration;

use emoji_art_core::{
    Background, DocumentEdit, Emoji, EmojiArtModel, EmojiId, KeyValueStore, TransactionRecorder,
};

use crate::autosave::{Autosaver, AUTOSAVE_KEY, DEFAULT_AUTOSAVE_DELAY};
use crate::decode::{DecodedImage, ImageDecoder, RasterDecoder};
use crate::error::{DocumentResult, FetchError};
use crate::fetch::{FetchCompletion, FetchPipeline, FetchStatus, HttpImageFetcher, ImageFetcher};

/// Collaborators a document needs.
#[derive(Clone)]
pub struct DocumentServices {
    /// Where autosaves are written.
    pub storage: Arc<dyn KeyValueStore>,
    /// Source of URL background bytes.
    pub fetcher: Arc<dyn ImageFetcher>,
    /// Decoder for fetched and embedded backgrounds.
    pub decoder: Arc<dyn ImageDecoder>,
}

impl DocumentServices {
    /// Services using the HTTP fetcher and the raster decoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_defaults(
        storage: Arc<dyn KeyValueStore>,
        fetch_timeout: Duration,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            storage,
            fetcher: Arc::new(HttpImageFetcher::new(fetch_timeout)?),
            decoder: Arc::new(RasterDecoder),
        })
    }
}

/// Document tuning.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Storage key for autosaves.
    pub autosave_key: String,
    /// Quiet period before an autosave is written.
    pub autosave_delay: Duration,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            autosave_key: AUTOSAVE_KEY.to_string(),
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
        }
    }
}

/// One open EmojiArt document.
///
/// All methods take `&mut self`; the document is meant to be driven from a
/// single task. Must be used within a Tokio runtime, since fetches and
/// autosaves run as spawned tasks.
pub struct EmojiArtDocument {
    model: EmojiArtModel,
    background_image: Option<DecodedImage>,
    fetch_status: FetchStatus,
    fetch: FetchPipeline,
    decoder: Arc<dyn ImageDecoder>,
    autosave: Autosaver,
}

impl std::fmt::Debug for EmojiArtDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmojiArtDocument")
            .field("model", &self.model)
            .field("has_background_image", &self.background_image.is_some())
            .field("fetch_status", &self.fetch_status)
            .field("autosave", &self.autosave)
            .finish_non_exhaustive()
    }
}

impl EmojiArtDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new(services: DocumentServices, config: &DocumentConfig) -> Self {
        Self::from_model(EmojiArtModel::new(), services, config)
    }

    /// Open a document from its saved bytes.
    ///
    /// A URL background starts fetching immediately.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DocumentError::Decode`] if the bytes are not a valid
    /// document.
    pub fn open(
        bytes: &[u8],
        services: DocumentServices,
        config: &DocumentConfig,
    ) -> DocumentResult<Self> {
        let model = EmojiArtModel::from_json(bytes)?;
        tracing::info!("Opened document with {} emoji", model.emojis().len());
        Ok(Self::from_model(model, services, config))
    }

    /// Open the autosaved document, or an empty one if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the autosave exists but cannot be read or decoded.
    pub fn open_autosaved(
        services: DocumentServices,
        config: &DocumentConfig,
    ) -> DocumentResult<Self> {
        match services.storage.get(&config.autosave_key)? {
            Some(bytes) => Self::open(&bytes, services, config),
            None => {
                tracing::info!("No autosave at {}; starting empty", config.autosave_key);
                Ok(Self::new(services, config))
            }
        }
    }

    fn from_model(
        model: EmojiArtModel,
        services: DocumentServices,
        config: &DocumentConfig,
    ) -> Self {
        let mut document = Self {
            model,
            background_image: None,
            fetch_status: FetchStatus::Idle,
            fetch: FetchPipeline::new(services.fetcher),
            decoder: services.decoder,
            autosave: Autosaver::new(
                services.storage,
                config.autosave_key.clone(),
                config.autosave_delay,
            ),
        };
        document.background_did_change();
        document
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The current model.
    #[must_use]
    pub fn model(&self) -> &EmojiArtModel {
        &self.model
    }

    /// All emoji in z-order.
    #[must_use]
    pub fn emojis(&self) -> &[Emoji] {
        self.model.emojis()
    }

    /// The current background.
    #[must_use]
    pub fn background(&self) -> &Background {
        self.model.background()
    }

    /// The decoded background, once available.
    #[must_use]
    pub fn background_image(&self) -> Option<&DecodedImage> {
        self.background_image.as_ref()
    }

    /// Progress of the background fetch.
    #[must_use]
    pub fn fetch_status(&self) -> &FetchStatus {
        &self.fetch_status
    }

    /// Whether an autosave is waiting to be written.
    #[must_use]
    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Replace the background.
    ///
    /// Setting the background it already has does nothing: no fetch restart,
    /// no status reset, no undo step. Returns whether anything changed.
    pub fn set_background(
        &mut self,
        background: Background,
        recorder: &mut dyn TransactionRecorder,
    ) -> bool {
        if *self.model.background() == background {
            return false;
        }
        let old = self.model.background().clone();
        self.model.set_background(background);
        recorder.register_inverse(DocumentEdit::SetBackground(old));
        tracing::debug!("Background set to {}", describe(self.model.background()));
        self.background_did_change();
        self.did_change();
        true
    }

    /// Place a new emoji on top of the others.
    ///
    /// `size` is rounded to whole points.
    pub fn add_emoji(
        &mut self,
        text: &str,
        at: (i32, i32),
        size: f64,
        recorder: &mut dyn TransactionRecorder,
    ) -> EmojiId {
        let id = self.model.add_emoji(text, at, round_points(size));
        recorder.register_inverse(DocumentEdit::Remove { id });
        tracing::debug!("Added emoji {id} {text:?} at {at:?}");
        self.did_change();
        id
    }

    /// Remove an emoji. Returns `false` if there is no such emoji.
    pub fn remove_emoji(&mut self, id: EmojiId, recorder: &mut dyn TransactionRecorder) -> bool {
        let Some((index, emoji)) = self.model.remove_emoji(id) else {
            return false;
        };
        recorder.register_inverse(DocumentEdit::Insert { index, emoji });
        tracing::debug!("Removed emoji {id}");
        self.did_change();
        true
    }

    /// Offset an emoji's position. Returns `false` if there is no such emoji.
    pub fn move_emoji(
        &mut self,
        id: EmojiId,
        by: (i32, i32),
        recorder: &mut dyn TransactionRecorder,
    ) -> bool {
        let (dx, dy) = by;
        let moved = self.model.update_emoji(id, |emoji| {
            emoji.x = emoji.x.saturating_add(dx);
            emoji.y = emoji.y.saturating_add(dy);
        });
        if !moved {
            return false;
        }
        recorder.register_inverse(DocumentEdit::Move {
            id,
            dx: dx.saturating_neg(),
            dy: dy.saturating_neg(),
        });
        tracing::debug!("Moved emoji {id} by ({dx}, {dy})");
        self.did_change();
        true
    }

    /// Multiply an emoji's size by `factor`, rounding half away from zero.
    ///
    /// The recorded inverse scales by `1 / factor`, which after rounding may
    /// not restore the exact original size. Non-positive or non-finite
    /// factors are rejected. Returns whether the emoji was scaled.
    pub fn scale_emoji(
        &mut self,
        id: EmojiId,
        factor: f64,
        recorder: &mut dyn TransactionRecorder,
    ) -> bool {
        if !(factor.is_finite() && factor > 0.0) {
            tracing::warn!("Ignoring scale of emoji {id} by {factor}");
            return false;
        }
        let scaled = self.model.update_emoji(id, |emoji| {
            emoji.size = round_points(f64::from(emoji.size) * factor);
        });
        if !scaled {
            return false;
        }
        recorder.register_inverse(DocumentEdit::Scale {
            id,
            factor: factor.recip(),
        });
        tracing::debug!("Scaled emoji {id} by {factor}");
        self.did_change();
        true
    }

    /// Perform a recorded edit, typically an inverse being undone or redone.
    ///
    /// The edit's own inverse is registered with `recorder`.
    pub fn apply_edit(&mut self, edit: DocumentEdit, recorder: &mut dyn TransactionRecorder) {
        match edit {
            DocumentEdit::Remove { id } => {
                self.remove_emoji(id, recorder);
            }
            DocumentEdit::Insert { index, emoji } => {
                self.restore_emoji(index, emoji, recorder);
            }
            DocumentEdit::Move { id, dx, dy } => {
                self.move_emoji(id, (dx, dy), recorder);
            }
            DocumentEdit::Scale { id, factor } => {
                self.scale_emoji(id, factor, recorder);
            }
            DocumentEdit::SetBackground(background) => {
                self.set_background(background, recorder);
            }
        }
    }

    fn restore_emoji(
        &mut self,
        index: usize,
        emoji: Emoji,
        recorder: &mut dyn TransactionRecorder,
    ) {
        let id = emoji.id();
        self.model.insert_emoji(index, emoji);
        recorder.register_inverse(DocumentEdit::Remove { id });
        tracing::debug!("Restored emoji {id} at {index}");
        self.did_change();
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Encode the document in its saved byte form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn save(&self) -> DocumentResult<Vec<u8>> {
        Ok(self.model.to_json()?)
    }

    /// Write the autosave now instead of waiting for the timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    pub fn flush_autosave(&mut self) -> DocumentResult<()> {
        self.autosave.flush(&self.model)
    }

    // -----------------------------------------------------------------------
    // Background fetch
    // -----------------------------------------------------------------------

    /// Apply any fetch results that have arrived, without waiting.
    ///
    /// Returns `true` if the background image or fetch status changed.
    pub fn poll_fetch(&mut self) -> bool {
        let mut changed = false;
        while let Some(completion) = self.fetch.try_next() {
            changed |= self.apply_fetch_completion(completion);
        }
        changed
    }

    /// Wait until the current background fetch, if any, has finished.
    pub async fn settle_fetch(&mut self) {
        while self.fetch_status == FetchStatus::Fetching && self.fetch.is_in_flight() {
            match self.fetch.next().await {
                Some(completion) => {
                    self.apply_fetch_completion(completion);
                }
                None => break,
            }
        }
    }

    /// Apply one completion, ignoring it if a newer background superseded it.
    fn apply_fetch_completion(&mut self, completion: FetchCompletion) -> bool {
        let Some(FetchCompletion { url, result, .. }) = self.fetch.accept(completion) else {
            return false;
        };
        if self.model.background().url() != Some(&url) {
            tracing::debug!("Background moved on from {url}; dropping its image");
            return false;
        }
        let decoded = match result {
            Ok(bytes) => self.decoder.decode(&bytes).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match decoded {
            Ok(image) => {
                tracing::info!("Background {url} loaded ({}x{})", image.width, image.height);
                self.background_image = Some(image);
                self.fetch_status = FetchStatus::Idle;
            }
            Err(e) => {
                tracing::warn!("Background {url} failed: {e}");
                self.background_image = None;
                self.fetch_status = FetchStatus::Failed(url);
            }
        }
        true
    }

    /// Post-mutation hook for background changes.
    fn background_did_change(&mut self) {
        self.background_image = None;
        self.fetch.cancel();
        match self.model.background() {
            Background::Url(url) => {
                self.fetch_status = FetchStatus::Fetching;
                self.fetch.start(url.clone());
            }
            Background::ImageData(data) => {
                self.fetch_status = FetchStatus::Idle;
                match self.decoder.decode(data) {
                    Ok(image) => self.background_image = Some(image),
                    Err(e) => tracing::warn!("Embedded background failed to decode: {e}"),
                }
            }
            Background::Blank => {
                self.fetch_status = FetchStatus::Idle;
            }
        }
    }

    /// Post-mutation hook for every change.
    fn did_change(&mut self) {
        self.autosave.schedule(&self.model);
    }
}

/// Round to whole points, half away from zero.
#[allow(clippy::cast_possible_truncation)] // Saturating cast; sizes stay far below i32::MAX
fn round_points(value: f64) -> i32 {
    value.round() as i32
}

fn describe(background: &Background) -> String {
    match background {
        Background::Blank => "blank".to_string(),
        Background::Url(url) => url.to_string(),
        Background::ImageData(data) => format!("{} embedded bytes", data.len()),
    }
}
