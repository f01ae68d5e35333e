//! Coalesced autosave.
//!
//! Each [`Autosaver::schedule`] call replaces the pending write, so a burst
//! of edits inside the delay window produces a single write of the final
//! state.

use std::sync::Arc;
use std::time::Duration;

use emoji_art_core::{EmojiArtModel, KeyValueStore};
use tokio::task::JoinHandle;

use crate::error::DocumentResult;

/// Storage key of the autosaved document.
pub const AUTOSAVE_KEY: &str = "Autosaved.emojiart";

/// Delay between the last edit and the autosave write.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_secs(5);

/// Debounced writer of document snapshots.
pub struct Autosaver {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Autosaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autosaver")
            .field("key", &self.key)
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

impl Autosaver {
    /// Create an autosaver writing to `key` in `storage`.
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>, delay: Duration) -> Self {
        Self {
            storage,
            key: key.into(),
            delay,
            pending: None,
        }
    }

    /// The storage key being written.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a write is waiting for its timer.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// (Re)arm the timer with a snapshot of `model`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&mut self, model: &EmojiArtModel) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        let snapshot = model.clone();
        let storage = Arc::clone(&self.storage);
        let key = self.key.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = write_snapshot(storage.as_ref(), &key, &snapshot) {
                tracing::warn!("Autosave to {key} failed: {e}");
            }
        }));
    }

    /// Cancel the pending timer and write `model` now.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    pub fn flush(&mut self, model: &EmojiArtModel) -> DocumentResult<()> {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        write_snapshot(self.storage.as_ref(), &self.key, model)
    }

    /// Drop the pending write without saving.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

fn write_snapshot(
    storage: &dyn KeyValueStore,
    key: &str,
    model: &EmojiArtModel,
) -> DocumentResult<()> {
    let bytes = model.to_json()?;
    storage.set(key, &bytes)?;
    tracing::info!("Autosaved {} emoji to {key}", model.emojis().len());
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use emoji_art_core::{MemoryStore, StorageError, StorageResult};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes fail while `failing` is set.
    #[derive(Default)]
    pub(crate) struct FlakyStore {
        pub(crate) inner: MemoryStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        pub(crate) fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_retried_by_next_schedule() {
        let storage = Arc::new(FlakyStore::default());
        let mut autosaver = Autosaver::new(storage.clone(), AUTOSAVE_KEY, DEFAULT_AUTOSAVE_DELAY);
        let mut model = EmojiArtModel::new();

        storage.set_failing(true);
        model.add_emoji("😀", (0, 0), 40);
        autosaver.schedule(&model);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!autosaver.is_pending());
        assert_eq!(storage.inner.write_count(), 0);

        storage.set_failing(false);
        model.add_emoji("🍎", (1, 1), 40);
        autosaver.schedule(&model);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(storage.inner.write_count(), 1);
        let saved = storage.get(AUTOSAVE_KEY).expect("get").expect("saved");
        assert_eq!(EmojiArtModel::from_json(&saved).expect("decode"), model);
    }

    fn autosaver(delay: Duration) -> (Autosaver, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        (Autosaver::new(storage.clone(), AUTOSAVE_KEY, delay), storage)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_produces_one_write_of_final_state() {
        let (mut autosaver, storage) = autosaver(DEFAULT_AUTOSAVE_DELAY);
        let mut model = EmojiArtModel::new();
        for i in 0..5 {
            model.add_emoji("😀", (i, i), 40);
            autosaver.schedule(&model);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(storage.write_count(), 0);
        assert!(autosaver.is_pending());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(storage.write_count(), 1);
        let saved = storage.get(AUTOSAVE_KEY).expect("get").expect("saved");
        assert_eq!(EmojiArtModel::from_json(&saved).expect("decode"), model);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_edits_each_write() {
        let (mut autosaver, storage) = autosaver(DEFAULT_AUTOSAVE_DELAY);
        let mut model = EmojiArtModel::new();
        for i in 0..3 {
            model.add_emoji("🍎", (i, 0), 40);
            autosaver.schedule(&model);
            tokio::time::sleep(Duration::from_secs(6)).await;
        }
        assert_eq!(storage.write_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately_and_cancels_timer() {
        let (mut autosaver, storage) = autosaver(DEFAULT_AUTOSAVE_DELAY);
        let model = EmojiArtModel::new();
        autosaver.schedule(&model);
        autosaver.flush(&model).expect("flush");
        assert_eq!(storage.write_count(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_write() {
        let (mut autosaver, storage) = autosaver(Duration::from_millis(100));
        autosaver.schedule(&EmojiArtModel::new());
        autosaver.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(storage.write_count(), 0);
        assert!(!autosaver.is_pending());
    }
}
