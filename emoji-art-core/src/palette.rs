//! Named, ordered emoji palettes and their persistent store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::storage::KeyValueStore;

/// A named set of distinct emoji, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Palette {
    name: String,
    emojis: String,
    id: u64,
}

impl Palette {
    /// Build a palette, dropping repeated emoji.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>, emojis: &str) -> Self {
        Self {
            name: name.into(),
            emojis: remove_duplicate_graphemes(emojis),
            id,
        }
    }

    /// Stable identity of this palette.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The emoji as one string.
    #[must_use]
    pub fn emojis(&self) -> &str {
        &self.emojis
    }

    /// The emoji split into individual glyphs.
    #[must_use]
    pub fn emoji_list(&self) -> Vec<&str> {
        self.emojis.graphemes(true).collect()
    }
}

/// Key under which a store named `name` persists its palettes.
#[must_use]
pub fn storage_key(name: &str) -> String {
    format!("PaletteStore:{name}")
}

/// Palettes seeded into an empty store, in insertion order.
const DEFAULT_PALETTES: [(&str, &str); 5] = [
    ("Vehicles", "🚗🚕🚙🚌🚎🚒🚐🛵🏍🚔🚘🚲🚁✈️🚀"),
    ("Sports", "⚽️🏀🏈🥎🥏🎱🏒🛼🥊🥋🏓🎾"),
    ("Music", "🎤🎹🥁🎺🎸🪕🎻🎷🎼"),
    ("Animals", "🐶🐹🦊🐼🐻‍❄️🐷🐸🐵🐮🐥🦄🐝🐛🐋"),
    ("Faces", "😀😁😆🥹😂🙂😇😍😌🥰😘😛😝😜🤪😎"),
];

/// An ordered, persistent collection of palettes.
///
/// Never empty once constructed. Every mutation rewrites the whole
/// collection to the backing store.
pub struct PaletteStore {
    name: String,
    palettes: Vec<Palette>,
    storage: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for PaletteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaletteStore")
            .field("name", &self.name)
            .field("palettes", &self.palettes)
            .finish_non_exhaustive()
    }
}

impl PaletteStore {
    /// Open the store called `name`, restoring its palettes from `storage`.
    ///
    /// A missing, empty or unreadable collection is replaced by the default
    /// palettes.
    pub fn new(name: impl Into<String>, storage: Arc<dyn KeyValueStore>) -> Self {
        let mut store = Self {
            name: name.into(),
            palettes: Vec::new(),
            storage,
        };
        store.restore();
        if store.palettes.is_empty() {
            tracing::info!("Seeding palette store {:?} with defaults", store.name);
            for (name, emojis) in DEFAULT_PALETTES {
                store.insert_palette(name, Some(emojis), 0);
            }
        }
        store
    }

    /// Name of this store.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All palettes in display order.
    #[must_use]
    pub fn palettes(&self) -> &[Palette] {
        &self.palettes
    }

    /// Number of palettes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.palettes.len()
    }

    /// Always `false` once constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.palettes.is_empty()
    }

    /// The palette at `index`, clamped into range.
    ///
    /// # Panics
    ///
    /// Panics if the store is empty, which construction rules out.
    #[must_use]
    pub fn palette(&self, index: usize) -> Palette {
        let safe_index = index.min(self.palettes.len() - 1);
        self.palettes[safe_index].clone()
    }

    /// Look up a palette by id.
    #[must_use]
    pub fn palette_by_id(&self, id: u64) -> Option<&Palette> {
        self.palettes.iter().find(|p| p.id == id)
    }

    /// Position of the palette with `id`.
    #[must_use]
    pub fn index_of(&self, id: u64) -> Option<usize> {
        self.palettes.iter().position(|p| p.id == id)
    }

    /// Insert a new palette at `index` (clamped) and return its id.
    ///
    /// The id is one greater than every id currently in the store.
    pub fn insert_palette(&mut self, name: &str, emojis: Option<&str>, index: usize) -> u64 {
        let unique = self.palettes.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let palette = Palette::new(unique, name, emojis.unwrap_or_default());
        let safe_index = index.min(self.palettes.len());
        self.palettes.insert(safe_index, palette);
        tracing::debug!("Inserted palette {unique} {name:?} at {safe_index}");
        self.persist();
        unique
    }

    /// Remove the palette at `index` and return a neighbouring index to select.
    ///
    /// The last remaining palette is never removed, nor is anything removed
    /// for an out-of-range index.
    pub fn remove_palette(&mut self, index: usize) -> usize {
        if self.palettes.len() > 1 && index < self.palettes.len() {
            let removed = self.palettes.remove(index);
            tracing::debug!("Removed palette {} {:?}", removed.id, removed.name);
            self.persist();
        }
        index % self.palettes.len()
    }

    /// Move the palette at `from` so that it ends up at `to` (clamped).
    ///
    /// Returns `false` if `from` is out of range.
    pub fn move_palette(&mut self, from: usize, to: usize) -> bool {
        if from >= self.palettes.len() {
            return false;
        }
        let palette = self.palettes.remove(from);
        let to = to.min(self.palettes.len());
        self.palettes.insert(to, palette);
        self.persist();
        true
    }

    /// Rename the palette with `id`. Returns `false` if there is none.
    pub fn rename_palette(&mut self, id: u64, name: &str) -> bool {
        self.modify(id, |palette| palette.name = name.to_string())
    }

    /// Prepend the emoji found in `emojis` to the palette with `id`.
    ///
    /// Non-emoji characters are ignored and repeats are dropped, keeping the
    /// first occurrence. Returns `false` if there is no such palette.
    pub fn add_emojis(&mut self, id: u64, emojis: &str) -> bool {
        self.modify(id, |palette| {
            let combined = format!("{emojis}{}", palette.emojis);
            let filtered: String = combined.graphemes(true).filter(|g| is_emoji(g)).collect();
            palette.emojis = remove_duplicate_graphemes(&filtered);
        })
    }

    /// Remove every occurrence of `emoji` from the palette with `id`.
    pub fn remove_emoji(&mut self, id: u64, emoji: &str) -> bool {
        self.modify(id, |palette| {
            palette.emojis = palette
                .emojis
                .graphemes(true)
                .filter(|g| *g != emoji)
                .collect();
        })
    }

    fn modify<F>(&mut self, id: u64, f: F) -> bool
    where
        F: FnOnce(&mut Palette),
    {
        let Some(palette) = self.palettes.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        f(palette);
        self.persist();
        true
    }

    fn restore(&mut self) {
        let key = storage_key(&self.name);
        let bytes = match self.storage.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed to read palette store {key}: {e}");
                return;
            }
        };
        match serde_json::from_slice::<Vec<Palette>>(&bytes) {
            Ok(palettes) => {
                self.palettes = palettes
                    .into_iter()
                    .map(|p| Palette::new(p.id, p.name, &p.emojis))
                    .collect();
            }
            Err(e) => tracing::warn!("Discarding unreadable palette store {key}: {e}"),
        }
    }

    /// Write the whole collection. Failures are logged; the next mutation
    /// writes again.
    fn persist(&self) {
        let key = storage_key(&self.name);
        let json = match serde_json::to_vec(&self.palettes) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Failed to serialize palette store {key}: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.set(&key, &json) {
            tracing::warn!("Failed to persist palette store {key}: {e}");
        }
    }
}

/// Keep the first occurrence of each grapheme.
fn remove_duplicate_graphemes(s: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for g in s.graphemes(true) {
        if !seen.contains(&g) {
            seen.push(g);
        }
    }
    seen.concat()
}

/// Whether a grapheme cluster renders as an emoji.
///
/// Keycaps need a digit, `#` or `*` base. Any other cluster needs a base
/// scalar with the Unicode `Emoji` property; it then counts when it carries
/// a presentation selector or joiner, or when the scalar defaults to emoji
/// presentation (everything from U+238C up, plus the watch and hourglass).
#[must_use]
pub fn is_emoji(grapheme: &str) -> bool {
    let mut scalars = grapheme.chars();
    let Some(first) = scalars.next() else {
        return false;
    };
    let (mut selector, mut joiner, mut keycap) = (false, false, false);
    for c in scalars {
        match c {
            '\u{FE0F}' => selector = true,
            '\u{200D}' => joiner = true,
            '\u{20E3}' => keycap = true,
            _ => {}
        }
    }
    if keycap {
        return matches!(first, '0'..='9' | '#' | '*');
    }
    let value = u32::from(first);
    if !has_emoji_property(value) {
        return false;
    }
    selector || joiner || value >= 0x238C || matches!(value, 0x231A..=0x231B)
}

/// Scalars carrying the Unicode `Emoji` property, excluding digits, `#`
/// and `*`.
fn has_emoji_property(value: u32) -> bool {
    matches!(
        value,
        0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049
            | 0x2122
            | 0x2139
            | 0x2194..=0x2199
            | 0x21A9..=0x21AA
            | 0x231A..=0x231B
            | 0x2328
            | 0x23CF
            | 0x23E9..=0x23F3
            | 0x23F8..=0x23FA
            | 0x24C2
            | 0x25AA..=0x25AB
            | 0x25B6
            | 0x25C0
            | 0x25FB..=0x25FE
            | 0x2600..=0x27BF
            | 0x2934..=0x2935
            | 0x2B05..=0x2B07
            | 0x2B1B..=0x2B1C
            | 0x2B50
            | 0x2B55
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x1F000..=0x1FAFF
    )
}
