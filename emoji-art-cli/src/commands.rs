//! Command execution against the data directory.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use emoji_art_core::{Background, EmojiId, FileStore, NoUndo, PaletteStore};
use emoji_art_document::{
    DocumentConfig, DocumentServices, EmojiArtDocument, FetchStatus, AUTOSAVE_KEY,
};
use url::Url;

use crate::{AppConfig, Command, PaletteCommand};

/// The document and palette store inside one data directory.
pub struct Workspace {
    storage: Arc<FileStore>,
    services: DocumentServices,
    document_config: DocumentConfig,
    palette_store: String,
}

impl Workspace {
    /// Open the data directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the HTTP
    /// client cannot be built.
    pub fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(FileStore::open(config.data_dir.clone()).with_context(|| {
            format!(
                "Failed to open data directory {}",
                config.data_dir.display()
            )
        })?);
        let services = DocumentServices::with_defaults(storage.clone(), config.fetch_timeout)?;
        tracing::debug!("Opened workspace at {}", storage.root().display());
        Ok(Self {
            storage,
            services,
            document_config: DocumentConfig {
                autosave_key: AUTOSAVE_KEY.to_string(),
                autosave_delay: config.autosave_delay,
            },
            palette_store: config.palette_store.clone(),
        })
    }

    /// The autosaved document, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the autosave exists but cannot be decoded.
    pub fn document(&self) -> anyhow::Result<EmojiArtDocument> {
        EmojiArtDocument::open_autosaved(self.services.clone(), &self.document_config)
            .context("Failed to open the autosaved document")
    }

    /// A document decoded from `bytes`, autosaving to this workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a valid document.
    pub fn import(&self, bytes: &[u8]) -> anyhow::Result<EmojiArtDocument> {
        Ok(EmojiArtDocument::open(
            bytes,
            self.services.clone(),
            &self.document_config,
        )?)
    }

    /// The configured palette store.
    #[must_use]
    pub fn palettes(&self) -> PaletteStore {
        PaletteStore::new(self.palette_store.clone(), self.storage.clone())
    }
}

/// Execute `command`, writing its report to `out`.
///
/// Document commands that changed the document flush the autosave before
/// returning, whether or not the command succeeded.
///
/// # Errors
///
/// Returns an error if the command refers to something that does not exist,
/// its input cannot be read, or the document cannot be saved.
pub async fn run(config: &AppConfig, command: Command, out: &mut dyn Write) -> anyhow::Result<()> {
    let workspace = Workspace::open(config)?;
    match command {
        Command::Palettes { command } => run_palette(&mut workspace.palettes(), command, out),
        Command::Import { file } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let mut document = workspace.import(&bytes)?;
            document.flush_autosave()?;
            writeln!(
                out,
                "Imported {} emoji from {}",
                document.emojis().len(),
                file.display()
            )?;
            Ok(())
        }
        command => {
            let mut document = workspace.document()?;
            let before = document.model().clone();
            let result = run_document(&mut document, command, out).await;
            if document.model() != &before {
                document.flush_autosave()?;
            }
            result
        }
    }
}

async fn run_document(
    document: &mut EmojiArtDocument,
    command: Command,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Command::Show { json } => {
            if json {
                let value: serde_json::Value = serde_json::from_slice(&document.save()?)?;
                writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
            } else {
                write_document(document, out)?;
            }
        }
        Command::Add { emoji, x, y, size } => {
            if !(size.is_finite() && size > 0.0) {
                bail!("Size must be a positive number, got {size}");
            }
            let id = document.add_emoji(&emoji, (x, y), size, &mut NoUndo);
            writeln!(out, "Added {emoji} as #{id}")?;
        }
        Command::Move { id, dx, dy } => {
            let id = EmojiId::new(id);
            if !document.move_emoji(id, (dx, dy), &mut NoUndo) {
                bail!("No emoji with id {id}");
            }
            write_emoji(document, id, out)?;
        }
        Command::Scale { id, factor } => {
            let id = EmojiId::new(id);
            if document.model().emoji(id).is_none() {
                bail!("No emoji with id {id}");
            }
            if !document.scale_emoji(id, factor, &mut NoUndo) {
                bail!("Scale factor must be a positive number, got {factor}");
            }
            write_emoji(document, id, out)?;
        }
        Command::Remove { id } => {
            let id = EmojiId::new(id);
            if !document.remove_emoji(id, &mut NoUndo) {
                bail!("No emoji with id {id}");
            }
            writeln!(out, "Removed #{id}")?;
        }
        Command::Background { source, embed } => {
            let background = parse_background(&source, embed)?;
            if !document.set_background(background, &mut NoUndo) {
                writeln!(out, "Background unchanged")?;
            }
            document.settle_fetch().await;
            write_background_status(document, out)?;
            if let FetchStatus::Failed(url) = document.fetch_status() {
                bail!("Failed to load background {url}");
            }
        }
        Command::Export { file } => {
            std::fs::write(&file, document.save()?)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            writeln!(
                out,
                "Exported {} emoji to {}",
                document.emojis().len(),
                file.display()
            )?;
        }
        Command::Import { .. } | Command::Palettes { .. } => {
            bail!("Command does not operate on an open document");
        }
    }
    Ok(())
}

fn run_palette(
    store: &mut PaletteStore,
    command: PaletteCommand,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        PaletteCommand::List => {
            for (index, palette) in store.palettes().iter().enumerate() {
                writeln!(
                    out,
                    "{index}: {} [id {}] {}",
                    palette.name(),
                    palette.id(),
                    palette.emojis()
                )?;
            }
        }
        PaletteCommand::Add {
            name,
            emojis,
            index,
        } => {
            let id = store.insert_palette(&name, emojis.as_deref(), index);
            writeln!(out, "Added palette {name} with id {id}")?;
        }
        PaletteCommand::Remove { index } => {
            let Some(palette) = store.palettes().get(index) else {
                bail!("No palette at index {index}");
            };
            if store.len() == 1 {
                bail!("The last palette cannot be removed");
            }
            let name = palette.name().to_string();
            store.remove_palette(index);
            writeln!(out, "Removed palette {name}")?;
        }
        PaletteCommand::Rename { id, name } => {
            if !store.rename_palette(id, &name) {
                bail!("No palette with id {id}");
            }
            writeln!(out, "Renamed palette {id} to {name}")?;
        }
        PaletteCommand::AddEmojis { id, emojis } => {
            if !store.add_emojis(id, &emojis) {
                bail!("No palette with id {id}");
            }
            write_palette(store, id, out)?;
        }
        PaletteCommand::RemoveEmoji { id, emoji } => {
            if !store.remove_emoji(id, &emoji) {
                bail!("No palette with id {id}");
            }
            write_palette(store, id, out)?;
        }
        PaletteCommand::Move { from, to } => {
            if !store.move_palette(from, to) {
                bail!("No palette at index {from}");
            }
            writeln!(out, "Moved palette from {from} to {}", to.min(store.len() - 1))?;
        }
    }
    Ok(())
}

/// Interpret a background argument: `none`, a URL, or a local file.
fn parse_background(source: &str, embed: bool) -> anyhow::Result<Background> {
    if source.eq_ignore_ascii_case("none") {
        return Ok(Background::Blank);
    }
    if embed {
        let bytes = std::fs::read(source).with_context(|| format!("Failed to read {source}"))?;
        return Ok(Background::ImageData(bytes));
    }
    // Single-letter schemes are Windows drive letters, not URLs.
    if let Ok(url) = Url::parse(source) {
        if url.scheme().len() > 1 {
            return Ok(Background::Url(url));
        }
    }
    let path = std::fs::canonicalize(source).with_context(|| format!("No such file {source}"))?;
    let url = Url::from_file_path(&path)
        .map_err(|()| anyhow::anyhow!("Cannot refer to {} by URL", path.display()))?;
    Ok(Background::Url(url))
}

fn write_document(document: &EmojiArtDocument, out: &mut dyn Write) -> anyhow::Result<()> {
    match document.background() {
        Background::Blank => writeln!(out, "Background: none")?,
        Background::Url(url) => writeln!(out, "Background: {url}")?,
        Background::ImageData(bytes) => {
            writeln!(out, "Background: embedded image ({} bytes)", bytes.len())?;
        }
    }
    writeln!(out, "{} emoji", document.emojis().len())?;
    for emoji in document.emojis() {
        writeln!(
            out,
            "  #{} {} at ({}, {}) size {}",
            emoji.id(),
            emoji.text,
            emoji.x,
            emoji.y,
            emoji.size
        )?;
    }
    Ok(())
}

fn write_emoji(document: &EmojiArtDocument, id: EmojiId, out: &mut dyn Write) -> anyhow::Result<()> {
    if let Some(emoji) = document.model().emoji(id) {
        writeln!(
            out,
            "#{id} {} at ({}, {}) size {}",
            emoji.text, emoji.x, emoji.y, emoji.size
        )?;
    }
    Ok(())
}

fn write_palette(store: &PaletteStore, id: u64, out: &mut dyn Write) -> anyhow::Result<()> {
    if let Some(palette) = store.palette_by_id(id) {
        writeln!(out, "{}: {}", palette.name(), palette.emojis())?;
    }
    Ok(())
}

fn write_background_status(
    document: &EmojiArtDocument,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let image = document
        .background_image()
        .map(|image| format!("{}x{}", image.width, image.height));
    match (document.background(), document.fetch_status()) {
        (Background::Blank, _) => writeln!(out, "Background cleared")?,
        (Background::Url(url), FetchStatus::Failed(_)) => {
            writeln!(out, "Background {url} could not be loaded")?;
        }
        (Background::Url(url), FetchStatus::Fetching) => {
            writeln!(out, "Background {url} is still loading")?;
        }
        (Background::Url(url), FetchStatus::Idle) => match image {
            Some(size) => writeln!(out, "Background {url} loaded ({size})")?,
            None => writeln!(out, "Background {url} set")?,
        },
        (Background::ImageData(bytes), _) => match image {
            Some(size) => writeln!(out, "Background embedded ({size})")?,
            None => writeln!(out, "Background embedded ({} bytes, not an image)", bytes.len())?,
        },
    }
    Ok(())
}
