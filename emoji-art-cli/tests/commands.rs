//! Integration tests for CLI commands.
//!
//! Every command runs as its own invocation against a temporary data
//! directory, so these also check that every change is autosaved before
//! the invocation returns.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use emoji_art_cli::{AppConfig, Command, PaletteCommand};

fn config(dir: &Path) -> AppConfig {
    AppConfig {
        data_dir: dir.to_path_buf(),
        palette_store: "Main".to_string(),
        autosave_delay: Duration::from_secs(5),
        fetch_timeout: Duration::from_secs(5),
    }
}

async fn run(config: &AppConfig, command: Command) -> anyhow::Result<String> {
    let mut out = Vec::new();
    emoji_art_cli::run(config, command, &mut out).await?;
    Ok(String::from_utf8(out).expect("utf-8 output"))
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let mut bytes = Cursor::new(Vec::new());
    image::RgbaImage::new(width, height)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    let path = dir.join(name);
    std::fs::write(&path, bytes.into_inner()).expect("write png");
    path
}

fn show() -> Command {
    Command::Show { json: false }
}

// ===========================================================================
// Document commands
// ===========================================================================

#[tokio::test]
async fn test_add_move_scale_across_invocations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());

    let out = run(
        &config,
        Command::Add {
            emoji: "😀".to_string(),
            x: 10,
            y: 20,
            size: 40.0,
        },
    )
    .await
    .expect("add");
    assert_eq!(out.trim(), "Added 😀 as #1");

    let out = run(&config, Command::Move { id: 1, dx: 5, dy: -5 })
        .await
        .expect("move");
    assert_eq!(out.trim(), "#1 😀 at (15, 15) size 40");

    let out = run(&config, Command::Scale { id: 1, factor: 2.0 })
        .await
        .expect("scale");
    assert_eq!(out.trim(), "#1 😀 at (15, 15) size 80");

    let out = run(&config, show()).await.expect("show");
    assert!(out.contains("Background: none"));
    assert!(out.contains("1 emoji"));
    assert!(out.contains("#1 😀 at (15, 15) size 80"));
}

#[tokio::test]
async fn test_ids_continue_after_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());

    for text in ["a", "b", "c"] {
        run(
            &config,
            Command::Add {
                emoji: text.to_string(),
                x: 0,
                y: 0,
                size: 40.0,
            },
        )
        .await
        .expect("add");
    }
    run(&config, Command::Remove { id: 3 }).await.expect("remove");

    let out = run(
        &config,
        Command::Add {
            emoji: "d".to_string(),
            x: 0,
            y: 0,
            size: 40.0,
        },
    )
    .await
    .expect("add");
    assert_eq!(out.trim(), "Added d as #3");
}

#[tokio::test]
async fn test_unknown_emoji_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());

    assert!(run(&config, Command::Remove { id: 9 }).await.is_err());
    assert!(run(&config, Command::Move { id: 9, dx: 1, dy: 1 }).await.is_err());
    assert!(run(&config, Command::Scale { id: 9, factor: 2.0 }).await.is_err());
}

#[tokio::test]
async fn test_bad_scale_factor_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    run(
        &config,
        Command::Add {
            emoji: "🍎".to_string(),
            x: 0,
            y: 0,
            size: 40.0,
        },
    )
    .await
    .expect("add");

    assert!(run(&config, Command::Scale { id: 1, factor: 0.0 }).await.is_err());
    let out = run(&config, show()).await.expect("show");
    assert!(out.contains("size 40"));
}

#[tokio::test]
async fn test_background_from_local_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    let png = write_png(images.path(), "sky.png", 2, 2);

    let out = run(
        &config,
        Command::Background {
            source: png.display().to_string(),
            embed: false,
        },
    )
    .await
    .expect("background");
    assert!(out.contains("loaded (2x2)"), "{out}");

    let out = run(&config, show()).await.expect("show");
    assert!(out.contains("Background: file://"), "{out}");

    let out = run(
        &config,
        Command::Background {
            source: "none".to_string(),
            embed: false,
        },
    )
    .await
    .expect("clear");
    assert_eq!(out.trim(), "Background cleared");
}

#[tokio::test]
async fn test_embedded_background() {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    let png = write_png(images.path(), "sky.png", 3, 1);

    let out = run(
        &config,
        Command::Background {
            source: png.display().to_string(),
            embed: true,
        },
    )
    .await
    .expect("background");
    assert_eq!(out.trim(), "Background embedded (3x1)");

    // The bytes live in the document, so the file is no longer needed.
    drop(images);
    let out = run(&config, show()).await.expect("show");
    assert!(out.contains("Background: embedded image"), "{out}");
}

#[tokio::test]
async fn test_unloadable_background_is_kept_but_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    let bogus = images.path().join("not-an-image.png");
    std::fs::write(&bogus, b"<html>nope</html>").expect("write");

    let result = run(
        &config,
        Command::Background {
            source: bogus.display().to_string(),
            embed: false,
        },
    )
    .await;
    assert!(result.is_err());

    let out = run(&config, show()).await.expect("show");
    assert!(out.contains("not-an-image.png"), "{out}");
}

#[tokio::test]
async fn test_export_then_import_restores_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    let exported = dir.path().join("art.emojiart");

    run(
        &config,
        Command::Add {
            emoji: "🐶".to_string(),
            x: -3,
            y: 4,
            size: 24.0,
        },
    )
    .await
    .expect("add");
    run(
        &config,
        Command::Export {
            file: exported.clone(),
        },
    )
    .await
    .expect("export");
    run(&config, Command::Remove { id: 1 }).await.expect("remove");
    assert!(run(&config, show()).await.expect("show").contains("0 emoji"));

    let out = run(&config, Command::Import { file: exported })
        .await
        .expect("import");
    assert!(out.starts_with("Imported 1 emoji"));
    let out = run(&config, show()).await.expect("show");
    assert!(out.contains("#1 🐶 at (-3, 4) size 24"));
}

#[tokio::test]
async fn test_corrupt_import_keeps_current_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    let corrupt = dir.path().join("broken.emojiart");
    std::fs::write(&corrupt, b"{\"background\":").expect("write");

    run(
        &config,
        Command::Add {
            emoji: "🐶".to_string(),
            x: 0,
            y: 0,
            size: 40.0,
        },
    )
    .await
    .expect("add");
    assert!(run(&config, Command::Import { file: corrupt }).await.is_err());
    assert!(run(&config, show()).await.expect("show").contains("1 emoji"));
}

#[tokio::test]
async fn test_read_only_commands_leave_no_autosave() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    let autosave = dir.path().join("Autosaved.emojiart");

    run(&config, show()).await.expect("show");
    run(
        &config,
        Command::Export {
            file: dir.path().join("art.emojiart"),
        },
    )
    .await
    .expect("export");
    assert!(!autosave.exists());

    run(
        &config,
        Command::Add {
            emoji: "😀".to_string(),
            x: 0,
            y: 0,
            size: 40.0,
        },
    )
    .await
    .expect("add");
    assert!(autosave.exists());
}

#[tokio::test]
async fn test_show_json_uses_document_format() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    let out = run(&config, Command::Show { json: true })
        .await
        .expect("show");
    let value: serde_json::Value = serde_json::from_str(&out).expect("json");
    assert_eq!(value, serde_json::json!({"background": {}, "emojis": []}));
}

// ===========================================================================
// Palette commands
// ===========================================================================

fn palettes(command: PaletteCommand) -> Command {
    Command::Palettes { command }
}

#[tokio::test]
async fn test_default_palettes_listed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());

    let out = run(&config, palettes(PaletteCommand::List))
        .await
        .expect("list");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("0: Faces [id 5]"));
    assert!(lines[4].starts_with("4: Vehicles [id 1]"));
}

#[tokio::test]
async fn test_palette_edits_persist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());

    let out = run(
        &config,
        palettes(PaletteCommand::Add {
            name: "Food".to_string(),
            emojis: Some("🍎🍌".to_string()),
            index: 0,
        }),
    )
    .await
    .expect("add");
    assert_eq!(out.trim(), "Added palette Food with id 6");

    let out = run(
        &config,
        palettes(PaletteCommand::AddEmojis {
            id: 6,
            emojis: "🍇abc🍎".to_string(),
        }),
    )
    .await
    .expect("add emojis");
    assert_eq!(out.trim(), "Food: 🍇🍎🍌");

    run(
        &config,
        palettes(PaletteCommand::Rename {
            id: 6,
            name: "Fruit".to_string(),
        }),
    )
    .await
    .expect("rename");
    run(&config, palettes(PaletteCommand::Move { from: 0, to: 9 }))
        .await
        .expect("move");

    let out = run(&config, palettes(PaletteCommand::List))
        .await
        .expect("list");
    let last = out.lines().last().expect("palettes");
    assert_eq!(last, "5: Fruit [id 6] 🍇🍎🍌");
}

#[tokio::test]
async fn test_palette_remove_guards() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());

    assert!(run(&config, palettes(PaletteCommand::Remove { index: 42 }))
        .await
        .is_err());
    for _ in 0..4 {
        run(&config, palettes(PaletteCommand::Remove { index: 0 }))
            .await
            .expect("remove");
    }
    assert!(run(&config, palettes(PaletteCommand::Remove { index: 0 }))
        .await
        .is_err());

    let out = run(&config, palettes(PaletteCommand::List))
        .await
        .expect("list");
    assert_eq!(out.lines().count(), 1);
    assert!(out.starts_with("0: Vehicles"));
}

#[tokio::test]
async fn test_unknown_palette_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());

    assert!(run(
        &config,
        palettes(PaletteCommand::Rename {
            id: 99,
            name: "x".to_string(),
        }),
    )
    .await
    .is_err());
    assert!(run(
        &config,
        palettes(PaletteCommand::RemoveEmoji {
            id: 99,
            emoji: "😀".to_string(),
        }),
    )
    .await
    .is_err());
}
