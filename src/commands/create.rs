use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use tokio::io::AsyncReadExt;
use tracing::warn;

use crate::config::StorageKind;
use crate::controllers::paste;
use crate::types::api::{CreatePaste, ExpiresAt};
use crate::App;

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Title of the paste
    #[arg(short, long)]
    pub title: Option<String>,
    /// Language hint for renderers (default: plaintext)
    #[arg(short, long)]
    pub language: Option<String>,
    /// Expiration: never, 1h, 1d, 1w, 1m, YYYY-MM-DD or an ISO 8601 timestamp
    #[arg(short, long)]
    pub expires: Option<String>,
    /// Paste content
    #[arg(short, long, conflicts_with = "file")]
    pub content: Option<String>,
    /// Read content from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

pub async fn run(app: App, args: CreateArgs) -> anyhow::Result<()> {
    if app.config.storage.kind == StorageKind::Memory {
        warn!("memory storage is discarded when this command exits");
    }

    let content = match (args.content, args.file) {
        (Some(content), _) => content,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("cannot read file {}", path.display()))?,
        (None, None) => read_stdin().await?,
    };

    let created = paste::create(
        &app,
        CreatePaste {
            title: args.title,
            content: Some(content),
            language: args.language,
            expires_at: args.expires.map(ExpiresAt::Text),
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("{kind}: {e}", kind = e.kind()))?;

    println!("{}", serde_json::to_string_pretty(&created)?);
    eprintln!("URL: {}", paste::url(&app, &created));
    Ok(())
}

async fn read_stdin() -> anyhow::Result<String> {
    if std::io::stdin().is_terminal() {
        bail!("no content provided; use --content, --file, or pipe via stdin");
    }

    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .context("failed to read stdin")?;
    Ok(content)
}
