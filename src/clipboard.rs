//! Copy text to the system clipboard through whichever helper program works.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AppError, Result};

#[async_trait]
pub trait ClipboardTier: Send + Sync {
    fn name(&self) -> &str;

    async fn copy(&self, text: &str) -> Result<()>;
}

/// A helper program that reads the clipboard contents from stdin.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ClipboardTier for CommandClipboard {
    fn name(&self) -> &str {
        &self.program
    }

    async fn copy(&self, text: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(AppError::Io(io::Error::other(format!(
                "{} exited with {}",
                self.program, status
            ))));
        }
        Ok(())
    }
}

/// Preferred helper first, then the older one.
pub fn platform_tiers() -> Vec<Box<dyn ClipboardTier>> {
    if cfg!(target_os = "macos") {
        vec![
            Box::new(CommandClipboard::new("pbcopy", &[])),
            Box::new(CommandClipboard::new(
                "osascript",
                &["-e", "set the clipboard to (do shell script \"cat\")"],
            )),
        ]
    } else if cfg!(windows) {
        vec![
            Box::new(CommandClipboard::new(
                "powershell",
                &["-NoProfile", "-Command", "$input | Set-Clipboard"],
            )),
            Box::new(CommandClipboard::new("clip", &[])),
        ]
    } else {
        vec![
            Box::new(CommandClipboard::new("wl-copy", &[])),
            Box::new(CommandClipboard::new("xclip", &["-selection", "clipboard"])),
        ]
    }
}

/// Try each tier in order; returns the name of the one that worked.
pub async fn copy_with_fallback<'a>(
    tiers: &'a [Box<dyn ClipboardTier>],
    text: &str,
) -> Result<&'a str> {
    for tier in tiers {
        match tier.copy(text).await {
            Ok(()) => {
                tracing::debug!(tier = tier.name(), "copied to clipboard");
                return Ok(tier.name());
            }
            Err(e) => tracing::warn!(tier = tier.name(), error = %e, "clipboard copy failed"),
        }
    }
    Err(AppError::Clipboard)
}
