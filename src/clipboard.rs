//! Clipboard sink.
//!
//! The copy action hands a UTF-8 string to the host clipboard. Writes are
//! async and allowed to fail; callers degrade silently (the indicator is
//! simply not set).

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Clipboard tools probed in order. First one that spawns wins.
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("pbcopy", &[]),
];

/// Asynchronous UTF-8 text sink.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), String>;
}

/// Writes through the host's clipboard tool (`wl-copy`, `xclip`, `pbcopy`).
pub struct OsClipboard;

#[async_trait]
impl ClipboardSink for OsClipboard {
    async fn write_text(&self, text: &str) -> Result<(), String> {
        for (tool, args) in CLIPBOARD_TOOLS {
            let spawned = Command::new(tool)
                .args(*args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn();
            let mut child = match spawned {
                Ok(child) => child,
                Err(_) => continue, // tool not present, try the next one
            };

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(text.as_bytes())
                    .await
                    .map_err(|e| format!("{tool}: {e}"))?;
                drop(stdin);
            }
            let status = child.wait().await.map_err(|e| format!("{tool}: {e}"))?;
            if status.success() {
                debug!("clipboard: wrote {} bytes via {tool}", text.len());
                return Ok(());
            }
            return Err(format!("{tool} exited with {status}"));
        }
        Err("no clipboard tool found".to_string())
    }
}
