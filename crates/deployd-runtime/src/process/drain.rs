//! Async stream drains (non-UTF8-safe).
//!
//! Java and Gradle can emit non-UTF8 bytes, and a multi-byte character may be
//! split across two reads. Drains read fixed-size chunks, hold back an
//! incomplete trailing sequence for the next read, and decode the rest
//! lossily, so one bad byte never ends the stream.

use std::sync::Arc;

use deployd_core::{LogEntry, LogSinkPort, LogSource};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Read size of a drain. Bounds the memory held per stream.
pub const CHUNK_SIZE: usize = 1024;

/// Where a drain mirrors what it forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMirror {
    Stdout,
    Stderr,
    Off,
}

impl ConsoleMirror {
    async fn write(self, text: &str) {
        // Console mirroring is best-effort.
        let _ = match self {
            Self::Stdout => tokio::io::stdout().write_all(text.as_bytes()).await,
            Self::Stderr => tokio::io::stderr().write_all(text.as_bytes()).await,
            Self::Off => Ok(()),
        };
    }
}

/// Spawn a task forwarding `stream` to `sink` until end-of-stream.
pub fn spawn_drain(
    stream: impl AsyncRead + Unpin + Send + 'static,
    source: LogSource,
    mirror: ConsoleMirror,
    sink: Arc<dyn LogSinkPort>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = stream;
        let mut buf = [0u8; CHUNK_SIZE];
        let mut decoder = Utf8Chunker::default();

        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break, // EOF
                Ok(n) => {
                    if let Some(text) = decoder.push(&buf[..n]) {
                        mirror.write(&text).await;
                        sink.append(LogEntry::new(source, text));
                    }
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Stream drain exiting due to read error");
                    break;
                }
            }
        }

        if let Some(text) = decoder.finish() {
            mirror.write(&text).await;
            sink.append(LogEntry::new(source, text));
        }
        debug!(source = %source, "Stream drain task exiting");
    })
}

/// Incremental lossy UTF-8 decoder that never splits a character.
#[derive(Debug, Default)]
struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    /// Decode everything except an incomplete trailing sequence.
    fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);
        let complete = complete_prefix_len(&self.pending);
        if complete == 0 {
            return None;
        }
        let tail = self.pending.split_off(complete);
        let chunk = std::mem::replace(&mut self.pending, tail);
        Some(String::from_utf8_lossy(&chunk).into_owned())
    }

    /// Flush whatever is left, replacing an incomplete sequence.
    fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}

/// Length of `bytes` without a trailing, not yet complete, UTF-8 sequence.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue; // continuation byte
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if back < width { len - back } else { len };
    }
    len
}
