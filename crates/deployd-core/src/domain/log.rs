//! Log sources and entries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Origin of a log chunk.
///
/// The set is closed: every entry belongs to exactly one source. Wire names
/// follow the web UI, which labels the VCS and build tabs after the tools it
/// drives (`Git`, `Gradle`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogSource {
    /// Messages authored by the orchestrator itself.
    System,
    /// Version control progress.
    #[serde(rename = "Git")]
    Vcs,
    /// Output of the build process.
    #[serde(rename = "Gradle")]
    Build,
    /// Output of the supervised server process.
    Server,
}

impl LogSource {
    /// All sources, in display order.
    pub const ALL: [Self; 4] = [Self::System, Self::Vcs, Self::Build, Self::Server];

    /// Wire name of the source.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Vcs => "Git",
            Self::Build => "Gradle",
            Self::Server => "Server",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk of log text tagged with its source.
///
/// Content is forwarded verbatim; it is a chunk of a stream, not necessarily
/// a whole line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub source: LogSource,
    pub content: String,
}

impl LogEntry {
    pub fn new(source: LogSource, content: impl Into<String>) -> Self {
        Self {
            source,
            content: content.into(),
        }
    }

    /// Build an entry holding one orchestrator-authored line.
    ///
    /// A trailing newline is appended when missing so lines never run
    /// together in a client's text view.
    pub fn line(source: LogSource, text: impl Into<String>) -> Self {
        let mut content = text.into();
        if !content.ends_with('\n') {
            content.push('\n');
        }
        Self { source, content }
    }
}
