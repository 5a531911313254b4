use std::collections::hash_map::{Entry, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use time::{format_description::well_known, OffsetDateTime};
use tracing::warn;

use crate::status::{self, StatusClass};

pub const LOG_FILE: &str = "log.txt";
pub const EXISTS_FILE: &str = "ip_exist.txt";
pub const INVALID_FILE: &str = "ip_invalid.txt";
pub const UNKNOWN_STATUS_FILE: &str = "unknown_status.txt";
pub const CORS_VULNERABLE_FILE: &str = "cors_vulnerable.txt";
pub const CATEGORY_FILE: &str = "all.txt";

/// Append-only output destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SinkId {
    /// One bucket per status code, e.g. `404`.
    Status(u16),
    /// Aggregate of every code in a class, e.g. `4xx`.
    Category(StatusClass),
    /// Targets that answered at least once.
    Exists,
    /// Targets that failed the initial scan.
    Invalid,
    UnknownStatus,
    CorsVulnerable,
    /// Unified chronological log.
    Log,
}

/// Line-oriented sink the aggregator writes to. Implementations must tolerate
/// concurrent callers and never interleave partial lines.
pub trait OutputSink: Send + Sync {
    fn append(&self, sink: SinkId, line: &str) -> io::Result<()>;
}

/// Writes each [`SinkId`] to its own file under an output directory.
///
/// Layout:
/// ```text
/// <dir>/log.txt, ip_exist.txt, ip_invalid.txt, unknown_status.txt, cors_vulnerable.txt
/// <dir>/<class>/<code>.txt, <dir>/<class>/all.txt
/// ```
///
/// Each file is opened once, on first use, and kept open for the rest of the run.
#[derive(Debug)]
pub struct FileSinks {
    root: PathBuf,
    handles: Mutex<HashMap<SinkId, LineWriter<File>>>,
}

impl FileSinks {
    /// Create (or truncate) the output structure under `dir`.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create output directory {}", root.display()))?;

        for class in StatusClass::ALL {
            let class_dir = root.join(class.name());
            fs::create_dir_all(&class_dir).with_context(|| {
                format!("failed to create category directory {}", class_dir.display())
            })?;
            touch(&class_dir.join(CATEGORY_FILE))?;
        }
        for code in status::known_codes() {
            if let Some(class) = StatusClass::of(code) {
                touch(&root.join(class.name()).join(format!("{code}.txt")))?;
            }
        }
        for name in [
            LOG_FILE,
            EXISTS_FILE,
            INVALID_FILE,
            UNKNOWN_STATUS_FILE,
            CORS_VULNERABLE_FILE,
        ] {
            touch(&root.join(name))?;
        }

        Ok(Self {
            root,
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// File backing `sink`.
    pub fn path_for(&self, sink: SinkId) -> PathBuf {
        match sink {
            SinkId::Status(code) => {
                let class = StatusClass::of(code).map_or("unknown_category", StatusClass::name);
                self.root.join(class).join(format!("{code}.txt"))
            }
            SinkId::Category(class) => self.root.join(class.name()).join(CATEGORY_FILE),
            SinkId::Exists => self.root.join(EXISTS_FILE),
            SinkId::Invalid => self.root.join(INVALID_FILE),
            SinkId::UnknownStatus => self.root.join(UNKNOWN_STATUS_FILE),
            SinkId::CorsVulnerable => self.root.join(CORS_VULNERABLE_FILE),
            SinkId::Log => self.root.join(LOG_FILE),
        }
    }
}

impl OutputSink for FileSinks {
    fn append(&self, sink: SinkId, line: &str) -> io::Result<()> {
        let text = match sink {
            SinkId::Log => format!("{} {line}\n", now_rfc3339()),
            _ => format!("{line}\n"),
        };
        // A poisoned lock only means another writer panicked mid-append.
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        let writer = match handles.entry(sink) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(LineWriter::new(open_append(&self.path_for(sink))?))
            }
        };
        writer.write_all(text.as_bytes())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append and log instead of failing; sink errors never stop a phase.
pub fn append_or_warn(sinks: &dyn OutputSink, sink: SinkId, line: &str) {
    if let Err(e) = sinks.append(sink, line) {
        warn!(?sink, error = %e, "failed to write output line");
    }
}

fn touch(path: &Path) -> Result<()> {
    File::create(path).with_context(|| format!("failed to create output file {}", path.display()))?;
    Ok(())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
