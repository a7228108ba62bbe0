//! Template cache.
//!
//! Loads `<dir>/<name>.html` once and shares the markup for the rest of the
//! process lifetime. Entries are never evicted or mutated.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

/// Marker replaced by the serialized payload.
pub const DATA_PLACEHOLDER: &str = "{{DATA_PLACEHOLDER}}";

/// Error type for template loading and payload injection.
#[derive(Debug)]
pub enum TemplateError {
    /// Name contains characters outside `[A-Za-z0-9_-]`.
    InvalidName(String),
    /// The template file could not be read.
    Io {
        name: String,
        path: PathBuf,
        source: io::Error,
    },
    /// The template has no data placeholder.
    MissingPlaceholder(String),
    /// The payload could not be serialized.
    Payload(serde_json::Error),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::InvalidName(name) => write!(f, "invalid template name '{}'", name),
            TemplateError::Io { name, path, source } => {
                write!(
                    f,
                    "failed to read template '{}' from {}: {}",
                    name,
                    path.display(),
                    source
                )
            }
            TemplateError::MissingPlaceholder(name) => {
                write!(f, "template '{}' has no {} marker", name, DATA_PLACEHOLDER)
            }
            TemplateError::Payload(e) => write!(f, "failed to serialize payload: {}", e),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TemplateError::Io { source, .. } => Some(source),
            TemplateError::Payload(e) => Some(e),
            _ => None,
        }
    }
}

/// Read-shared cache of template markup.
pub struct TemplateCache {
    dir: PathBuf,
    /// name -> markup
    entries: RwLock<HashMap<Box<str>, Arc<str>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TemplateCache {
    /// Create an empty cache reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Template directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached markup only (no filesystem access).
    #[inline]
    pub fn get(&self, name: &str) -> Option<Arc<str>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).cloned()
    }

    /// Return cached markup, reading it from disk on first use.
    ///
    /// Two concurrent first loads of the same name may both read the file;
    /// the content is identical, so the last insert simply wins.
    pub async fn load(&self, name: &str) -> Result<Arc<str>, TemplateError> {
        if let Some(markup) = self.get(name) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(markup);
        }

        if !is_valid_name(name) {
            return Err(TemplateError::InvalidName(name.to_string()));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("{}.html", name));
        let markup: Arc<str> = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| TemplateError::Io {
                name: name.to_string(),
                path: path.clone(),
                source,
            })?
            .into();

        debug!(template = name, path = %path.display(), bytes = markup.len(), "template loaded");

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::clone(&markup));

        Ok(markup)
    }

    /// Number of cached templates.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache statistics: (hits, misses).
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Substitute the serialized payload into the template's data placeholder.
///
/// `</` is escaped so the JSON cannot close an enclosing `<script>` element.
pub fn inject(name: &str, markup: &str, payload: &Value) -> Result<String, TemplateError> {
    if !markup.contains(DATA_PLACEHOLDER) {
        return Err(TemplateError::MissingPlaceholder(name.to_string()));
    }
    let json = serde_json::to_string(payload)
        .map_err(TemplateError::Payload)?
        .replace("</", "<\\/");
    Ok(markup.replacen(DATA_PLACEHOLDER, &json, 1))
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
