//! Line sets and the sources that produce them.
//!
//! A [`LineSource`] hands out the current [`LineSet`] for matching. In
//! [`LoadMode::Reread`] every call reads the file again, so external edits
//! are visible to the next query. In [`LoadMode::Cached`] the first
//! successful read is kept for the lifetime of the source.

use crate::error::ServerError;
use crate::metrics::Metrics;
use linefind_protocol::{Query, QueryResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// The lines of the source file, terminators removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSet {
    lines: Vec<String>,
}

impl LineSet {
    /// Splits file contents into lines.
    ///
    /// Both `\n` and `\r\n` terminate a line. A final line without a
    /// terminator is still a line; a trailing terminator does not add an
    /// empty one.
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_owned).collect(),
        }
    }

    /// Returns whether `text` is exactly equal to one of the lines.
    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|line| line == text)
    }

    /// Resolves a query against this set.
    pub fn lookup(&self, query: &Query) -> QueryResult {
        QueryResult::from_found(self.contains(query.as_str()))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for LineSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// How a [`LineSource`] obtains its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Read the file on every call.
    Reread,
    /// Read the file once and reuse the result.
    Cached,
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadMode::Reread => f.write_str("reread"),
            LoadMode::Cached => f.write_str("cached"),
        }
    }
}

/// Supplies the current line set for matching.
pub struct LineSource {
    path: PathBuf,
    mode: LoadMode,
    /// Populated by the first successful load in cached mode. A failed
    /// load leaves it empty so the next caller retries.
    cache: OnceCell<Arc<LineSet>>,
    /// Number of successful file reads.
    loads: AtomicU64,
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for LineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSource")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("cached", &self.cache.initialized())
            .field("loads", &self.load_count())
            .finish()
    }
}

impl LineSource {
    pub fn new(path: impl Into<PathBuf>, mode: LoadMode) -> Self {
        Self {
            path: path.into(),
            mode,
            cache: OnceCell::new(),
            loads: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn reread(path: impl Into<PathBuf>) -> Self {
        Self::new(path, LoadMode::Reread)
    }

    pub fn cached(path: impl Into<PathBuf>) -> Self {
        Self::new(path, LoadMode::Cached)
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Returns the lines to match the next query against.
    ///
    /// In cached mode concurrent first callers wait for a single in-flight
    /// load and all receive the same set.
    pub async fn current_lines(&self) -> Result<Arc<LineSet>, ServerError> {
        match self.mode {
            LoadMode::Reread => self.load().await.map(Arc::new),
            LoadMode::Cached => self
                .cache
                .get_or_try_init(|| async { self.load().await.map(Arc::new) })
                .await
                .cloned(),
        }
    }

    /// Populates the cache ahead of the first query.
    ///
    /// Does nothing in reread mode or when the cache is already loaded.
    pub async fn warm(&self) -> Result<(), ServerError> {
        if self.mode == LoadMode::Cached {
            self.current_lines().await?;
        }
        Ok(())
    }

    /// Returns whether the cached set has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.cache.initialized()
    }

    /// Returns how many times the file has been read successfully.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Acquire)
    }

    async fn load(&self) -> Result<LineSet, ServerError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ServerError::SourceRead {
                path: self.path.clone(),
                source,
            })?;
        let lines = LineSet::parse(&text);

        self.loads.fetch_add(1, Ordering::AcqRel);
        if let Some(ref metrics) = self.metrics {
            metrics.source_loads_total.inc();
            metrics.source_lines.set(lines.len() as f64);
        }
        tracing::debug!(
            "Loaded {} lines from {} ({} mode)",
            lines.len(),
            self.path.display(),
            self.mode
        );

        Ok(lines)
    }
}
