//! Configuration for [`Reader`](super::Reader).

use camino::{Utf8Path, Utf8PathBuf};

/// Extension given to the default cache database.
pub const CACHE_EXTENSION: &str = "db";

/// How a source is read and cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Cache database location; defaults to the source path with a `.db`
    /// extension.
    pub cache_path: Option<Utf8PathBuf>,
    /// Discard any existing cache and rebuild it from the source.
    pub overwrite: bool,
    /// Store resolved geometry blobs in the cache.
    pub spatial: bool,
    /// Skip geometry resolution entirely.
    pub suppress_geometry: bool,
    /// Resolve the geometry of every block while opening.
    pub read_all_blocks: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            cache_path: None,
            overwrite: false,
            spatial: true,
            suppress_geometry: false,
            read_all_blocks: true,
        }
    }
}

impl ReaderOptions {
    /// Use `path` for the cache database.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Rebuild the cache even when it matches the source.
    #[must_use]
    pub const fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Toggle storing geometry blobs in the cache.
    #[must_use]
    pub const fn with_spatial(mut self, spatial: bool) -> Self {
        self.spatial = spatial;
        self
    }

    /// Toggle geometry resolution.
    #[must_use]
    pub const fn with_suppress_geometry(mut self, suppress: bool) -> Self {
        self.suppress_geometry = suppress;
        self
    }

    /// Toggle eager geometry resolution.
    #[must_use]
    pub const fn with_read_all_blocks(mut self, eager: bool) -> Self {
        self.read_all_blocks = eager;
        self
    }

    /// Cache location for `source`.
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use vfk_data::ReaderOptions;
    ///
    /// let options = ReaderOptions::default();
    /// assert_eq!(options.cache_path_for(Utf8Path::new("data/600001.vfk")), "data/600001.db");
    /// ```
    #[must_use]
    pub fn cache_path_for(&self, source: &Utf8Path) -> Utf8PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| source.with_extension(CACHE_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn explicit_cache_path_wins() {
        let options = ReaderOptions::default().with_cache_path("/tmp/cache.sqlite");
        assert_eq!(
            options.cache_path_for(Utf8Path::new("600001.vfk")),
            Utf8PathBuf::from("/tmp/cache.sqlite")
        );
    }

    #[rstest]
    fn defaults_resolve_eagerly_with_blobs() {
        let options = ReaderOptions::default();
        assert!(options.spatial && options.read_all_blocks);
        assert!(!options.overwrite && !options.suppress_geometry);
    }
}
