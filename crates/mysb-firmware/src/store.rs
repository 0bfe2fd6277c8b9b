//! Resolution plus loading behind one handle.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use mysb_metrics::{metric_defs, metrics};

use crate::cache::FileCache;
use crate::image::{FirmwareImage, ParseMode};
use crate::mapping::FirmwareMapping;
use crate::resolver::{FirmwareResolver, ResolvedFirmware};
use crate::Result;

/// Options controlling how images are loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Keep decoded images between requests.
    pub cache_images: bool,
    /// How to treat malformed hex lines.
    pub parse_mode: ParseMode,
}

/// Resolves requests to firmware files and loads them as images.
///
/// Without caching every call re-reads and re-checksums the file, so edits on
/// disk are picked up immediately.
#[derive(Debug)]
pub struct FirmwareStore {
    resolver: FirmwareResolver,
    cache: Option<FileCache<FirmwareImage>>,
    parse_mode: ParseMode,
}

impl FirmwareStore {
    /// Create a store with default options.
    pub fn new(resolver: FirmwareResolver) -> Self {
        Self::with_options(resolver, StoreOptions::default())
    }

    /// Create a store with explicit options.
    pub fn with_options(resolver: FirmwareResolver, options: StoreOptions) -> Self {
        FirmwareStore {
            resolver,
            cache: options.cache_images.then(FileCache::new),
            parse_mode: options.parse_mode,
        }
    }

    /// Shorthand for a resolver over `base_path` with `mappings`.
    pub fn open(
        base_path: impl AsRef<Path>,
        mappings: Vec<FirmwareMapping>,
        options: StoreOptions,
    ) -> Self {
        Self::with_options(
            FirmwareResolver::new(base_path.as_ref(), mappings),
            options,
        )
    }

    /// The underlying resolver.
    pub fn resolver(&self) -> &FirmwareResolver {
        &self.resolver
    }

    /// Whether images are cached between requests.
    pub fn caches_images(&self) -> bool {
        self.cache.is_some()
    }

    /// Resolve without loading.
    pub fn resolve(
        &self,
        node_id: &str,
        firmware_type: u16,
        version: u16,
    ) -> Result<ResolvedFirmware> {
        self.resolver.resolve(node_id, firmware_type, version)
    }

    /// Load the image at `path`, through the cache when enabled.
    pub fn load(&self, path: &Path) -> Result<Arc<FirmwareImage>> {
        match &self.cache {
            Some(cache) => {
                let (image, hit) = cache.get_or_load(path, |p| self.decode(p))?;
                if hit {
                    metrics::counter!(metric_defs::IMAGE_CACHE_HITS.name).increment(1);
                }
                Ok(image)
            }
            None => self.decode(path).map(Arc::new),
        }
    }

    /// Resolve and load in one step.
    pub fn fetch(
        &self,
        node_id: &str,
        firmware_type: u16,
        version: u16,
    ) -> Result<(ResolvedFirmware, Arc<FirmwareImage>)> {
        let resolved = self.resolve(node_id, firmware_type, version)?;
        let image = self.load(&resolved.path)?;
        Ok((resolved, image))
    }

    fn decode(&self, path: &Path) -> Result<FirmwareImage> {
        let started = Instant::now();
        let image = FirmwareImage::load_with(path, self.parse_mode)?;
        metrics::counter!(metric_defs::IMAGE_LOADS.name).increment(1);
        metrics::histogram!(metric_defs::IMAGE_LOAD_TIME.name)
            .record(started.elapsed().as_micros() as f64);
        Ok(image)
    }
}
