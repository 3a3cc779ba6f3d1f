//! Export cache: binary STL per visible object, memoized by content hash.
//!
//! Exports work from a snapshot of the registry entry taken at call start,
//! including the mesh tessellated when the object was shown, so each revision
//! is tessellated once. Encoding runs with no lock held. A fresh payload only enters the cache
//! if the registry still carries the snapshot's hash, checked under the
//! registry read lock; a replacement that raced the export is therefore never
//! shadowed by stale bytes. Invalidation is driven by bus events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use viewer_kernel::FaceRange;
use viewer_types::{ContentHash, ShowEvent};

use crate::bus::BusListener;
use crate::error::{ViewerError, ViewerResult};
use crate::registry::{NamedObject, Registry};
use crate::stl;

pub const STL_MIMETYPE: &str = "model/stl";
pub const STL_EXTENSION: &str = "stl";

/// One exported object, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMesh {
    pub name: String,
    pub content_hash: ContentHash,
    pub payload: Bytes,
    /// Triangle ranges per face, in the kernel's face order.
    pub face_ranges: Arc<[FaceRange]>,
}

impl ExportedMesh {
    pub fn mimetype(&self) -> &'static str {
        STL_MIMETYPE
    }

    /// `<name>.stl`, with path separators in namespaced names flattened.
    pub fn filename(&self) -> String {
        export_filename(&self.name)
    }

    pub fn triangle_count(&self) -> usize {
        stl::triangle_count(&self.payload).unwrap_or(0) as usize
    }
}

/// File name an object is exported under.
pub fn export_filename(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c => c,
        })
        .collect();
    format!("{stem}.{STL_EXTENSION}")
}

#[derive(Debug, Clone)]
struct CachedExport {
    content_hash: ContentHash,
    payload: Bytes,
    face_ranges: Arc<[FaceRange]>,
}

/// Hit/miss counters since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct ExportCache {
    registry: Arc<Registry>,
    entries: Mutex<HashMap<String, CachedExport>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ExportCache {
    /// Build a cache over `registry` and subscribe it to invalidations.
    pub fn new(registry: Arc<Registry>) -> Arc<Self> {
        let cache = Arc::new(Self {
            registry: Arc::clone(&registry),
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        });
        let listener: Arc<dyn BusListener> = cache.clone();
        registry.bus().add_listener(Arc::downgrade(&listener));
        cache
    }

    /// Export the current geometry of `name` as binary STL.
    #[instrument(skip(self))]
    pub fn export(&self, name: &str) -> ViewerResult<ExportedMesh> {
        let snapshot = self
            .registry
            .get(name)
            .ok_or_else(|| ViewerError::NotFound {
                name: name.to_string(),
            })?;

        if let Some(hit) = self.entries.lock().get(name) {
            if hit.content_hash == snapshot.content_hash {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(hash = %hit.content_hash, "export cache hit");
                return Ok(ExportedMesh {
                    name: name.to_string(),
                    content_hash: hit.content_hash,
                    payload: hit.payload.clone(),
                    face_ranges: Arc::clone(&hit.face_ranges),
                });
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let (exported, entry) = self.render(&snapshot)?;
        if self.store_if_current(name, entry) {
            info!(hash = %exported.content_hash, bytes = exported.payload.len(), "exported");
        } else {
            debug!("object changed during export; result not cached");
        }
        Ok(exported)
    }

    /// Encode a registry snapshot. Runs without any registry lock held.
    fn render(&self, snapshot: &NamedObject) -> ViewerResult<(ExportedMesh, CachedExport)> {
        let payload = stl::encode(&snapshot.mesh).map_err(|e| {
            let reason = e.to_string();
            warn!(name = %snapshot.name, %reason, "export failed");
            ViewerError::ExportFailure {
                name: snapshot.name.clone(),
                reason,
            }
        })?;

        let entry = CachedExport {
            content_hash: snapshot.content_hash,
            payload,
            face_ranges: snapshot.mesh.face_ranges.clone().into(),
        };
        let exported = ExportedMesh {
            name: snapshot.name.clone(),
            content_hash: entry.content_hash,
            payload: entry.payload.clone(),
            face_ranges: Arc::clone(&entry.face_ranges),
        };
        Ok((exported, entry))
    }

    /// Cache `entry` only if `name` still carries the hash it was built from.
    fn store_if_current(&self, name: &str, entry: CachedExport) -> bool {
        self.registry.with_current_hash(name, |current| {
            if current == Some(entry.content_hash) {
                self.entries.lock().insert(name.to_string(), entry);
                true
            } else {
                false
            }
        })
    }

    /// Write every visible object to `<folder>/<name>.stl`.
    ///
    /// Objects removed while the export runs are skipped.
    #[instrument(skip(self, folder), fields(folder = %folder.as_ref().display()))]
    pub fn export_all(&self, folder: impl AsRef<Path>) -> ViewerResult<Vec<PathBuf>> {
        let folder = folder.as_ref();
        std::fs::create_dir_all(folder).map_err(|e| ViewerError::Io {
            path: folder.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut written = Vec::new();
        for name in self.registry.list_names() {
            let mesh = match self.export(&name) {
                Ok(mesh) => mesh,
                Err(ViewerError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            let path = folder.join(mesh.filename());
            std::fs::write(&path, &mesh.payload).map_err(|e| ViewerError::Io {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            written.push(path);
        }
        info!(files = written.len(), "exported all objects");
        Ok(written)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }

    /// Hash of the cached payload for `name`, if one is cached.
    pub fn cached_hash(&self, name: &str) -> Option<ContentHash> {
        self.entries.lock().get(name).map(|e| e.content_hash)
    }
}

impl BusListener for ExportCache {
    fn on_events(&self, events: &[ShowEvent]) {
        let mut entries = self.entries.lock();
        for event in events {
            let stale = entries
                .get(&event.name)
                .is_some_and(|e| event.removed || e.content_hash != event.content_hash);
            if stale {
                entries.remove(&event.name);
                debug!(name = %event.name, "evicted export");
            }
        }
    }
}
