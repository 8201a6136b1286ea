//! Overlay asset cache
//!
//! Maps a catalog category to an ordered list of image handles. A list is
//! created the first time its category is requested and kept for the life
//! of the process. Handles are returned immediately; the pixels behind them
//! arrive later when the cache loads on a background thread, so callers
//! must treat an unloaded handle as absent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;
use parking_lot::RwLock;

use crate::catalog::Category;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to read asset {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode asset {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Asset {category}/{number} is not available")]
    Missing { category: String, number: usize },
}

struct HandleInner {
    category: String,
    index: usize,
    image: RwLock<Option<Arc<RgbaImage>>>,
}

/// Shared reference to one catalog image.
///
/// Equality is identity: two handles are equal only if they came from the
/// same cache slot.
#[derive(Clone)]
pub struct ImageHandle(Arc<HandleInner>);

impl ImageHandle {
    fn pending(category: &str, index: usize) -> Self {
        Self(Arc::new(HandleInner {
            category: category.to_string(),
            index,
            image: RwLock::new(None),
        }))
    }

    /// Category this image belongs to
    pub fn category(&self) -> &str {
        &self.0.category
    }

    /// 0-based position in the category's asset list
    pub fn index(&self) -> usize {
        self.0.index
    }

    /// Whether the pixels have arrived
    pub fn is_loaded(&self) -> bool {
        self.0.image.read().is_some()
    }

    /// Decoded pixels, if loaded
    pub fn image(&self) -> Option<Arc<RgbaImage>> {
        self.0.image.read().clone()
    }

    fn fulfil(&self, image: RgbaImage) {
        *self.0.image.write() = Some(Arc::new(image));
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ImageHandle {}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("category", &self.0.category)
            .field("index", &self.0.index)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Ordered handles for one category
pub type AssetList = Arc<Vec<ImageHandle>>;

/// Something that can produce the image for `(category, number)`.
///
/// `number` is 1-based, matching the on-disk naming of catalog images.
pub trait AssetSource: Send + Sync + 'static {
    fn load(&self, category: &str, number: usize) -> Result<RgbaImage, AssetError>;
}

/// Loads `<root>/<category>/<number>.png`
pub struct DirectoryAssetSource {
    root: PathBuf,
}

impl DirectoryAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of one catalog image
    pub fn path_for(&self, category: &str, number: usize) -> PathBuf {
        self.root.join(category).join(format!("{}.png", number))
    }
}

impl AssetSource for DirectoryAssetSource {
    fn load(&self, category: &str, number: usize) -> Result<RgbaImage, AssetError> {
        let path = self.path_for(category, number);
        let bytes = std::fs::read(&path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| AssetError::Decode { path, source })?;
        Ok(image.to_rgba8())
    }
}

/// One handle waiting for its pixels
struct LoadJob {
    handle: ImageHandle,
}

/// Background loader thread
struct AssetLoader {
    job_sender: Option<Sender<LoadJob>>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl AssetLoader {
    fn spawn(source: Arc<dyn AssetSource>) -> Result<Self, String> {
        let (job_sender, job_receiver) = crossbeam_channel::unbounded::<LoadJob>();

        let thread_handle = std::thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || Self::loader_thread(job_receiver, source))
            .map_err(|e| format!("Failed to spawn asset loader thread: {}", e))?;

        Ok(Self {
            job_sender: Some(job_sender),
            thread_handle: Some(thread_handle),
        })
    }

    fn loader_thread(job_receiver: Receiver<LoadJob>, source: Arc<dyn AssetSource>) {
        log::debug!("Asset loader thread started");
        while let Ok(job) = job_receiver.recv() {
            load_into(source.as_ref(), &job.handle);
        }
        log::debug!("Asset loader thread stopped");
    }

    fn submit(&self, handle: ImageHandle) -> Result<(), ImageHandle> {
        match self.job_sender {
            Some(ref sender) => sender.send(LoadJob { handle }).map_err(|e| e.0.handle),
            None => Err(handle),
        }
    }

    fn stop(&mut self) {
        // Dropping the sender ends the loop once queued jobs are done
        self.job_sender = None;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn load_into(source: &dyn AssetSource, handle: &ImageHandle) {
    match source.load(handle.category(), handle.index() + 1) {
        Ok(image) => {
            log::debug!(
                "Loaded {}/{} ({}x{})",
                handle.category(),
                handle.index() + 1,
                image.width(),
                image.height()
            );
            handle.fulfil(image);
        }
        Err(e) => {
            // Left unloaded; the compositor skips it every frame
            log::warn!("Asset load failed: {}", e);
        }
    }
}

/// Memoized category -> asset list map
pub struct AssetCache {
    source: Arc<dyn AssetSource>,
    lists: HashMap<String, AssetList>,
    loader: Option<AssetLoader>,
}

impl AssetCache {
    /// Cache that loads pixels inline when a category is first requested
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            lists: HashMap::new(),
            loader: None,
        }
    }

    /// Cache that loads pixels on a dedicated thread.
    ///
    /// Falls back to inline loading if the thread cannot be spawned.
    pub fn with_background_loader(source: Arc<dyn AssetSource>) -> Self {
        let loader = match AssetLoader::spawn(source.clone()) {
            Ok(loader) => Some(loader),
            Err(e) => {
                log::warn!("{}. Loading assets inline.", e);
                None
            }
        };
        Self {
            source,
            lists: HashMap::new(),
            loader,
        }
    }

    /// Ensure the category's list exists and return it.
    ///
    /// Idempotent: the second call for a category returns the same handles
    /// and never triggers another load.
    pub fn preload(&mut self, category: &Category) -> AssetList {
        if let Some(list) = self.lists.get(&category.name) {
            return list.clone();
        }

        log::info!(
            "Preloading {} ({} items)",
            category.name,
            category.item_count
        );

        let handles: Vec<ImageHandle> = (0..category.item_count)
            .map(|i| ImageHandle::pending(&category.name, i))
            .collect();
        let list: AssetList = Arc::new(handles);
        self.lists.insert(category.name.clone(), list.clone());

        for handle in list.iter() {
            let pending = match self.loader {
                Some(ref loader) => loader.submit(handle.clone()).err(),
                None => Some(handle.clone()),
            };
            if let Some(handle) = pending {
                load_into(self.source.as_ref(), &handle);
            }
        }

        list
    }

    /// Cached list for a category, if it was preloaded
    pub fn get(&self, name: &str) -> Option<AssetList> {
        self.lists.get(name).cloned()
    }

    /// Whether a category's list exists
    pub fn contains(&self, name: &str) -> bool {
        self.lists.contains_key(name)
    }
}
