use gallery_sync::archive::MemoryArchive;
use gallery_sync::cache::MetadataCache;
use gallery_sync::library::Library;
use gallery_sync::pipeline::{
    ArtifactPipeline, PipelineError, Profile, ProfileKind, ProfileSet, Transform, RESIZE_FLAG,
};
use gallery_sync::scheduler::{SyncScheduler, SyncSettings};
use gallery_sync::store::SqliteStore;
use image::{ImageFormat, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Stand-in for `convert`: writes a solid JPEG sized by the `-resize` geometry.
#[derive(Default)]
pub struct FakeConvert {
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl Transform for FakeConvert {
    fn run(&self, source: &Path, params: &[String], dest: &Path) -> Result<(), PipelineError> {
        fs::metadata(source).map_err(|e| PipelineError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.calls.lock().unwrap().push(params.to_vec());

        let idx = params.iter().position(|p| p == RESIZE_FLAG).unwrap();
        let (w, h) = params[idx + 1].split_once('x').unwrap();
        let h = h.trim_end_matches(|c: char| !c.is_ascii_digit());
        RgbImage::from_pixel(w.parse().unwrap(), h.parse().unwrap(), Rgb([200, 180, 40]))
            .save_with_format(dest, ImageFormat::Jpeg)
            .unwrap();
        Ok(())
    }
}

/// A gallery rooted in a temp dir, with a fake transform and an in-memory
/// archive.
pub struct Gallery {
    pub dir: TempDir,
    pub convert: Arc<FakeConvert>,
    pub library: Library,
    pub archive: Arc<MemoryArchive>,
    pub scheduler: SyncScheduler,
}

impl Gallery {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self::open(dir)
    }

    /// Open (or reopen) a gallery in `dir`.
    pub fn open(dir: TempDir) -> Self {
        let root = dir.path();
        for sub in ["images", "small", "medium", "incoming"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }

        let store = SqliteStore::open(&root.join("gallery.db")).unwrap();
        let cache = Arc::new(MetadataCache::load(Arc::new(store)).unwrap());

        let convert = Arc::new(FakeConvert::default());
        let profiles = ProfileSet::new(
            Profile::from_opts(ProfileKind::Small, root.join("small"), "-resize 40x30 -strip"),
            Profile::from_opts(ProfileKind::Medium, root.join("medium"), "-resize 120x90> -quality 90"),
        );
        let pipeline = ArtifactPipeline::new(profiles, convert.clone());
        let library = Library::new(root.join("images"), pipeline, cache.clone());

        let archive = Arc::new(MemoryArchive::new());
        let scheduler = SyncScheduler::new(
            cache,
            archive.clone(),
            SyncSettings {
                images_dir: root.join("images"),
                remote_dir: "gallery-backup".into(),
            },
        );

        Self {
            dir,
            convert,
            library,
            archive,
            scheduler,
        }
    }

    /// A second writer over the same store and directories, as a separate
    /// CLI invocation would open it.
    pub fn second_writer(&self) -> Library {
        let root = self.dir.path();
        let store = SqliteStore::open(&root.join("gallery.db")).unwrap();
        let cache = Arc::new(MetadataCache::load(Arc::new(store)).unwrap());
        let profiles = ProfileSet::new(
            Profile::from_opts(ProfileKind::Small, root.join("small"), "-resize 40x30 -strip"),
            Profile::from_opts(ProfileKind::Medium, root.join("medium"), "-resize 120x90> -quality 90"),
        );
        let pipeline = ArtifactPipeline::new(profiles, Arc::new(FakeConvert::default()));
        Library::new(root.join("images"), pipeline, cache)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Drop a file into `incoming/` ready to be added.
    pub fn incoming(&self, name: &str) -> PathBuf {
        let path = self.path("incoming").join(name);
        fs::write(&path, format!("primary bytes of {name}")).unwrap();
        path
    }
}
