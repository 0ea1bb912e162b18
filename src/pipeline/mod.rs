//! Derived-variant regeneration.
//!
//! Every primary asset has one variant per [`Profile`] (small and medium).
//! [`ArtifactPipeline::regenerate`] runs the configured [`Transform`] for each
//! profile, writes the output under the asset's name in the profile's target
//! directory, then decodes the produced file to measure its pixel bounds.
//!
//! # Idempotence
//!
//! Outputs overwrite any previous file of the same name, so running the
//! pipeline twice on an unchanged source yields the same files and the same
//! dimensions.
//!
//! # Orientation
//!
//! For portrait records the first `-resize WxH` parameter of a profile is
//! transposed to `HxW` before the transform runs, see
//! [`profile::rewrite_for_orientation`].

pub mod profile;
pub mod transform;

use crate::store::{AssetRecord, Dimensions};
use image::{GenericImageView, ImageReader};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use profile::{rewrite_for_orientation, split_opts, Profile, ProfileKind, ProfileSet, RESIZE_FLAG};
pub use transform::{ConvertCommand, Transform, DEFAULT_PROGRAM};

/// Errors produced while regenerating variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The external transform exited unsuccessfully.
    #[error("transform {program} failed ({status}): {stderr}")]
    Transform {
        program: String,
        status: String,
        stderr: String,
    },

    /// The external transform ran past its deadline.
    #[error("transform {program} timed out after {limit:?}")]
    Timeout { program: String, limit: Duration },

    /// The produced variant could not be opened or decoded.
    #[error("failed to read generated variant {path}: {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A filesystem operation around the transform failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Measured bounds per profile, as returned by a regeneration.
pub type Regenerated = BTreeMap<ProfileKind, Dimensions>;

/// Produces the derived variants of primary assets.
#[derive(Clone)]
pub struct ArtifactPipeline {
    profiles: ProfileSet,
    transform: Arc<dyn Transform>,
}

impl ArtifactPipeline {
    #[must_use]
    pub fn new(profiles: ProfileSet, transform: Arc<dyn Transform>) -> Self {
        Self {
            profiles,
            transform,
        }
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Regenerate every profile of `record` from `source_dir/<name>`.
    ///
    /// Profiles are applied in order and the first failure ends the call;
    /// variants already written by earlier profiles are left in place.
    pub fn regenerate(
        &self,
        record: &AssetRecord,
        source_dir: &Path,
    ) -> Result<Regenerated, PipelineError> {
        let source = source_dir.join(&record.name);
        let mut measured = Regenerated::new();

        for profile in self.profiles.iter() {
            let dest = profile.target_path(&record.name);
            let params = profile.params_for(record.orientation);

            self.transform.run(&source, &params, &dest)?;
            let dims = measure(&dest)?;
            log::debug!("Generated {} variant of {}: {}", profile.kind, record.name, dims);
            measured.insert(profile.kind, dims);
        }

        Ok(measured)
    }

    /// Regenerate and store the measured bounds on the record itself.
    pub fn regenerate_into(
        &self,
        record: &mut AssetRecord,
        source_dir: &Path,
    ) -> Result<(), PipelineError> {
        let measured = self.regenerate(record, source_dir)?;
        if let Some(dims) = measured.get(&ProfileKind::Small) {
            record.small = *dims;
        }
        if let Some(dims) = measured.get(&ProfileKind::Medium) {
            record.medium = *dims;
        }
        Ok(())
    }
}

/// Decode `path` and return its pixel bounds.
pub fn measure(path: &Path) -> Result<Dimensions, PipelineError> {
    let read_err = |source| PipelineError::ArtifactRead {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path)
        .map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|e| read_err(image::ImageError::IoError(e)))?;
    let img = reader.decode().map_err(read_err)?;
    let (width, height) = img.dimensions();
    Ok(Dimensions::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Orientation;
    use image::{ImageFormat, RgbImage};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Writes a solid JPEG whose size is the `-resize` geometry.
    struct FakeResize {
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeResize {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transform for FakeResize {
        fn run(&self, source: &Path, params: &[String], dest: &Path) -> Result<(), PipelineError> {
            fs::metadata(source).map_err(|e| PipelineError::Io {
                path: source.to_path_buf(),
                source: e,
            })?;
            self.calls.lock().unwrap().push(params.to_vec());
            let idx = params.iter().position(|p| p == RESIZE_FLAG).unwrap();
            let (w, h) = params[idx + 1].split_once('x').unwrap();
            let img = RgbImage::from_pixel(w.parse().unwrap(), h.parse().unwrap(), image::Rgb([90, 120, 200]));
            img.save_with_format(dest, ImageFormat::Jpeg).unwrap();
            Ok(())
        }
    }

    struct Failing;

    impl Transform for Failing {
        fn run(&self, _: &Path, _: &[String], _: &Path) -> Result<(), PipelineError> {
            Err(PipelineError::Transform {
                program: "convert".into(),
                status: "exit status: 1".into(),
                stderr: "convert: no decode delegate".into(),
            })
        }
    }

    /// Claims success without writing anything.
    struct WritesGarbage;

    impl Transform for WritesGarbage {
        fn run(&self, _: &Path, _: &[String], dest: &Path) -> Result<(), PipelineError> {
            fs::write(dest, b"definitely not a jpeg").unwrap();
            Ok(())
        }
    }

    fn setup(transform: Arc<dyn Transform>) -> (TempDir, ArtifactPipeline) {
        let dir = tempdir().unwrap();
        for sub in ["base", "small", "medium"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
        }
        fs::write(dir.path().join("base/a.jpg"), b"primary").unwrap();
        let profiles = ProfileSet::new(
            Profile::from_opts(ProfileKind::Small, dir.path().join("small"), "-resize 40x30"),
            Profile::from_opts(ProfileKind::Medium, dir.path().join("medium"), "-resize 80x60 -quality 90"),
        );
        (dir, ArtifactPipeline::new(profiles, transform))
    }

    #[test]
    fn test_regenerate_measures_each_profile() {
        let (dir, pipeline) = setup(Arc::new(FakeResize::new()));
        let record = AssetRecord::new("a.jpg", Orientation::Landscape);

        let out = pipeline.regenerate(&record, &dir.path().join("base")).unwrap();
        assert_eq!(out[&ProfileKind::Small], Dimensions::new(40, 30));
        assert_eq!(out[&ProfileKind::Medium], Dimensions::new(80, 60));
        assert!(dir.path().join("small/a.jpg").exists());
        assert!(dir.path().join("medium/a.jpg").exists());
    }

    #[test]
    fn test_portrait_transposes_before_invocation() {
        let fake = Arc::new(FakeResize::new());
        let (dir, pipeline) = setup(fake.clone());
        let record = AssetRecord::new("a.jpg", Orientation::Portrait);

        let out = pipeline.regenerate(&record, &dir.path().join("base")).unwrap();
        assert_eq!(out[&ProfileKind::Small], Dimensions::new(30, 40));
        assert_eq!(out[&ProfileKind::Medium], Dimensions::new(60, 80));

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls[0], vec!["-resize", "30x40"]);
        assert_eq!(calls[1], vec!["-resize", "60x80", "-quality", "90"]);
    }

    #[test]
    fn test_regenerate_is_idempotent() {
        let (dir, pipeline) = setup(Arc::new(FakeResize::new()));
        let record = AssetRecord::new("a.jpg", Orientation::Unset);
        let base = dir.path().join("base");

        let first = pipeline.regenerate(&record, &base).unwrap();
        let small_1 = fs::read(dir.path().join("small/a.jpg")).unwrap();
        let medium_1 = fs::read(dir.path().join("medium/a.jpg")).unwrap();

        let second = pipeline.regenerate(&record, &base).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(dir.path().join("small/a.jpg")).unwrap(), small_1);
        assert_eq!(fs::read(dir.path().join("medium/a.jpg")).unwrap(), medium_1);
    }

    #[test]
    fn test_regenerate_into_updates_record() {
        let (dir, pipeline) = setup(Arc::new(FakeResize::new()));
        let mut record = AssetRecord::new("a.jpg", Orientation::Unset);
        pipeline
            .regenerate_into(&mut record, &dir.path().join("base"))
            .unwrap();
        assert_eq!(record.small, Dimensions::new(40, 30));
        assert_eq!(record.medium, Dimensions::new(80, 60));
    }

    #[test]
    fn test_transform_failure_is_surfaced() {
        let (dir, pipeline) = setup(Arc::new(Failing));
        let record = AssetRecord::new("a.jpg", Orientation::Unset);
        let err = pipeline
            .regenerate(&record, &dir.path().join("base"))
            .unwrap_err();
        assert!(err.to_string().contains("no decode delegate"));
    }

    #[test]
    fn test_undecodable_output_is_artifact_read_error() {
        let (dir, pipeline) = setup(Arc::new(WritesGarbage));
        let record = AssetRecord::new("a.jpg", Orientation::Unset);
        let err = pipeline
            .regenerate(&record, &dir.path().join("base"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactRead { .. }));
    }

    #[test]
    fn test_measure_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = measure(&dir.path().join("nope.jpg")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
