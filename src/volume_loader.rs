use crate::classifier::{self, Classifier};
use crate::config::PickerConfig;
use crate::container::{ArrayContainer, ContainerEntry};
use crate::selector::{self, Candidate};
use crate::volume::Volume;

use log::{debug, info};
use ndarray::{Array3, ArrayD, Axis, Ix3};
use rand::Rng;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Cannot open container {}: {reason}", path.display())]
    ContainerOpen { path: PathBuf, reason: String },

    #[error("No matching datasets found")]
    NoCandidates,

    #[error("Dataset '{path}' has shape {shape:?}, which is not 3D after squeezing")]
    Shape { path: String, shape: Vec<usize> },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot read dataset '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Runs discovery, selection and extraction against one container under a
/// fixed configuration.
pub struct VolumeLoader<'c, C: ArrayContainer + ?Sized> {
    container: &'c C,
    config: PickerConfig,
    classifier: Box<dyn Classifier>,
}

impl<'c, C: ArrayContainer + ?Sized> VolumeLoader<'c, C> {
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::Config`] if the configuration is invalid.
    pub fn new(container: &'c C, config: PickerConfig) -> Result<Self, VolumeLoaderError> {
        config.validate()?;
        let classifier = classifier::from_config(&config);
        Ok(Self {
            container,
            config,
            classifier,
        })
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn container(&self) -> &C {
        self.container
    }

    pub fn entries(&self) -> Result<Vec<ContainerEntry>, VolumeLoaderError> {
        self.container.entries()
    }

    /// Every entry that passes classification, the kind filter and the shape rule.
    pub fn candidates(&self) -> Result<Vec<Candidate>, VolumeLoaderError> {
        let entries = self.entries()?;
        let candidates =
            selector::select_candidates(&entries, self.classifier(), self.config.kind_filter);
        debug!(
            "{} of {} entries are candidates",
            candidates.len(),
            entries.len()
        );
        Ok(candidates)
    }

    /// Picks one candidate with a generator seeded from the configuration.
    pub fn pick(&self) -> Result<Option<Candidate>, VolumeLoaderError> {
        let mut rng = selector::rng_from_seed(self.config.seed);
        self.pick_with(&mut rng)
    }

    pub fn pick_with<R: Rng>(&self, rng: &mut R) -> Result<Option<Candidate>, VolumeLoaderError> {
        let candidates = self.candidates()?;
        let choice = selector::pick_one(&candidates, rng).cloned();
        if let Some(c) = &choice {
            info!(
                "Selected dataset: {}  kind={}  shape={:?}  dtype={}",
                c.entry.path, c.kind, c.entry.shape, c.entry.element_type
            );
        }
        Ok(choice)
    }

    /// Reads an entry and squeezes it to (depth, height, width).
    pub fn extract(&self, entry: &ContainerEntry) -> Result<Array3<f64>, VolumeLoaderError> {
        let raw = self.container.read(&entry.path)?;
        squeeze_to_3d(&entry.path, raw)
    }

    /// Extracts a candidate and normalizes it for its kind.
    pub fn load(&self, candidate: &Candidate) -> Result<Volume, VolumeLoaderError> {
        let raw = self.extract(&candidate.entry)?;
        Ok(Volume::normalize(
            candidate.entry.path.clone(),
            &raw,
            candidate.kind,
            candidate.entry.element_type,
            self.config.mask_policy,
            self.config.threshold,
        ))
    }
}

/// Drops every axis of extent 1 and requires exactly three to remain.
pub fn squeeze_to_3d(path: &str, mut raw: ArrayD<f64>) -> Result<Array3<f64>, VolumeLoaderError> {
    let shape_error = |shape: &[usize]| VolumeLoaderError::Shape {
        path: path.to_string(),
        shape: shape.to_vec(),
    };
    let original = raw.shape().to_vec();
    for axis in (0..raw.ndim()).rev() {
        if raw.len_of(Axis(axis)) == 1 {
            raw = raw.index_axis_move(Axis(axis), 0);
        }
    }
    raw.into_dimensionality::<Ix3>()
        .map_err(|_| shape_error(&original))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;
    use crate::enums::{ElementType, Kind, KindFilter, MaskPolicy};
    use ndarray::IxDyn;

    fn filled(shape: &[usize], value: f64) -> ArrayD<f64> {
        ArrayD::from_elem(IxDyn(shape), value)
    }

    #[test]
    fn squeeze_removes_unit_axes() {
        let squeezed = squeeze_to_3d("v", filled(&[1, 4, 1, 5, 6], 1.0)).unwrap();
        assert_eq!(squeezed.dim(), (4, 5, 6));
    }

    #[test]
    fn squeeze_rejects_other_ranks() {
        for shape in [&[1, 1, 1][..], &[4, 5][..], &[2, 3, 4, 5][..], &[0, 3, 4, 5][..]] {
            match squeeze_to_3d("v", filled(shape, 0.0)) {
                Err(VolumeLoaderError::Shape { path, shape: got }) => {
                    assert_eq!(path, "v");
                    assert_eq!(got, shape);
                }
                other => panic!("expected shape error, got {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_config_fails_before_reading() {
        let container = MemoryContainer::new();
        let config = PickerConfig {
            threshold: f64::INFINITY,
            ..PickerConfig::default()
        };
        assert!(matches!(
            VolumeLoader::new(&container, config),
            Err(VolumeLoaderError::Config(_))
        ));
    }

    #[test]
    fn picks_and_loads_the_only_volume() {
        let container = MemoryContainer::new()
            .with("vol", ElementType::Float, filled(&[1, 8, 8, 8], 3.5))
            .with("vol_mask_name_lst", ElementType::Signed, filled(&[5], 1.0));
        let loader = VolumeLoader::new(&container, PickerConfig::default()).unwrap();
        let candidate = loader.pick().unwrap().unwrap();
        assert_eq!(candidate.entry.path, "vol");
        let volume = loader.load(&candidate).unwrap();
        assert_eq!(volume.kind(), Kind::Image);
        assert_eq!(volume.dim(), (8, 8, 8));
        assert!(volume.as_image().unwrap().iter().all(|&v| v == 3.5));
    }

    #[test]
    fn no_candidates_is_none() {
        let container = MemoryContainer::new()
            .with("vol", ElementType::Float, filled(&[8, 8, 8], 0.0));
        let config = PickerConfig {
            kind_filter: KindFilter::Mask,
            ..PickerConfig::default()
        };
        let loader = VolumeLoader::new(&container, config).unwrap();
        assert!(loader.pick().unwrap().is_none());
    }

    #[test]
    fn mask_policy_applies_on_load() {
        let container = MemoryContainer::new()
            .with("seg", ElementType::Float, filled(&[4, 4, 4], 0.7));
        let config = PickerConfig {
            kind_filter: KindFilter::Mask,
            mask_policy: MaskPolicy::Threshold,
            threshold: 0.8,
            mask_token: "seg".into(),
            ..PickerConfig::default()
        };
        let loader = VolumeLoader::new(&container, config).unwrap();
        let candidate = loader.pick().unwrap().unwrap();
        let volume = loader.load(&candidate).unwrap();
        assert_eq!(volume.foreground_count(), Some(0));
    }

    #[test]
    fn shape_error_surfaces_on_load() {
        let container = MemoryContainer::new()
            .with("stack", ElementType::Float, filled(&[2, 4, 4, 4], 0.0));
        let loader = VolumeLoader::new(&container, PickerConfig::default()).unwrap();
        let candidate = loader.pick().unwrap().unwrap();
        assert!(matches!(
            loader.load(&candidate),
            Err(VolumeLoaderError::Shape { .. })
        ));
    }
}
