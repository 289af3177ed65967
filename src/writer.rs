//! Persisting normalized volumes as NIfTI files.

use std::path::{Path, PathBuf};

use log::{info, warn};
use nifti::NiftiHeader;
use nifti::writer::WriterOptions;
use tempfile::TempPath;

use crate::enums::Orientation;
use crate::volume::{Volume, VolumeData};
use crate::volume_loader::VolumeLoaderError;

/// Turns a dataset path into a safe file stem.
pub fn sanitize_filename(name: &str) -> String {
    name.trim_matches('/')
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '.' | '-' => c,
            _ => '_',
        })
        .collect()
}

/// Header with an identity voxel-to-world transform.
fn identity_header() -> NiftiHeader {
    NiftiHeader {
        sform_code: 1,
        srow_x: [1.0, 0.0, 0.0, 0.0],
        srow_y: [0.0, 1.0, 0.0, 0.0],
        srow_z: [0.0, 0.0, 1.0, 0.0],
        ..NiftiHeader::default()
    }
}

/// Writes `volume` to `path`; gzip is used when the path ends in `.gz`.
pub fn write_nifti_to(volume: &Volume, path: &Path) -> Result<(), VolumeLoaderError> {
    let header = identity_header();
    let options = WriterOptions::new(path).reference_header(&header);
    match &volume.data {
        VolumeData::Image(data) => options.write_nifti(data)?,
        VolumeData::Mask(data) => options.write_nifti(data)?,
    }
    Ok(())
}

/// Writes `<out_dir>/<sanitized path>.nii.gz`, creating `out_dir` if needed.
pub fn write_nifti(volume: &Volume, out_dir: &Path) -> Result<PathBuf, VolumeLoaderError> {
    std::fs::create_dir_all(out_dir)?;
    let out_path = out_dir.join(format!("{}.nii.gz", sanitize_filename(&volume.path)));
    write_nifti_to(volume, &out_path)?;
    info!("Wrote: {}", out_path.display());
    Ok(out_path)
}

/// Writes the centre axial slice as `<out_dir>/<sanitized path>.png`.
pub fn write_preview(volume: &Volume, out_dir: &Path) -> Result<Option<PathBuf>, VolumeLoaderError> {
    let depth = volume.dim().0;
    let Some(image) = volume.slice_image(depth / 2, Orientation::Axial) else {
        return Ok(None);
    };
    std::fs::create_dir_all(out_dir)?;
    let out_path = out_dir.join(format!("{}.png", sanitize_filename(&volume.path)));
    image.save(&out_path)?;
    info!("Wrote preview: {}", out_path.display());
    Ok(Some(out_path))
}

/// Temporary NIfTI files that are deleted when the guard is dropped.
///
/// Deletion failures are logged and otherwise ignored.
#[derive(Default)]
pub struct TempVolumes {
    paths: Vec<TempPath>,
}

impl TempVolumes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `volume` to a fresh `slicer_tmp_*.nii.gz` and returns its path.
    pub fn write(&mut self, volume: &Volume) -> Result<PathBuf, VolumeLoaderError> {
        let temp = tempfile::Builder::new()
            .prefix("slicer_tmp_")
            .suffix(".nii.gz")
            .tempfile()?
            .into_temp_path();
        let path = temp.to_path_buf();
        // Registered before writing so a failed write is still cleaned up.
        self.paths.push(temp);
        write_nifti_to(volume, &path)?;
        Ok(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(|p| &**p)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Deletes every file now.
    pub fn cleanup(&mut self) {
        for temp in self.paths.drain(..) {
            let shown = temp.display().to_string();
            if let Err(e) = temp.close() {
                warn!("Failed to remove temporary file {shown}: {e}");
            }
        }
    }
}

impl Drop for TempVolumes {
    fn drop(&mut self) {
        self.cleanup();
    }
}
