//! End-to-end operations built on [`VolumeLoader`]: conversion of one or all
//! candidates to NIfTI, and preparation of temporary volumes for the viewer.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::companion;
use crate::container::ArrayContainer;
use crate::enums::Kind;
use crate::selector::Candidate;
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};
use crate::writer::{self, TempVolumes};

#[derive(Debug)]
pub struct ConvertOutcome {
    pub candidate: Candidate,
    /// `None` on a dry run.
    pub output: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertOptions {
    pub dry_run: bool,
    pub preview: bool,
}

/// Picks one candidate and writes it to `out_dir`.
///
/// Returns `Ok(None)` when nothing matches the configuration.
pub fn convert_one<C: ArrayContainer + ?Sized>(
    loader: &VolumeLoader<'_, C>,
    out_dir: &Path,
    options: ConvertOptions,
) -> Result<Option<ConvertOutcome>, VolumeLoaderError> {
    let Some(candidate) = loader.pick()? else {
        return Ok(None);
    };
    if options.dry_run {
        info!("Dry run: no files written");
        return Ok(Some(ConvertOutcome {
            candidate,
            output: None,
            preview: None,
        }));
    }
    let (output, preview) = convert_candidate(loader, &candidate, out_dir, options.preview)?;
    Ok(Some(ConvertOutcome {
        candidate,
        output: Some(output),
        preview,
    }))
}

fn convert_candidate<C: ArrayContainer + ?Sized>(
    loader: &VolumeLoader<'_, C>,
    candidate: &Candidate,
    out_dir: &Path,
    preview: bool,
) -> Result<(PathBuf, Option<PathBuf>), VolumeLoaderError> {
    let volume = loader.load(candidate)?;
    let output = writer::write_nifti(&volume, out_dir)?;
    let preview = if preview {
        writer::write_preview(&volume, out_dir)?
    } else {
        None
    };
    Ok((output, preview))
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Candidates found, whether or not they were written.
    pub matched: usize,
    pub written: Vec<PathBuf>,
    pub previews: Vec<PathBuf>,
    pub failed: Vec<(String, VolumeLoaderError)>,
}

/// Converts every candidate. A failing entry is recorded and skipped.
pub fn convert_all<C: ArrayContainer + ?Sized>(
    loader: &VolumeLoader<'_, C>,
    out_dir: &Path,
    options: ConvertOptions,
) -> Result<BatchReport, VolumeLoaderError> {
    let candidates = loader.candidates()?;
    let mut report = BatchReport {
        matched: candidates.len(),
        ..BatchReport::default()
    };
    for candidate in candidates {
        if options.dry_run {
            info!("Would convert {} ({})", candidate.entry.path, candidate.kind);
            continue;
        }
        match convert_candidate(loader, &candidate, out_dir, options.preview) {
            Ok((output, preview)) => {
                report.written.push(output);
                report.previews.extend(preview);
            }
            Err(e) => {
                warn!("Skipping {}: {e}", candidate.entry.path);
                report.failed.push((candidate.entry.path.clone(), e));
            }
        }
    }
    Ok(report)
}

/// Temporary files to hand to the viewer.
#[derive(Debug, PartialEq)]
pub enum ViewPlan {
    Image {
        image: PathBuf,
    },
    Mask {
        mask: PathBuf,
        background: Option<PathBuf>,
    },
}

/// Picks a candidate and writes it (plus the companion image of a mask when
/// `companion_lookup` is set) into `temps`.
///
/// Returns `Ok(None)` when nothing matches. The files live as long as `temps`.
pub fn prepare_view<C: ArrayContainer + ?Sized>(
    loader: &VolumeLoader<'_, C>,
    temps: &mut TempVolumes,
) -> Result<Option<(Candidate, ViewPlan)>, VolumeLoaderError> {
    let Some(candidate) = loader.pick()? else {
        return Ok(None);
    };
    let volume = loader.load(&candidate)?;
    let path = temps.write(&volume)?;
    let plan = match candidate.kind {
        Kind::Image => ViewPlan::Image { image: path },
        Kind::Mask => {
            if let Some(count) = volume.foreground_count() {
                info!("Foreground voxels: {count}");
            }
            let background = if loader.config().companion_lookup {
                write_companion(loader, &candidate, temps)?
            } else {
                None
            };
            ViewPlan::Mask {
                mask: path,
                background,
            }
        }
    };
    Ok(Some((candidate, plan)))
}

fn write_companion<C: ArrayContainer + ?Sized>(
    loader: &VolumeLoader<'_, C>,
    mask: &Candidate,
    temps: &mut TempVolumes,
) -> Result<Option<PathBuf>, VolumeLoaderError> {
    let Some(image_path) = companion::find_companion(
        &mask.entry.path,
        loader.config().companion_token(),
        loader.container(),
        loader.classifier(),
    ) else {
        return Ok(None);
    };
    let Some(entry) = loader.container().entry(&image_path) else {
        return Ok(None);
    };
    info!("Companion image: {image_path}");
    let image = Candidate {
        entry,
        kind: Kind::Image,
    };
    let volume = loader.load(&image)?;
    temps.write(&volume).map(Some)
}
