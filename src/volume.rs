use crate::enums::{ElementType, Kind, MaskPolicy, Orientation};

use image::GrayImage;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::Zip;
use ndarray::s;
use rayon::prelude::*;

/// Voxel storage, typed by kind: `f32` intensities or `u8` labels.
#[derive(Clone, Debug, PartialEq)]
pub enum VolumeData {
    Image(Array3<f32>),
    Mask(Array3<u8>),
}

/// A normalized (depth, height, width) volume and the entry it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    pub path: String,
    pub data: VolumeData,
}

impl Volume {
    pub fn new(path: impl Into<String>, data: VolumeData) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Normalize squeezed raw values for `kind`.
    ///
    /// Images are cast to `f32`. Masks are reduced to `u8` labels according to
    /// `policy`; casts saturate at the `u8` bounds instead of wrapping.
    pub fn normalize(
        path: impl Into<String>,
        raw: &Array3<f64>,
        kind: Kind,
        source: ElementType,
        policy: MaskPolicy,
        threshold: f64,
    ) -> Self {
        let data = match kind {
            Kind::Image => VolumeData::Image(Zip::from(raw).par_map_collect(|&v| v as f32)),
            Kind::Mask => VolumeData::Mask(normalize_mask(raw, source, policy, threshold)),
        };
        Self::new(path, data)
    }

    pub fn kind(&self) -> Kind {
        match self.data {
            VolumeData::Image(_) => Kind::Image,
            VolumeData::Mask(_) => Kind::Mask,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        match &self.data {
            VolumeData::Image(data) => data.dim(),
            VolumeData::Mask(data) => data.dim(),
        }
    }

    pub fn as_image(&self) -> Option<&Array3<f32>> {
        match &self.data {
            VolumeData::Image(data) => Some(data),
            VolumeData::Mask(_) => None,
        }
    }

    pub fn as_mask(&self) -> Option<&Array3<u8>> {
        match &self.data {
            VolumeData::Mask(data) => Some(data),
            VolumeData::Image(_) => None,
        }
    }

    /// Number of non-zero voxels in a mask.
    pub fn foreground_count(&self) -> Option<usize> {
        self.as_mask()
            .map(|data| data.par_iter().filter(|&&v| v != 0).count())
    }

    /// Render one slice as 8-bit grayscale, windowed to the volume's value range.
    pub fn slice_image(&self, index: usize, orientation: Orientation) -> Option<GrayImage> {
        if !self.is_valid_index(index, &orientation) {
            return None;
        }
        let data = match &self.data {
            VolumeData::Image(data) => data.clone(),
            VolumeData::Mask(data) => data.mapv(f32::from),
        };
        let (lo, hi) = data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let slice = get_slice_from_axis(&data, index, &orientation);
        slice_to_image(&slice, lo, hi)
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let dim = self.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}

fn normalize_mask(
    raw: &Array3<f64>,
    source: ElementType,
    policy: MaskPolicy,
    threshold: f64,
) -> Array3<u8> {
    let binarize = |t: f64| Zip::from(raw).par_map_collect(move |&v| u8::from(v > t));
    match policy {
        MaskPolicy::Auto if source.is_integer() => {
            Zip::from(raw).par_map_collect(|&v| v as u8)
        }
        MaskPolicy::Binary if source.is_integer() => binarize(0.0),
        MaskPolicy::Auto | MaskPolicy::Binary | MaskPolicy::Threshold => binarize(threshold),
        MaskPolicy::Round => Zip::from(raw).par_map_collect(|&v| v.round_ties_even() as u8),
    }
}

fn get_slice_from_axis<'a>(
    data: &'a Array3<f32>,
    index: usize,
    orientation: &Orientation,
) -> ArrayView2<'a, f32> {
    match orientation {
        Orientation::Axial => data.slice(s![index, .., ..]),
        Orientation::Coronal => data.slice(s![.., index, ..]),
        Orientation::Sagittal => data.slice(s![.., .., index]),
    }
}

#[inline]
fn window_to_u8(value: f32, lo: f32, hi: f32) -> u8 {
    if hi <= lo {
        return 0;
    }
    (((value - lo) / (hi - lo)) * 255.0).clamp(0.0, 255.0) as u8
}

fn slice_to_image(slice: &ArrayView2<'_, f32>, lo: f32, hi: f32) -> Option<GrayImage> {
    let (height, width) = slice.dim();
    let pixel_data: Vec<u8> = slice
        .iter()
        .map(|&v| window_to_u8(v, lo, hi))
        .collect();
    GrayImage::from_raw(width as u32, height as u32, pixel_data)
}
