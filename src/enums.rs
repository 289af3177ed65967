use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::volume_loader::VolumeLoaderError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Axial,
    Coronal,
    Sagittal,
}

/// What an eligible entry holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Image,
    Mask,
}

/// Element type of a container entry, as far as classification cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Signed,
    Unsigned,
    Float,
    Other,
}

impl ElementType {
    pub fn is_numeric(self) -> bool {
        !matches!(self, ElementType::Other)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ElementType::Signed | ElementType::Unsigned)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindFilter {
    #[default]
    Any,
    Image,
    Mask,
}

impl KindFilter {
    pub fn accepts(self, kind: Kind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Image => kind == Kind::Image,
            KindFilter::Mask => kind == Kind::Mask,
        }
    }
}

/// How mask entries are turned into small unsigned labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskPolicy {
    /// Integer sources are cast, float sources are thresholded.
    #[default]
    Auto,
    Threshold,
    Round,
    /// Integer sources become `value > 0`, float sources are thresholded.
    /// Only used by the interactive viewer and never parsed from a token.
    #[serde(skip)]
    Binary,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    DtypeHeuristic,
    StrictNamePattern,
}

fn unknown(what: &str, token: &str, expected: &str) -> VolumeLoaderError {
    VolumeLoaderError::Config(format!(
        "unknown {what} '{token}' (expected one of: {expected})"
    ))
}

impl FromStr for KindFilter {
    type Err = VolumeLoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(KindFilter::Any),
            "image" => Ok(KindFilter::Image),
            "mask" => Ok(KindFilter::Mask),
            other => Err(unknown("kind filter", other, "any, image, mask")),
        }
    }
}

impl FromStr for MaskPolicy {
    type Err = VolumeLoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(MaskPolicy::Auto),
            "threshold" => Ok(MaskPolicy::Threshold),
            "round" => Ok(MaskPolicy::Round),
            other => Err(unknown("mask policy", other, "auto, threshold, round")),
        }
    }
}

impl FromStr for Strategy {
    type Err = VolumeLoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dtype-heuristic" => Ok(Strategy::DtypeHeuristic),
            "strict-name-pattern" => Ok(Strategy::StrictNamePattern),
            other => Err(unknown(
                "classification strategy",
                other,
                "dtype-heuristic, strict-name-pattern",
            )),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Image => "image",
            Kind::Mask => "mask",
        })
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementType::Signed => "int",
            ElementType::Unsigned => "uint",
            ElementType::Float => "float",
            ElementType::Other => "other",
        })
    }
}
