//! Decides whether a container entry is an image, a mask, or neither.
//!
//! Two strategies share the [`Classifier`] trait. Both exclude metadata
//! names and non-numeric element types first, in that order.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::PickerConfig;
use crate::enums::{ElementType, Kind, Strategy};

/// Why an entry was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ineligible {
    MetadataName,
    NonNumeric,
    NameMismatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Eligible(Kind),
    Ineligible(Ineligible),
}

impl Classification {
    pub fn kind(self) -> Option<Kind> {
        match self {
            Classification::Eligible(kind) => Some(kind),
            Classification::Ineligible(_) => None,
        }
    }
}

pub trait Classifier {
    fn classify(&self, path: &str, element_type: ElementType) -> Classification;
}

/// Name-based exclusion shared by every strategy.
#[derive(Clone, Debug)]
pub struct MetadataRule {
    suffixes: Vec<String>,
    /// Compared case-insensitively.
    names_suffix: String,
}

impl MetadataRule {
    pub fn new(suffixes: Vec<String>, names_suffix: &str) -> Self {
        Self {
            suffixes,
            names_suffix: names_suffix.to_ascii_lowercase(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let name = last_segment(path);
        self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
            || (!self.names_suffix.is_empty()
                && name.to_ascii_lowercase().ends_with(&self.names_suffix))
    }

    fn screen(&self, path: &str, element_type: ElementType) -> Option<Classification> {
        if self.matches(path) {
            Some(Classification::Ineligible(Ineligible::MetadataName))
        } else if !element_type.is_numeric() {
            Some(Classification::Ineligible(Ineligible::NonNumeric))
        } else {
            None
        }
    }
}

impl Default for MetadataRule {
    fn default() -> Self {
        Self::new(vec!["_mask_name_lst".into()], "_names")
    }
}

/// Any numeric array is eligible; integers and mask-named arrays are masks.
#[derive(Clone, Debug)]
pub struct DtypeHeuristic {
    metadata: MetadataRule,
    mask_token: String,
}

impl DtypeHeuristic {
    pub fn new(metadata: MetadataRule, mask_token: &str) -> Self {
        Self {
            metadata,
            mask_token: mask_token.to_string(),
        }
    }
}

impl Default for DtypeHeuristic {
    fn default() -> Self {
        Self::new(MetadataRule::default(), "_mask_")
    }
}

impl Classifier for DtypeHeuristic {
    fn classify(&self, path: &str, element_type: ElementType) -> Classification {
        if let Some(rejected) = self.metadata.screen(path, element_type) {
            return rejected;
        }
        if !self.mask_token.is_empty() && path.contains(&self.mask_token) {
            return Classification::Eligible(Kind::Mask);
        }
        if element_type.is_integer() {
            return Classification::Eligible(Kind::Mask);
        }
        Classification::Eligible(Kind::Image)
    }
}

/// Only `<id>_tibia_<L|R>` images and names carrying the mask token are eligible.
#[derive(Clone, Debug)]
pub struct StrictNamePattern {
    metadata: MetadataRule,
    mask_token: String,
}

static IMAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+_tibia_[LR](?:\.nii(?:\.gz)?)?$").expect("image name pattern compiles")
});

impl StrictNamePattern {
    pub fn new(metadata: MetadataRule, mask_token: &str) -> Self {
        Self {
            metadata,
            mask_token: mask_token.to_string(),
        }
    }
}

impl Default for StrictNamePattern {
    fn default() -> Self {
        Self::new(MetadataRule::default(), "mask_tibia")
    }
}

impl Classifier for StrictNamePattern {
    fn classify(&self, path: &str, element_type: ElementType) -> Classification {
        if let Some(rejected) = self.metadata.screen(path, element_type) {
            return rejected;
        }
        let name = last_segment(path);
        let base = strip_volume_ext(name);
        if !self.mask_token.is_empty() && strip_volume_ext(path).contains(&self.mask_token) {
            return Classification::Eligible(Kind::Mask);
        }
        if IMAGE_NAME.is_match(name) || IMAGE_NAME.is_match(base) {
            return Classification::Eligible(Kind::Image);
        }
        Classification::Ineligible(Ineligible::NameMismatch)
    }
}

/// Builds the classifier named by `config.strategy`.
pub fn from_config(config: &PickerConfig) -> Box<dyn Classifier> {
    let metadata = MetadataRule::new(config.metadata_suffixes.clone(), &config.names_suffix);
    match config.strategy {
        Strategy::DtypeHeuristic => Box::new(DtypeHeuristic::new(metadata, &config.mask_token)),
        Strategy::StrictNamePattern => {
            Box::new(StrictNamePattern::new(metadata, &config.strict_mask_token))
        }
    }
}

pub(crate) fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn strip_volume_ext(name: &str) -> &str {
    name.strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
        .unwrap_or(name)
}
