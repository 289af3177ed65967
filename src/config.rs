use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::enums::{KindFilter, MaskPolicy, Strategy};
use crate::volume_loader::VolumeLoaderError;

/// Options recognized by the picker. Missing fields in a config file take
/// their default values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    pub kind_filter: KindFilter,
    pub seed: Option<u64>,
    pub mask_policy: MaskPolicy,
    pub threshold: f64,
    pub strategy: Strategy,
    pub companion_lookup: bool,
    pub metadata_suffixes: Vec<String>,
    pub names_suffix: String,
    /// Mask token used by the dtype heuristic.
    pub mask_token: String,
    /// Mask token used by the strict name pattern and the companion lookup.
    pub strict_mask_token: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            kind_filter: KindFilter::Any,
            seed: None,
            mask_policy: MaskPolicy::Auto,
            threshold: 0.5,
            strategy: Strategy::DtypeHeuristic,
            companion_lookup: false,
            metadata_suffixes: vec!["_mask_name_lst".into()],
            names_suffix: "_names".into(),
            mask_token: "_mask_".into(),
            strict_mask_token: "mask_tibia".into(),
        }
    }
}

impl PickerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, VolumeLoaderError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            VolumeLoaderError::Config(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Token the companion resolver truncates mask paths at.
    pub fn companion_token(&self) -> &str {
        match self.strategy {
            Strategy::DtypeHeuristic => &self.mask_token,
            Strategy::StrictNamePattern => &self.strict_mask_token,
        }
    }

    /// Settings for the interactive viewer. Masks are always binarized, so a
    /// configured policy is replaced with a warning. `background` turns the
    /// companion lookup on; without it the configured value is kept.
    pub fn for_viewer(mut self, background: bool) -> Self {
        if !matches!(self.mask_policy, MaskPolicy::Auto | MaskPolicy::Binary) {
            warn!(
                "Mask policy {:?} does not apply to the viewer; masks are binarized",
                self.mask_policy
            );
        }
        self.mask_policy = MaskPolicy::Binary;
        self.companion_lookup |= background;
        self
    }

    pub fn validate(&self) -> Result<(), VolumeLoaderError> {
        if !self.threshold.is_finite() {
            return Err(VolumeLoaderError::Config(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if self.metadata_suffixes.iter().any(String::is_empty) {
            return Err(VolumeLoaderError::Config(
                "metadata suffixes must not be empty".into(),
            ));
        }
        if self.mask_token.is_empty() || self.strict_mask_token.is_empty() {
            return Err(VolumeLoaderError::Config("mask tokens must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PickerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.companion_token(), "_mask_");
    }

    #[test]
    fn rejects_non_finite_threshold() {
        let config = PickerConfig {
            threshold: f64::NAN,
            ..PickerConfig::default()
        };
        assert!(matches!(config.validate(), Err(VolumeLoaderError::Config(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"kind_filter": "mask", "seed": 7, "strategy": "strict-name-pattern"}}"#
        )
        .unwrap();
        let config = PickerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.kind_filter, KindFilter::Mask);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.strategy, Strategy::StrictNamePattern);
        assert_eq!(config.mask_policy, MaskPolicy::Auto);
        assert_eq!(config.companion_token(), "mask_tibia");
    }

    #[test]
    fn unknown_policy_in_json_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mask_policy": "binary"}}"#).unwrap();
        assert!(matches!(
            PickerConfig::from_json_file(file.path()),
            Err(VolumeLoaderError::Config(_))
        ));
    }

    #[test]
    fn viewer_keeps_file_companion_lookup() {
        let from_file = PickerConfig {
            companion_lookup: true,
            mask_policy: MaskPolicy::Round,
            ..PickerConfig::default()
        };
        let viewer = from_file.for_viewer(false);
        assert!(viewer.companion_lookup);
        assert_eq!(viewer.mask_policy, MaskPolicy::Binary);

        assert!(PickerConfig::default().for_viewer(true).companion_lookup);
        assert!(!PickerConfig::default().for_viewer(false).companion_lookup);
    }
}
