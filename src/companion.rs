//! Locates the source image a mask was derived from, by naming convention.

use log::info;

use crate::classifier::Classifier;
use crate::container::ArrayContainer;
use crate::enums::Kind;

/// Extensions probed after the bare base name, in priority order.
pub const PROBE_SUFFIXES: [&str; 3] = ["", ".nii", ".nii.gz"];

/// The part of `mask_path` before the first `_`-prefixed mask token.
///
/// A token that does not start with `_` is matched with one prepended, so
/// `"9_tibia_R_mask_tibia_R"` with token `"mask_tibia"` or `"_mask_"` gives
/// `"9_tibia_R"`. Underscores belonging to the base are kept. Without the
/// token the path is returned unchanged.
pub fn base_from_mask<'a>(mask_path: &'a str, mask_token: &str) -> &'a str {
    if mask_token.is_empty() {
        return mask_path;
    }
    let separator = if mask_token.starts_with('_') {
        mask_token.to_string()
    } else {
        format!("_{mask_token}")
    };
    match mask_path.find(&separator) {
        Some(at) => &mask_path[..at],
        None => mask_path,
    }
}

/// Probe paths for the companion of `mask_path`, highest priority first.
pub fn probe_paths(mask_path: &str, mask_token: &str) -> Vec<String> {
    let base = base_from_mask(mask_path, mask_token);
    PROBE_SUFFIXES
        .iter()
        .map(|suffix| format!("{base}{suffix}"))
        .collect()
}

/// First probe that exists in `container` and classifies as an image.
pub fn find_companion<C: ArrayContainer + ?Sized>(
    mask_path: &str,
    mask_token: &str,
    container: &C,
    classifier: &dyn Classifier,
) -> Option<String> {
    let found = probe_paths(mask_path, mask_token)
        .into_iter()
        .filter(|probe| probe != mask_path)
        .find(|probe| is_image_entry(probe, container, classifier));
    if found.is_none() {
        info!("No companion image found for '{mask_path}'");
    }
    found
}

fn is_image_entry<C: ArrayContainer + ?Sized>(
    path: &str,
    container: &C,
    classifier: &dyn Classifier,
) -> bool {
    container
        .entry(path)
        .is_some_and(|e| classifier.classify(&e.path, e.element_type).kind() == Some(Kind::Image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{DtypeHeuristic, StrictNamePattern};
    use crate::container::MemoryContainer;
    use crate::enums::ElementType;
    use ndarray::{ArrayD, IxDyn};

    fn cube() -> ArrayD<f64> {
        ArrayD::zeros(IxDyn(&[4, 4, 4]))
    }

    #[test]
    fn base_truncates_at_token() {
        assert_eq!(base_from_mask("9_tibia_R_mask_tibia_R", "mask_tibia"), "9_tibia_R");
        assert_eq!(base_from_mask("9_tibia_R_mask_tibia_R", "_mask_"), "9_tibia_R");
        assert_eq!(base_from_mask("P_mask_T", "_mask_"), "P");
        assert_eq!(base_from_mask("plain", "_mask_"), "plain");
    }

    #[test]
    fn base_keeps_its_own_underscores() {
        assert_eq!(base_from_mask("P__mask_T", "_mask_"), "P_");
        assert_eq!(base_from_mask("7_tibia_L__mask_tibia_L", "mask_tibia"), "7_tibia_L_");
        // The strict token only counts after a separating `_`.
        assert_eq!(base_from_mask("7mask_tibia", "mask_tibia"), "7mask_tibia");
    }

    #[test]
    fn probes_in_fixed_order() {
        assert_eq!(
            probe_paths("7_tibia_L_mask_tibia_L", "mask_tibia"),
            ["7_tibia_L", "7_tibia_L.nii", "7_tibia_L.nii.gz"]
        );
    }

    #[test]
    fn finds_plain_companion() {
        let container = MemoryContainer::new()
            .with("P_mask_T", ElementType::Unsigned, cube())
            .with("P", ElementType::Float, cube());
        let found = find_companion("P_mask_T", "_mask_", &container, &DtypeHeuristic::default());
        assert_eq!(found.as_deref(), Some("P"));
    }

    #[test]
    fn strict_companion_with_extension() {
        let container = MemoryContainer::new()
            .with("7_tibia_L_mask_tibia_L", ElementType::Unsigned, cube())
            .with("7_tibia_L.nii.gz", ElementType::Float, cube());
        let found = find_companion(
            "7_tibia_L_mask_tibia_L",
            "mask_tibia",
            &container,
            &StrictNamePattern::default(),
        );
        assert_eq!(found.as_deref(), Some("7_tibia_L.nii.gz"));
    }

    #[test]
    fn bare_base_wins_over_extensions() {
        let container = MemoryContainer::new()
            .with("7_tibia_L.nii", ElementType::Float, cube())
            .with("7_tibia_L", ElementType::Float, cube());
        let found = find_companion(
            "7_tibia_L_mask_tibia_L",
            "mask_tibia",
            &container,
            &StrictNamePattern::default(),
        );
        assert_eq!(found.as_deref(), Some("7_tibia_L"));
    }

    #[test]
    fn same_name_that_is_not_an_image_is_skipped() {
        // Integer typed, so the dtype heuristic calls it a mask.
        let container = MemoryContainer::new()
            .with("P", ElementType::Signed, cube())
            .with("P.nii", ElementType::Float, cube());
        let found = find_companion("P_mask_T", "_mask_", &container, &DtypeHeuristic::default());
        assert_eq!(found.as_deref(), Some("P.nii"));
    }

    #[test]
    fn missing_companion_is_none() {
        let container =
            MemoryContainer::new().with("P_mask_T", ElementType::Unsigned, cube());
        assert!(
            find_companion("P_mask_T", "_mask_", &container, &DtypeHeuristic::default())
                .is_none()
        );
        // Without the token the only probe is the mask itself.
        assert!(
            find_companion("P_mask_T", "zzz", &container, &DtypeHeuristic::default()).is_none()
        );
    }
}
