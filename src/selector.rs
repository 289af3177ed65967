use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::classifier::Classifier;
use crate::container::ContainerEntry;
use crate::enums::{Kind, KindFilter};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub entry: ContainerEntry,
    pub kind: Kind,
}

/// At least three dimensions, with non-zero spatial (last three) extents.
pub fn has_volume_shape(shape: &[usize]) -> bool {
    match shape {
        [.., z, y, x] => *z > 0 && *y > 0 && *x > 0,
        _ => false,
    }
}

/// Eligible entries matching `kind_filter` and the volume shape rule, in
/// discovery order. Later duplicates of a path are dropped.
pub fn select_candidates(
    entries: &[ContainerEntry],
    classifier: &dyn Classifier,
    kind_filter: KindFilter,
) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::new();
    for entry in entries {
        let classification = classifier.classify(&entry.path, entry.element_type);
        let Some(kind) = classification.kind() else {
            debug!("{}: {:?}", entry.path, classification);
            continue;
        };
        if !kind_filter.accepts(kind) {
            debug!("{}: {kind} filtered out", entry.path);
            continue;
        }
        if !has_volume_shape(&entry.shape) {
            debug!("{}: shape {:?} is not a volume", entry.path, entry.shape);
            continue;
        }
        if out.iter().any(|c| c.entry.path == entry.path) {
            continue;
        }
        out.push(Candidate {
            entry: entry.clone(),
            kind,
        });
    }
    out
}

/// Random generator for selection: reproducible when seeded.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Uniformly picks one candidate, or `None` when there are none.
pub fn pick_one<'a, R: Rng>(candidates: &'a [Candidate], rng: &mut R) -> Option<&'a Candidate> {
    if candidates.is_empty() {
        return None;
    }
    candidates.get(rng.gen_range(0..candidates.len()))
}
