//! # h5-volume library
//!
//! Discovers the 3D volumes stored in a hierarchical array container (HDF5),
//! classifies each one as an intensity image or a label mask, picks one and
//! materializes it as a normalized volume ready to be written as NIfTI.
//!
//! Containers typically mix CT volumes, label masks and small metadata
//! arrays (label name lists and the like) under the same hierarchy. An entry
//! is offered as a volume only when:
//!  - its name is not a metadata name (`*_mask_name_lst`, `*_names`)
//!  - its element type is numeric
//!  - the active classification strategy accepts it
//!  - it has at least three dimensions and non-empty spatial extents
//!
//! Two classification strategies are available:
//!  - `dtype-heuristic`: integer arrays and `_mask_` names are masks,
//!    everything else numeric is an image
//!  - `strict-name-pattern`: only `<id>_tibia_<L|R>` names are images and
//!    only names containing `mask_tibia` are masks
//!
//! Images are normalized to `f32`; masks to `u8` labels under a configurable
//! policy (`auto`, `threshold`, `round`). For a mask, the image it was derived
//! from can be located by naming convention (see [`companion`]).
//!
//! # Examples
//!
//! ## Converting a random mask to NIfTI
//!
//! ```no_run
//! # use h5_volume::{Hdf5Container, PickerConfig, VolumeLoader, KindFilter};
//! # use std::path::Path;
//! let container = Hdf5Container::open("scans.h5").expect("should have opened the container");
//! let config = PickerConfig {
//!     kind_filter: KindFilter::Mask,
//!     seed: Some(42),
//!     ..PickerConfig::default()
//! };
//! let loader = VolumeLoader::new(&container, config).expect("configuration should be valid");
//! if let Some(candidate) = loader.pick().expect("should have listed the container") {
//!     let volume = loader.load(&candidate).expect("should have loaded a 3D volume");
//!     h5_volume::writer::write_nifti(&volume, Path::new("out"))
//!         .expect("should have written the volume");
//! }
//! ```

pub mod classifier;
pub mod companion;
pub mod config;
pub mod container;
pub mod enums;
pub mod launcher;
pub mod pipeline;
pub mod selector;
pub mod volume;
pub mod volume_loader;
pub mod writer;

pub use classifier::{Classification, Classifier, DtypeHeuristic, StrictNamePattern};
pub use config::PickerConfig;
#[cfg(feature = "hdf5")]
pub use container::Hdf5Container;
pub use container::{ArrayContainer, ContainerEntry, MemoryContainer};
pub use enums::{ElementType, Kind, KindFilter, MaskPolicy, Orientation, Strategy};
pub use selector::Candidate;
pub use volume::{Volume, VolumeData};
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
