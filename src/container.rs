use ndarray::ArrayD;
use serde::Serialize;

use crate::enums::ElementType;
use crate::volume_loader::VolumeLoaderError;

/// One array discovered in a container.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContainerEntry {
    pub path: String,
    pub shape: Vec<usize>,
    pub element_type: ElementType,
}

impl ContainerEntry {
    pub fn new(path: impl Into<String>, shape: &[usize], element_type: ElementType) -> Self {
        Self {
            path: path.into(),
            shape: shape.to_vec(),
            element_type,
        }
    }

    /// Last three extents, if the entry has at least three dimensions.
    pub fn spatial_dims(&self) -> Option<(usize, usize, usize)> {
        match self.shape.as_slice() {
            [.., z, y, x] => Some((*z, *y, *x)),
            _ => None,
        }
    }
}

/// A read-only store of named, typed, multi-dimensional arrays.
pub trait ArrayContainer {
    /// Every array entry, in a discovery order that is stable for this handle.
    fn entries(&self) -> Result<Vec<ContainerEntry>, VolumeLoaderError>;

    /// Looks up a single entry by exact path.
    fn entry(&self, path: &str) -> Option<ContainerEntry>;

    fn contains(&self, path: &str) -> bool {
        self.entry(path).is_some()
    }

    /// Full contents of one entry, widened to `f64`.
    ///
    /// Integers beyond 2^53 lose precision, and a `u8` mask takes eight
    /// times its stored size while held here.
    fn read(&self, path: &str) -> Result<ArrayD<f64>, VolumeLoaderError>;
}

/// Container held entirely in memory. Insertion order is discovery order.
#[derive(Default)]
pub struct MemoryContainer {
    items: Vec<(ContainerEntry, ArrayD<f64>)>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous entry with the same path.
    pub fn insert(&mut self, path: &str, element_type: ElementType, data: ArrayD<f64>) {
        let entry = ContainerEntry::new(path, data.shape(), element_type);
        match self.items.iter_mut().find(|(e, _)| e.path == path) {
            Some(slot) => *slot = (entry, data),
            None => self.items.push((entry, data)),
        }
    }

    pub fn with(mut self, path: &str, element_type: ElementType, data: ArrayD<f64>) -> Self {
        self.insert(path, element_type, data);
        self
    }
}

impl ArrayContainer for MemoryContainer {
    fn entries(&self) -> Result<Vec<ContainerEntry>, VolumeLoaderError> {
        Ok(self.items.iter().map(|(e, _)| e.clone()).collect())
    }

    fn entry(&self, path: &str) -> Option<ContainerEntry> {
        self.items
            .iter()
            .find(|(e, _)| e.path == path)
            .map(|(e, _)| e.clone())
    }

    fn read(&self, path: &str) -> Result<ArrayD<f64>, VolumeLoaderError> {
        self.items
            .iter()
            .find(|(e, _)| e.path == path)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| VolumeLoaderError::Read {
                path: path.to_string(),
                reason: "no such entry".into(),
            })
    }
}

#[cfg(feature = "hdf5")]
pub use self::hdf5_backend::Hdf5Container;

#[cfg(feature = "hdf5")]
mod hdf5_backend {
    use std::path::{Path, PathBuf};

    use hdf5::types::TypeDescriptor;
    use hdf5::{Dataset, File, Group, Location, LocationToken};
    use log::debug;
    use ndarray::ArrayD;

    use super::{ArrayContainer, ContainerEntry};
    use crate::enums::ElementType;
    use crate::volume_loader::VolumeLoaderError;

    /// HDF5 file opened read-only. The handle is released when this is dropped.
    pub struct Hdf5Container {
        path: PathBuf,
        file: File,
    }

    impl Hdf5Container {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, VolumeLoaderError> {
            let path = path.as_ref().to_path_buf();
            let file = File::open(&path).map_err(|e| VolumeLoaderError::ContainerOpen {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            Ok(Self { path, file })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Depth-first walk. Objects reachable through several hard links
        /// are listed once, under the first path reached, and a group linked
        /// into its own subtree is not entered again.
        fn visit(
            &self,
            group: &Group,
            prefix: &str,
            seen: &mut Vec<ObjectId>,
            out: &mut Vec<ContainerEntry>,
        ) -> Result<(), VolumeLoaderError> {
            let names = group.member_names().map_err(|e| self.traversal_error(prefix, e))?;
            for name in names {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                if let Ok(dataset) = group.dataset(&name) {
                    if !self.first_visit(seen, &dataset, &path)? {
                        debug!("skipping {path}: already listed under another name");
                        continue;
                    }
                    out.push(ContainerEntry {
                        element_type: element_type(&dataset),
                        shape: dataset.shape(),
                        path,
                    });
                } else if let Ok(child) = group.group(&name) {
                    if !self.first_visit(seen, &child, &path)? {
                        debug!("skipping {path}: group already visited");
                        continue;
                    }
                    self.visit(&child, &path, seen, out)?;
                } else {
                    debug!("skipping {path}: neither dataset nor group");
                }
            }
            Ok(())
        }

        fn first_visit(
            &self,
            seen: &mut Vec<ObjectId>,
            location: &Location,
            at: &str,
        ) -> Result<bool, VolumeLoaderError> {
            let id = object_id(location).map_err(|e| self.traversal_error(at, e))?;
            if seen.contains(&id) {
                return Ok(false);
            }
            seen.push(id);
            Ok(true)
        }

        fn traversal_error(&self, at: &str, e: hdf5::Error) -> VolumeLoaderError {
            VolumeLoaderError::ContainerOpen {
                path: self.path.clone(),
                reason: format!("traversal failed at '/{at}': {e}"),
            }
        }
    }

    /// File number plus object token: equal for every hard link to one object.
    type ObjectId = (u64, LocationToken);

    fn object_id(location: &Location) -> hdf5::Result<ObjectId> {
        let info = location.loc_info()?;
        Ok((info.fileno, info.token))
    }

    fn element_type(dataset: &Dataset) -> ElementType {
        match dataset.dtype().and_then(|dt| dt.to_descriptor()) {
            Ok(TypeDescriptor::Integer(_)) => ElementType::Signed,
            Ok(TypeDescriptor::Unsigned(_)) => ElementType::Unsigned,
            Ok(TypeDescriptor::Float(_)) => ElementType::Float,
            _ => ElementType::Other,
        }
    }

    impl ArrayContainer for Hdf5Container {
        fn entries(&self) -> Result<Vec<ContainerEntry>, VolumeLoaderError> {
            let mut seen = Vec::new();
            self.first_visit(&mut seen, &self.file, "")?;
            let mut out = Vec::new();
            self.visit(&self.file, "", &mut seen, &mut out)?;
            Ok(out)
        }

        fn entry(&self, path: &str) -> Option<ContainerEntry> {
            let dataset = self.file.dataset(path).ok()?;
            Some(ContainerEntry {
                element_type: element_type(&dataset),
                shape: dataset.shape(),
                path: path.to_string(),
            })
        }

        fn read(&self, path: &str) -> Result<ArrayD<f64>, VolumeLoaderError> {
            let read_error = |e: hdf5::Error| VolumeLoaderError::Read {
                path: path.to_string(),
                reason: e.to_string(),
            };
            self.file
                .dataset(path)
                .and_then(|ds| ds.read_dyn::<f64>())
                .map_err(read_error)
        }
    }
}
