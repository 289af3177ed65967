#![cfg(feature = "hdf5")]

use std::path::Path;

use h5_volume::companion::find_companion;
use h5_volume::pipeline::{self, ConvertOptions};
use h5_volume::{
    ArrayContainer, ElementType, Hdf5Container, Kind, KindFilter, PickerConfig, Strategy,
    VolumeLoader, VolumeLoaderError,
};
use hdf5::types::VarLenUnicode;
use ndarray::{Array, Array1, Array3, Array4};

fn write_fixture(path: &Path) {
    let file = hdf5::File::create(path).unwrap();
    let vol = Array4::<f32>::from_shape_fn((1, 8, 8, 8), |(_, z, y, x)| (z + y + x) as f32);
    file.new_dataset_builder()
        .with_data(&vol)
        .create("vol")
        .unwrap();
    let names = Array1::<i32>::from_vec(vec![1, 2, 3, 4, 5]);
    file.new_dataset_builder()
        .with_data(&names)
        .create("vol_mask_name_lst")
        .unwrap();

    let group = file.create_group("tibia").unwrap();
    let image = Array3::<f32>::from_elem((6, 6, 6), 250.0);
    group
        .new_dataset_builder()
        .with_data(&image)
        .create("7_tibia_L")
        .unwrap();
    let mask = Array3::<u8>::from_shape_fn((6, 6, 6), |(z, _, _)| u8::from(z > 2));
    group
        .new_dataset_builder()
        .with_data(&mask)
        .create("7_tibia_L_mask_tibia_L")
        .unwrap();
    let labels: Array1<VarLenUnicode> =
        Array::from_vec(vec!["bone".parse().unwrap(), "cartilage".parse().unwrap()]);
    group
        .new_dataset_builder()
        .with_data(&labels)
        .create("labels")
        .unwrap();
}

#[test]
fn enumerates_every_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.h5");
    write_fixture(&path);

    let container = Hdf5Container::open(&path).unwrap();
    let entries = container.entries().unwrap();
    let summary: Vec<(&str, ElementType)> = entries
        .iter()
        .map(|e| (e.path.as_str(), e.element_type))
        .collect();
    assert_eq!(
        summary,
        [
            ("tibia/7_tibia_L", ElementType::Float),
            ("tibia/7_tibia_L_mask_tibia_L", ElementType::Unsigned),
            ("tibia/labels", ElementType::Other),
            ("vol", ElementType::Float),
            ("vol_mask_name_lst", ElementType::Signed),
        ]
    );
    assert_eq!(entries[3].shape, vec![1, 8, 8, 8]);
    assert!(container.contains("tibia/7_tibia_L"));
    assert!(!container.contains("tibia"));
}

#[test]
fn missing_file_is_container_open_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Hdf5Container::open(dir.path().join("absent.h5")),
        Err(VolumeLoaderError::ContainerOpen { .. })
    ));
}

#[test]
fn corrupt_file_is_container_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.h5");
    std::fs::write(&path, b"definitely not hdf5").unwrap();
    assert!(matches!(
        Hdf5Container::open(&path),
        Err(VolumeLoaderError::ContainerOpen { .. })
    ));
}

#[test]
fn metadata_list_is_never_offered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.h5");
    write_fixture(&path);

    let container = Hdf5Container::open(&path).unwrap();
    let config = PickerConfig {
        kind_filter: KindFilter::Image,
        ..PickerConfig::default()
    };
    let loader = VolumeLoader::new(&container, config).unwrap();
    let paths: Vec<String> = loader
        .candidates()
        .unwrap()
        .into_iter()
        .map(|c| c.entry.path)
        .collect();
    assert_eq!(paths, ["tibia/7_tibia_L", "vol"]);
}

#[test]
fn strict_mask_with_companion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.h5");
    write_fixture(&path);

    let container = Hdf5Container::open(&path).unwrap();
    let config = PickerConfig {
        kind_filter: KindFilter::Mask,
        strategy: Strategy::StrictNamePattern,
        seed: Some(5),
        ..PickerConfig::default()
    };
    let loader = VolumeLoader::new(&container, config).unwrap();
    let candidate = loader.pick().unwrap().unwrap();
    assert_eq!(candidate.entry.path, "tibia/7_tibia_L_mask_tibia_L");
    assert_eq!(candidate.kind, Kind::Mask);

    let companion = find_companion(
        &candidate.entry.path,
        loader.config().companion_token(),
        &container,
        loader.classifier(),
    );
    assert_eq!(companion.as_deref(), Some("tibia/7_tibia_L"));

    let mask = loader.load(&candidate).unwrap();
    assert_eq!(mask.dim(), (6, 6, 6));
    assert_eq!(mask.foreground_count(), Some(3 * 36));
}

#[test]
fn converts_squeezed_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.h5");
    write_fixture(&path);

    let container = Hdf5Container::open(&path).unwrap();
    let config = PickerConfig {
        kind_filter: KindFilter::Image,
        strategy: Strategy::DtypeHeuristic,
        seed: Some(1),
        ..PickerConfig::default()
    };
    let loader = VolumeLoader::new(&container, config).unwrap();
    let out = dir.path().join("out");
    let report = pipeline::convert_all(&loader, &out, ConvertOptions::default()).unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(report.written.len(), 2);
    assert!(out.join("vol.nii.gz").exists());
    assert!(out.join("tibia_7_tibia_L.nii.gz").exists());
}

#[test]
fn hard_links_and_cycles_are_visited_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linked.h5");
    write_fixture(&path);
    {
        let file = hdf5::File::open_rw(&path).unwrap();
        file.link_hard("tibia/7_tibia_L", "zz_alias").unwrap();
        file.link_hard("tibia", "tibia/loop").unwrap();
    }

    let container = Hdf5Container::open(&path).unwrap();
    let paths: Vec<String> = container
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(
        paths,
        [
            "tibia/7_tibia_L",
            "tibia/7_tibia_L_mask_tibia_L",
            "tibia/labels",
            "vol",
            "vol_mask_name_lst",
        ]
    );
}
