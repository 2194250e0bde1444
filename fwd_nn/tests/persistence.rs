//! Save/load round trips through the binary unit format.

use std::fs;
use std::io::Cursor;

use fwd_nn::{
    load_from_file, read_unit, save_to_file, write_unit, Affine, Composite, Convolution, NnError,
    Unit, UnitTag,
};
use fwd_tensor::{Shape, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn shape(dims: &[usize]) -> Shape {
    Shape::new(dims.to_vec()).unwrap()
}

fn three_layer_chain() -> Composite {
    let augmented: [[[f32; 3]; 2]; 3] = [
        [[1.0, 2.0, 1.0], [3.0, 4.0, 1.0]],
        [[5.0, 6.0, 1.0], [7.0, 8.0, 1.0]],
        [[9.0, 10.0, 1.0], [11.0, 12.0, 1.0]],
    ];
    let layers: Vec<Box<dyn Unit>> = augmented
        .iter()
        .map(|rows| {
            let rows = rows.iter().map(|r| r.to_vec()).collect();
            Box::new(Affine::from_augmented(rows).unwrap()) as Box<dyn Unit>
        })
        .collect();
    Composite::new(layers).unwrap()
}

/// Save to a temporary file and load it back.
fn round_trip(unit: &dyn Unit) -> Box<dyn Unit> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unit.bin");
    save_to_file(unit, &path).unwrap();
    load_from_file(&path).unwrap()
}

#[test]
fn test_composite_round_trip_grid() {
    init_logging();
    let net = three_layer_chain();
    let loaded = round_trip(&net);

    assert_eq!(loaded.tag(), UnitTag::Composite);
    assert_eq!(loaded.variable_count(), net.variable_count());
    for i in -10..=10 {
        for j in -10..=10 {
            let x = Tensor::vector(vec![i as f32, j as f32]).unwrap();
            assert_eq!(
                net.evaluate(&x).unwrap(),
                loaded.evaluate(&x).unwrap(),
                "input ({}, {})",
                i,
                j
            );
        }
    }
}

#[test]
fn test_convolution_round_trip() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(4);
    let conv = Convolution::random(shape(&[3, 2]), shape(&[5, 4]), shape(&[4, 4]), &mut rng)
        .unwrap();
    let loaded = round_trip(&conv);

    assert_eq!(loaded.variable_count(), 6);
    for p in 0..6 {
        assert_eq!(loaded.parameter(p).unwrap(), conv.parameter(p).unwrap());
    }
    let data: Vec<f32> = (0..20).map(|i| (i as f32 - 10.0) * 0.3).collect();
    let x = Tensor::vector(data).unwrap();
    assert_eq!(conv.evaluate(&x).unwrap(), loaded.evaluate(&x).unwrap());
}

#[test]
fn test_nested_mixed_round_trip() {
    let mut rng = StdRng::seed_from_u64(21);
    let conv = Convolution::random(shape(&[2, 2]), shape(&[3, 3]), shape(&[2, 2]), &mut rng)
        .unwrap();
    let inner: Vec<Box<dyn Unit>> = vec![
        Box::new(conv),
        Box::new(Affine::kaiming(4, 3, &mut rng).unwrap()),
    ];
    let outer: Vec<Box<dyn Unit>> = vec![
        Box::new(Composite::new(inner).unwrap()),
        Box::new(Affine::kaiming(3, 2, &mut rng).unwrap()),
    ];
    let net = Composite::new(outer).unwrap();

    let mut bytes: Vec<u8> = Vec::new();
    write_unit(&net, &mut bytes).unwrap();
    let loaded = read_unit(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(loaded.variable_count(), 4 + 15 + 8);
    let x = Tensor::vector(vec![0.5, 1.0, -1.0, 2.0, 0.0, 1.5, 3.0, -0.5, 1.0]).unwrap();
    assert_eq!(net.evaluate(&x).unwrap(), loaded.evaluate(&x).unwrap());
}

#[test]
fn test_save_overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unit.bin");
    fs::write(&path, vec![0xffu8; 256]).unwrap();

    let unit = Affine::new(vec![vec![2.0]], vec![-1.0]).unwrap();
    save_to_file(&unit, &path).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 4 * 3 + 4 * 2);
    assert_eq!(load_from_file(&path).unwrap().parameter(1).unwrap(), -1.0);
}

#[test]
fn test_unknown_tag_in_child() {
    let mut bytes = Vec::new();
    for v in [0i32, 1, 9] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.bin");
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        load_from_file(&path),
        Err(NnError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_from_file(dir.path().join("absent.bin")),
        Err(NnError::Io(_))
    ));
}
