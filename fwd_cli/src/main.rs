//! CLI demo for the forward-mode unit library.
//!
//! Builds a small convolution + affine network, checks its derivatives
//! against finite differences, trains it, then saves and reloads it.
//! Set `RUST_LOG=debug` to see per-step training output.

use std::path::Path;

use fwd_nn::finite_diff::{max_abs_error, parameter_finite_diff};
use fwd_nn::{
    load_from_file, save_to_file, Affine, Composite, Convolution, Dataset, SquaredError,
    TrainConfig, Trainer, Unit,
};
use fwd_tensor::{Shape, Tensor};
use log::error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEED: u64 = 7;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> fwd_nn::Result<()> {
    let mut rng = StdRng::seed_from_u64(SEED);

    println!("=== Forward-Mode Unit Demo ===\n");

    // 4x4 image -> 3x3 feature map (2x2 kernel) -> 1 output.
    let conv = Convolution::random(
        Shape::new(vec![2, 2])?,
        Shape::new(vec![4, 4])?,
        Shape::new(vec![3, 3])?,
        &mut rng,
    )?;
    let head = Affine::kaiming(9, 1, &mut rng)?;
    let children: Vec<Box<dyn Unit>> = vec![Box::new(conv), Box::new(head)];
    let mut net = Composite::new(children)?;
    println!(
        "Network: {} inputs -> {} output, {} parameters\n",
        net.input_size(),
        net.output_size(),
        net.variable_count()
    );

    // Target: mean brightness of the image, plus one.
    let mut inputs = Vec::new();
    let mut labels = Vec::new();
    for _ in 0..32 {
        let pixels: Vec<f32> = (0..16).map(|_| rng.gen_range(0.0..1.0)).collect();
        let target = pixels.iter().sum::<f32>() / 16.0 + 1.0;
        inputs.push(Tensor::vector(pixels)?);
        labels.push(Tensor::vector(vec![target])?);
    }
    let data = Dataset::labelled(inputs, labels)?;

    // Forward-mode derivatives vs central differences
    let probe = data.inputs()[0].clone();
    let mut max_err = 0.0f32;
    for p in 0..net.variable_count() {
        let forward = net.evaluate_with_derivative(&probe, None, Some(p))?.derivative;
        let numeric = parameter_finite_diff(&mut net, &probe, p, 1e-3)?;
        max_err = max_err.max(max_abs_error(forward.as_slice(), &numeric));
    }
    let tolerance = 1e-2;
    if max_err < tolerance {
        println!("PASS: derivative error ({:.2e}) < tolerance ({:.2e})", max_err, tolerance);
    } else {
        println!("FAIL: derivative error ({:.2e}) >= tolerance ({:.2e})", max_err, tolerance);
        std::process::exit(1);
    }

    // Training
    let mut trainer = Trainer::new(&data, &data, &SquaredError, StdRng::seed_from_u64(SEED))
        .with_workers(4);
    let before = trainer.test(&net, None)?;
    let config = TrainConfig::new(0.02).with_batch_size(8).with_batches(200);
    let report = trainer.fit(&mut net, &config, None)?;
    let after = trainer.test(&net, None)?;
    println!("\nTraining ({} batches):", report.gradient_lengths.len());
    println!("  loss before: {:.6}", before);
    println!("  loss after:  {:.6}", after);
    if let Some(length) = report.final_gradient_length() {
        println!("  final gradient length: {:.6}", length);
    }

    // Persistence
    let path = std::env::temp_dir().join(format!("fwd-demo-{}.bin", std::process::id()));
    save_to_file(&net, &path)?;
    let loaded = load_and_remove(&path)?;

    let mut identical = true;
    for x in data.inputs() {
        identical &= net.evaluate(x)? == loaded.evaluate(x)?;
    }
    println!("\nReloaded from {}:", path.display());
    println!("  parameters: {}", loaded.variable_count());
    println!("  outputs identical: {}", identical);
    Ok(())
}

/// Load a saved unit, deleting the file whether or not the load succeeds.
fn load_and_remove(path: &Path) -> fwd_nn::Result<Box<dyn Unit>> {
    let loaded = load_from_file(path);
    std::fs::remove_file(path)?;
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, 9i32.to_le_bytes()).unwrap();

        assert!(load_and_remove(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_saved_unit_is_reloaded_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.bin");
        let unit = Affine::new(vec![vec![2.0]], vec![-1.0]).unwrap();
        save_to_file(&unit, &path).unwrap();

        let loaded = load_and_remove(&path).unwrap();
        assert_eq!(loaded.parameter(0).unwrap(), 2.0);
        assert!(!path.exists());
    }
}
