//! Regression training example.
//!
//! Fits a 2 -> 8 -> 1 network to y = |x0 - x1| + 0.5 with normalised
//! forward-mode steps, then evaluates it on held-out points.

use fwd_nn::{Affine, Composite, Dataset, SquaredError, TrainConfig, Trainer, Unit};
use fwd_tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sample(rng: &mut StdRng, n: usize) -> fwd_nn::Result<Dataset> {
    let mut inputs = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let (a, b): (f32, f32) = (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        inputs.push(Tensor::vector(vec![a, b])?);
        labels.push(Tensor::vector(vec![(a - b).abs() + 0.5])?);
    }
    Dataset::labelled(inputs, labels)
}

fn main() -> fwd_nn::Result<()> {
    env_logger::init();
    let mut rng = StdRng::seed_from_u64(1234);

    let training = sample(&mut rng, 64)?;
    let testing = sample(&mut rng, 16)?;

    let layers: Vec<Box<dyn Unit>> = vec![
        Box::new(Affine::kaiming(2, 8, &mut rng)?),
        Box::new(Affine::kaiming(8, 1, &mut rng)?),
    ];
    let mut net = Composite::new(layers)?;

    println!("Training regression network ({} parameters)...\n", net.variable_count());

    let mut trainer = Trainer::new(&training, &testing, &SquaredError, rng).with_workers(4);
    let config = TrainConfig::new(0.05).with_batch_size(16).with_batches(25);

    for round in 0..8 {
        let report = trainer.fit(&mut net, &config, None)?;
        let loss = trainer.test(&net, None)?;
        println!(
            "Round {:2}: test loss = {:.6}, gradient length = {:.6}",
            round,
            loss,
            report.final_gradient_length().unwrap_or(0.0)
        );
    }

    println!("\nPredictions:");
    for (a, b) in [(0.0f32, 0.0f32), (0.5, -0.5), (-0.75, 0.25)] {
        let y = net.evaluate(&Tensor::vector(vec![a, b])?)?;
        println!(
            "  ({:5.2}, {:5.2}) -> {:.4} (target {:.4})",
            a,
            b,
            y.as_slice()[0],
            (a - b).abs() + 0.5
        );
    }
    Ok(())
}
