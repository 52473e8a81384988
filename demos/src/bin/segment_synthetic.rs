#![warn(clippy::all)]

//! Trains a small Point Transformer on synthetic two-class scenes and reports
//! accuracy and mIoU after every epoch.
//!
//! Each scene is a floor plane with a box standing on it; points on the box are class 1.
//! Run with `RUST_LOG=info` to see progress.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use burn::backend::{Autodiff, NdArray};
use clap::{App, Arg};
use log::info;
use point_transformer::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

type DemoBackend = Autodiff<NdArray>;

struct Args {
    pub scenes: usize,
    pub points: usize,
    pub epochs: usize,
    pub seed: u64,
}

fn parse<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str, default: T) -> Result<T> {
    match matches.value_of(name) {
        Some(value) => value
            .parse()
            .map_err(|_| anyhow!("invalid value '{}' for --{}", value, name)),
        None => Ok(default),
    }
}

fn get_args() -> Result<Args> {
    let matches = App::new("segment_synthetic")
        .version("0.1")
        .about("Trains point_transformer on synthetic floor-and-box scenes")
        .arg(Arg::with_name("scenes").long("scenes").value_name("N").help("Number of scenes (default 8)"))
        .arg(Arg::with_name("points").long("points").value_name("N").help("Points per scene (default 256)"))
        .arg(Arg::with_name("epochs").long("epochs").value_name("N").help("Training epochs (default 4)"))
        .arg(Arg::with_name("seed").long("seed").value_name("SEED").help("Random seed (default 7)"))
        .get_matches();

    Ok(Args {
        scenes: parse(&matches, "scenes", 8)?,
        points: parse(&matches, "points", 256)?,
        epochs: parse(&matches, "epochs", 4)?,
        seed: parse(&matches, "seed", 7)?,
    })
}

/// A floor in z = 0 with a box on it. Colors are 8-bit; the box is reddish.
fn synthetic_scene(points: usize, rng: &mut StdRng) -> Result<SegmentationCloud> {
    let corner = Point3::new(rng.gen_range(0.5..2.0), rng.gen_range(0.5..2.0), 0.0);
    let size = rng.gen_range(0.4..1.0);

    let mut positions = Vec::with_capacity(points);
    let mut colors = Vec::with_capacity(points * 3);
    let mut labels = Vec::with_capacity(points);
    for i in 0..points {
        let on_box = i % 3 == 0;
        let p = if on_box {
            corner + Point3::new(rng.gen_range(0.0..size), rng.gen_range(0.0..size), rng.gen_range(0.0..size))
        } else {
            Point3::new(rng.gen_range(0.0..3.0), rng.gen_range(0.0..3.0), rng.gen_range(-0.01..0.01))
        };
        let base: [f32; 3] = if on_box { [200.0, 60.0, 50.0] } else { [120.0, 120.0, 120.0] };
        positions.push(p);
        colors.extend(base.iter().map(|c| c + rng.gen_range(-20.0..20.0)));
        labels.push(on_box as i64);
    }

    Ok(SegmentationCloud::new(positions)
        .with_features(colors, 3)?
        .with_labels(labels)?)
}

fn class_counts(scenes: &[SegmentationCloud], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; num_classes];
    for label in scenes.iter().filter_map(|s| s.labels()).flatten() {
        if let Some(count) = usize::try_from(*label).ok().and_then(|c| counts.get_mut(c)) {
            *count += 1;
        }
    }
    counts
}

fn collate(
    scenes: &[SegmentationCloud],
    indices: &[usize],
    split: Split,
    preprocessor: &mut Preprocessor,
    search: &dyn NeighborSearch,
    device: &<DemoBackend as burn::tensor::backend::Backend>::Device,
) -> Result<SegmentationBatch<DemoBackend>> {
    let processed = indices
        .iter()
        .map(|&i| preprocessor.process(&scenes[i], split, search))
        .collect::<point_transformer::Result<Vec<_>>>()?;
    let clouds: Vec<_> = processed.iter().map(|p| &p.cloud).collect();
    Ok(ConcatBatcher::new().collate::<DemoBackend>(&clouds, device)?)
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = get_args()?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let scenes = (0..args.scenes)
        .map(|_| synthetic_scene(args.points, &mut rng))
        .collect::<Result<Vec<_>>>()?;

    let num_classes = 2;
    let model = PointTransformerConfig::new()
        .with_planes(vec![32, 64, 128])
        .with_blocks(vec![1, 2, 2])
        .with_decoder_blocks(vec![1, 1, 1])
        .with_strides(vec![1, 4, 4])
        .with_nsamples(vec![8, 16, 16])
        .with_num_classes(num_classes);
    let weights = class_weights_from_counts(&class_counts(&scenes, num_classes));
    let loss = SemSegLossConfig::new(num_classes).with_class_weights(Some(weights));
    let optimizer = OptimizerConfig::new().with_max_epoch(args.epochs);
    let config = TrainingConfig::new(model, optimizer, loss, PreprocessConfig::new()).with_seed(args.seed);

    let device = Default::default();
    let search: Arc<dyn NeighborSearch> = Arc::new(KdTreeSearch::new());
    let mut trainer = SegmentationTrainer::<DemoBackend>::new(&config, search.clone(), &device)?;
    let mut preprocessor = Preprocessor::new(config.preprocess.clone(), config.seed)?;

    info!(
        "training on {} scenes of {} points for {} epochs",
        scenes.len(),
        args.points,
        args.epochs
    );

    let mut order: Vec<usize> = (0..scenes.len()).collect();
    for epoch in 0..args.epochs {
        let start = Instant::now();
        order.shuffle(&mut rng);
        for indices in order.chunks(config.batch_size) {
            let batch = collate(&scenes, indices, Split::Training, &mut preprocessor, search.as_ref(), &device)?;
            trainer.train_step(&batch, epoch)?.log(&format!("train epoch {}", epoch));
        }

        let mut metrics = SegmentationMetrics::new(num_classes);
        let all: Vec<usize> = (0..scenes.len()).collect();
        for indices in all.chunks(config.batch_size) {
            let batch = collate(&scenes, indices, Split::Validation, &mut preprocessor, search.as_ref(), &device)?;
            trainer.valid_step(&batch, &mut metrics)?;
        }
        metrics.log(&format!("valid epoch {}", epoch));
        info!("epoch {} took {:.2?}", epoch, start.elapsed());
    }

    Ok(())
}
