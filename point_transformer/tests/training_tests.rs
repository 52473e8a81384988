//! Training-loop tests on the autodiff backend.

use std::sync::Arc;

use burn::backend::{Autodiff, NdArray};

use point_transformer::prelude::*;

type TestBackend = Autodiff<NdArray>;

fn training_config() -> TrainingConfig {
    let model = PointTransformerConfig::new()
        .with_planes(vec![16, 16, 32])
        .with_blocks(vec![1, 2, 1])
        .with_decoder_blocks(vec![1, 1, 1])
        .with_strides(vec![1, 4, 4])
        .with_nsamples(vec![4, 4, 4])
        .with_num_classes(3);
    let loss = SemSegLossConfig::new(3);
    let optimizer = OptimizerConfig::new().with_learning_rate(0.01).with_max_epoch(10);
    TrainingConfig::new(model, optimizer, loss, PreprocessConfig::new())
}

fn labeled_cloud(n: usize, offset: f32) -> SegmentationCloud {
    let points: Vec<Point3> = (0..n)
        .map(|i| Point3::new(offset + (i % 5) as f32 * 0.2, (i / 5) as f32 * 0.2, 0.0))
        .collect();
    let labels = points.iter().map(|p| if p.x - offset < 0.5 { 0 } else { 1 }).collect();
    SegmentationCloud::new(points)
        .with_features(vec![128.0; n * 3], 3)
        .unwrap()
        .with_labels(labels)
        .unwrap()
}

#[test]
fn test_train_step_updates_model() {
    let device = Default::default();
    let config = training_config();
    let mut trainer =
        SegmentationTrainer::<TestBackend>::new(&config, Arc::new(KdTreeSearch::new()), &device)
            .unwrap();

    let a = labeled_cloud(10, 0.0);
    let b = labeled_cloud(6, 3.0);
    let batch = ConcatBatcher::new().collate::<TestBackend>(&[&a, &b], &device).unwrap();

    for epoch in 0..3 {
        let metrics = trainer.train_step(&batch, epoch).unwrap();
        assert!(metrics.loss.is_finite());
        assert!((0.0..=1.0).contains(&metrics.accuracy));
        assert!((metrics.learning_rate - 0.01).abs() < 1e-12);
    }
    assert_eq!(trainer.step(), 3);
}

#[test]
fn test_learning_rate_follows_schedule() {
    let device = Default::default();
    let config = training_config();
    let mut trainer =
        SegmentationTrainer::<TestBackend>::new(&config, Arc::new(BruteForceSearch), &device)
            .unwrap();

    let cloud = labeled_cloud(8, 0.0);
    let batch = ConcatBatcher::new().collate::<TestBackend>(&[&cloud], &device).unwrap();

    // Milestones at 6 and 8 of 10 epochs.
    let late = trainer.train_step(&batch, 8).unwrap();
    assert!((late.learning_rate - 0.0001).abs() < 1e-12);
}

#[test]
fn test_ignored_labels_are_skipped() {
    let device = Default::default();
    let mut config = training_config();
    config.loss = SemSegLossConfig::new(3).with_ignored_labels(vec![-1]);
    let mut trainer =
        SegmentationTrainer::<TestBackend>::new(&config, Arc::new(KdTreeSearch::new()), &device)
            .unwrap();

    let points: Vec<Point3> = (0..6).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect();
    let cloud = SegmentationCloud::new(points)
        .with_features(vec![0.5; 18], 3)
        .unwrap()
        .with_labels(vec![-1, 0, 1, -1, 2, 0])
        .unwrap();
    let batch = ConcatBatcher::new().collate::<TestBackend>(&[&cloud], &device).unwrap();

    let metrics = trainer.train_step(&batch, 0).unwrap();
    assert!(metrics.loss.is_finite());
}

#[test]
fn test_unlabeled_batch_rejected() {
    let device = Default::default();
    let mut trainer = SegmentationTrainer::<TestBackend>::new(
        &training_config(),
        Arc::new(KdTreeSearch::new()),
        &device,
    )
    .unwrap();

    let cloud = SegmentationCloud::new(vec![Point3::default(); 4])
        .with_features(vec![0.0; 12], 3)
        .unwrap();
    let batch = ConcatBatcher::new().collate::<TestBackend>(&[&cloud], &device).unwrap();
    assert!(trainer.train_step(&batch, 0).is_err());
}

#[test]
fn test_validation_accumulates_metrics() {
    let device = Default::default();
    let trainer = SegmentationTrainer::<TestBackend>::new(
        &training_config(),
        Arc::new(KdTreeSearch::new()),
        &device,
    )
    .unwrap();

    let cloud = labeled_cloud(12, 0.0);
    let batch = ConcatBatcher::new().collate::<TestBackend>(&[&cloud], &device).unwrap();

    let mut metrics = SegmentationMetrics::new(3);
    let step = trainer.valid_step(&batch, &mut metrics).unwrap();
    assert!(step.loss.is_finite());
    assert!((metrics.accuracy() - step.accuracy).abs() < 1e-6);

    let predicted = trainer.predict(&batch).unwrap();
    assert_eq!(predicted.len(), 12);
}
