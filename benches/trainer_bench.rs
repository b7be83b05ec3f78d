//! Performance benchmarks for the training loop.
//!
//! Measures one training epoch of the reference backend and the per-batch
//! mixing and EMA costs it is built from.

use afinar::io::InMemoryCheckpointer;
use afinar::monitor::InMemoryWriter;
use afinar::optim::{ConstantLR, GradScaler, SGD};
use afinar::train::{
    Batch, CrossEntropyLoss, Dataset, InMemoryLoader, LinearClassifier, Mix, MixConfig,
    MixStrategy, Model, ModelEma, NoMix, TrainConfig, Trainer, TrainerParts,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array1, ArrayD, IxDyn};

fn trainer(samples: usize, features: usize) -> Trainer {
    let data = Dataset::synthetic_blobs(samples, features, 10, 1.0, 0).unwrap();
    let model = LinearClassifier::new(features, 10, 0).unwrap();
    let parts = TrainerParts {
        ema: ModelEma::new(&model, 0.999).unwrap(),
        model: Box::new(model),
        train_loader: Box::new(InMemoryLoader::new(data, 64).unwrap().with_shuffle(0)),
        valid_loader: Box::new(Vec::<Batch>::new()),
        mix: Box::new(NoMix),
        criterion: Box::new(CrossEntropyLoss::new()),
        optimizer: Box::new(SGD::new(0.1, 0.9)),
        scheduler: Box::new(ConstantLR::new(0.1)),
        scaler: GradScaler::default(),
        checkpointer: Box::new(InMemoryCheckpointer::new()),
        writer: Box::new(InMemoryWriter::new()),
    };
    Trainer::new(TrainConfig::new().with_log_freq(1_000_000), parts).unwrap()
}

/// Benchmark one training epoch over growing datasets
fn bench_train_epoch(c: &mut Criterion) {
    let mut group = c.benchmark_group("TrainEpoch");
    group.sample_size(20);

    for samples in [1_024, 8_192].iter() {
        group.throughput(Throughput::Elements(*samples as u64));
        group.bench_with_input(BenchmarkId::new("linear_64", samples), samples, |b, &n| {
            let mut trainer = trainer(n, 64);
            let mut epoch = 0;
            b.iter(|| {
                let metrics = trainer.train_one_epoch(epoch).unwrap();
                epoch += 1;
                black_box(metrics)
            });
        });
    }
    group.finish();
}

/// Benchmark EMA updates for different parameter counts
fn bench_ema_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("ModelEma");

    for features in [64, 1_024, 16_384].iter() {
        let model = LinearClassifier::new(*features, 10, 0).unwrap();
        let mut ema = ModelEma::new(&model, 0.999).unwrap();
        group.throughput(Throughput::Elements(model.num_parameters() as u64));
        group.bench_with_input(BenchmarkId::new("update", features), features, |b, _| {
            b.iter(|| ema.update(black_box(model.parameters())).unwrap());
        });
    }
    group.finish();
}

/// Benchmark mixup and cutmix on image-shaped batches
fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("Mix");
    let batch = Batch::new(
        ArrayD::from_elem(IxDyn(&[64, 3, 32, 32]), 0.5),
        Array1::from_iter((0..64).map(|i| i % 10)),
    );

    let modes = [
        ("mixup", MixConfig { mixup_alpha: 0.8, ..MixConfig::default() }),
        ("cutmix", MixConfig { cutmix_alpha: 1.0, ..MixConfig::default() }),
    ];
    for (name, config) in modes {
        let mut mix = Mix::new(config, 0);
        group.bench_function(name, |b| {
            b.iter(|| black_box(mix.forward(batch.clone()).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_train_epoch, bench_ema_update, bench_mix);
criterion_main!(benches);
