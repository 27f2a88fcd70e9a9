use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array3, ArrayView3};
use sspred::predictor::featurize;
use sspred::{clean_sequence, Predictor, PredictorError, StructureModel};

const SEQUENCE: &str = "MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQAPILSRVGDGTQDNLSGAEKAVQVKVKALPDAQFEVVHSLAKWKRQTLGQHDFSAGEGLYTHMKALRPDEDRLSPLHSVYVDQWDWERVMGDGERQFSTLKSTVEAIWAGIKATEAAVSEEFGLAPFLPDQIHFVHSQELLSRYPDLDAKGRERAIAKDLGAVFLVGIGGKLSDGHRHDVRAPDYDDWSTPSELGHAGLNGDILVWNPVLEDAFELSSMGIRVDADTLKHQLALTGDEDRLELEWHQALLRGEMPQTIGGGIGQSRLTMLLLQLPHIGQVQAGVWPAACRVNFHGH";

#[derive(Debug)]
struct ZeroModel;

impl StructureModel for ZeroModel {
    fn backend_name(&self) -> &'static str {
        "zero"
    }

    fn num_classes(&self) -> usize {
        3
    }

    fn forward(&self, features: ArrayView3<f32>) -> Result<Array3<f32>, PredictorError> {
        let (batch, len, _) = features.dim();
        Ok(Array3::zeros((batch, len, 3)))
    }
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Preprocessing");

    // Configure sampling
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let raw = format!(">sp|P0A7V8| test protein\n{}", SEQUENCE.to_lowercase());
    group.bench_function("clean_sequence", |b| b.iter(|| {
        clean_sequence(black_box(&raw), 1000)
    }));

    for (name, len) in [("short", 30), ("medium", 120), ("long", SEQUENCE.len())] {
        let sequence = &SEQUENCE[..len];
        group.bench_function(format!("featurize_{}", name), |b| b.iter(|| {
            featurize(black_box(sequence))
        }));
    }

    group.finish();
}

fn bench_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("Decoding");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let predictor = Predictor::builder()
        .with_model(ZeroModel)
        .build()
        .unwrap();

    group.bench_function("predict_pipeline_overhead", |b| b.iter(|| {
        predictor.predict(black_box(SEQUENCE), 1).unwrap()
    }));

    group.finish();
}

fn bench_checkpoint(c: &mut Criterion) {
    // Requires a weights directory; skipped when SSPRED_WEIGHTS is unset
    let Ok(dir) = std::env::var("SSPRED_WEIGHTS") else {
        return;
    };
    let predictor = match Predictor::builder().with_weights_dir(&dir).build() {
        Ok(predictor) => predictor,
        Err(e) => {
            eprintln!("Skipping model benchmark: {}", e);
            return;
        }
    };

    let mut group = c.benchmark_group("Prediction");
    group.sample_size(20);
    for (name, len) in [("short", 30), ("long", SEQUENCE.len())] {
        let sequence = &SEQUENCE[..len];
        group.bench_function(format!("predict_{}_{}", predictor.load_info().backend, name), |b| b.iter(|| {
            predictor.predict(black_box(sequence), 1).unwrap()
        }));
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_preprocessing,
    bench_decoding,
    bench_checkpoint
);
criterion_main!(benches);
