//! Performance benchmarks for boosting, scoring and the randomized search.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use loanboost::gbdt::{BoosterParams, GbdtClassifier};
use loanboost::metrics::roc_auc;
use loanboost::pipeline::PipelineParams;
use loanboost::search::{ParameterGrid, ParameterValue, RandomizedSearch};

/// Two informative features plus noise columns
fn loans(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.random::<f64>());
    let y = Array1::from_shape_fn(n_rows, |i| {
        let signal = x[[i, 0]] + 0.5 * x[[i, 1]] + 0.3 * rng.random::<f64>();
        if signal > 0.9 {
            1.0
        } else {
            0.0
        }
    });
    (x, y)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("GbdtClassifier::fit");
    group.sample_size(10);
    let params = BoosterParams {
        n_estimators: 50,
        ..BoosterParams::default()
    };

    for n_rows in [1_000, 10_000, 50_000] {
        let (x, y) = loans(n_rows, 8);
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &n_rows, |b, _| {
            b.iter(|| black_box(GbdtClassifier::fit(&params, x.view(), y.view())))
        });
    }
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let (x, y) = loans(10_000, 8);
    let model = match GbdtClassifier::fit(&BoosterParams::default(), x.view(), y.view()) {
        Ok(model) => model,
        Err(e) => panic!("fit failed: {e}"),
    };

    c.bench_function("GbdtClassifier::predict_proba/10000", |b| {
        b.iter(|| black_box(model.predict_proba(x.view())))
    });
}

fn bench_roc_auc(c: &mut Criterion) {
    let mut group = c.benchmark_group("roc_auc");
    for n in [1_000, 100_000] {
        let (x, y) = loans(n, 2);
        let scores = x.column(0).to_owned();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(roc_auc(y.view(), scores.view())))
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("RandomizedSearch::fit");
    group.sample_size(10);

    let (x, y) = loans(2_000, 4);
    let template = PipelineParams::new(BoosterParams {
        n_estimators: 20,
        ..BoosterParams::default()
    });
    let grid = ParameterGrid::new()
        .with(
            "classifier__max_depth",
            vec![ParameterValue::Int(3), ParameterValue::Int(6)],
        )
        .with(
            "classifier__learning_rate",
            vec![ParameterValue::Float(0.05), ParameterValue::Float(0.1)],
        );

    for n_jobs in [1, 4] {
        let search = RandomizedSearch::new(4, 5).with_seed(7).with_n_jobs(n_jobs);
        group.bench_with_input(BenchmarkId::new("n_jobs", n_jobs), &n_jobs, |b, _| {
            b.iter(|| black_box(search.fit(&template, &grid, x.view(), y.view())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict, bench_roc_auc, bench_search);
criterion_main!(benches);
