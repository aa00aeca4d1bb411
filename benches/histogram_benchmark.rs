// ========================================================================================
//
//                 Solvency Render Path Benchmark
//
// ========================================================================================
//
// Every control change re-runs the full view computation, so its cost bounds how
// responsive the dashboard feels. This measures the histogram on its own and a full
// `render` for tables of growing size.
//
// ========================================================================================

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use solvency::data::ClientTable;
use solvency::decision::Threshold;
use solvency::explanation::load_explanation_image;
use solvency::histogram::{HistogramOptions, build_histogram};
use solvency::stats::GroupFilter;
use solvency::view::{Dashboard, DashboardState};
use std::path::Path;
use std::sync::Arc;

const CLIENT_COUNTS: [usize; 3] = [1_000, 10_000, 100_000];

fn synthetic_table(clients: usize) -> ClientTable {
    let mut rng = StdRng::seed_from_u64(42);
    let credit: Vec<f64> = (0..clients).map(|_| rng.gen_range(0.0..1e6)).collect();
    let owns_car: Vec<f64> = (0..clients)
        .map(|_| if rng.gen_bool(0.3) { 1.0 } else { 0.0 })
        .collect();
    let target: Vec<f64> = (0..clients).map(|_| rng.gen_range(0.0..=1.0)).collect();
    ClientTable::from_columns(vec![
        ("AMT_CREDIT".to_string(), credit),
        ("FLAG_OWN_CAR".to_string(), owns_car),
        ("target".to_string(), target),
    ])
    .expect("synthetic table is valid")
}

fn benchmark_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for &clients in &CLIENT_COUNTS {
        let table = Arc::new(synthetic_table(clients));
        let column = table.feature("AMT_CREDIT").expect("feature exists");
        let values = column.values().to_vec();
        let range = column.range();

        group.throughput(Throughput::Elements(clients as u64));
        group.bench_with_input(
            BenchmarkId::new("histogram", clients),
            &values,
            |b, values| {
                b.iter(|| {
                    build_histogram(
                        black_box("AMT_CREDIT"),
                        black_box(values),
                        range,
                        black_box(500_000.0),
                        false,
                        HistogramOptions::default(),
                    )
                })
            },
        );

        let explanation = load_explanation_image(Path::new("shapsummaryplot.png"));
        let dashboard = Dashboard::new(Arc::clone(&table), explanation, 40);
        let state = DashboardState {
            client_id: 7,
            group: GroupFilter::ApprovedAtThreshold,
            ..dashboard.initial_state(Threshold::default())
        };
        group.bench_with_input(BenchmarkId::new("full_view", clients), &state, |b, state| {
            b.iter(|| black_box(dashboard.render(black_box(state))))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_render);
criterion_main!(benches);
