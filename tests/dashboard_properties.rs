use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use solvency::DashboardError;
use solvency::data::ClientTable;
use solvency::decision::{Threshold, approval_summary, resolve_decision};
use solvency::histogram::{AxisScale, HistogramOptions, build_histogram};
use solvency::stats::{GroupFilter, GroupStats, binary_membership, describe, group_values};

fn random_table(seed: u64, clients: usize) -> ClientTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let income: Vec<f64> = (0..clients).map(|_| rng.gen_range(1e4..5e5)).collect();
    let owns_car: Vec<f64> = (0..clients)
        .map(|_| if rng.gen_bool(0.4) { 1.0 } else { 0.0 })
        .collect();
    let children: Vec<f64> = (0..clients).map(|_| rng.gen_range(0..4) as f64).collect();
    let target: Vec<f64> = (0..clients).map(|_| rng.gen_range(0.0..=1.0)).collect();
    ClientTable::from_columns(vec![
        ("AMT_INCOME_TOTAL".to_string(), income),
        ("FLAG_OWN_CAR".to_string(), owns_car),
        ("CNT_CHILDREN".to_string(), children),
        ("target".to_string(), target),
    ])
    .unwrap()
}

fn pct(p: f64) -> Threshold {
    Threshold::from_percent(p).unwrap()
}

#[test]
fn approval_is_monotone_in_the_threshold() {
    let table = random_table(7, 300);
    for client_id in [0, 17, 150, 299] {
        let mut previously_approved = true;
        for step in 0..=100 {
            let approved = resolve_decision(&table, client_id, pct(step as f64))
                .unwrap()
                .approved;
            // Once refused, raising the threshold never approves again.
            assert!(previously_approved || !approved);
            previously_approved = approved;
        }
    }

    let counts: Vec<usize> = (0..=100)
        .map(|step| approval_summary(&table, pct(step as f64)).approved_count)
        .collect();
    assert!(counts.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn threshold_extremes() {
    let table = ClientTable::from_columns(vec![
        ("a".to_string(), vec![1.0, 2.0, 3.0]),
        ("target".to_string(), vec![0.0, 0.999, 1.0]),
    ])
    .unwrap();

    let everyone = approval_summary(&table, pct(0.0));
    assert_eq!(everyone.approved_count, 3);
    assert_abs_diff_eq!(everyone.approved_percent, 100.0, epsilon = 1e-12);

    // Only a certain repayment clears a 100% threshold.
    let top = approval_summary(&table, pct(100.0));
    assert_eq!(top.approved_count, 1);
    assert!(resolve_decision(&table, 2, pct(100.0)).unwrap().approved);
    assert!(!resolve_decision(&table, 1, pct(100.0)).unwrap().approved);
}

#[test]
fn binary_membership_ignores_row_order() {
    let table = random_table(11, 200);
    let expected = binary_membership(&table);
    assert!(expected.contains("FLAG_OWN_CAR"));
    assert!(!expected.contains("CNT_CHILDREN"));

    let mut rng = StdRng::seed_from_u64(99);
    let mut order: Vec<usize> = (0..table.row_count()).collect();
    for _ in 0..5 {
        order.shuffle(&mut rng);
        let mut columns: Vec<(String, Vec<f64>)> = table
            .features()
            .iter()
            .map(|column| {
                let values = column.values();
                (
                    column.name().to_string(),
                    order.iter().map(|&i| values[i]).collect(),
                )
            })
            .collect();
        let target = table.target();
        columns.push((
            "target".to_string(),
            order.iter().map(|&i| target[i]).collect(),
        ));
        let shuffled = ClientTable::from_columns(columns).unwrap();
        assert_eq!(binary_membership(&shuffled), expected);
    }
}

#[test]
fn continuous_statistics_stay_within_the_data() {
    let table = random_table(3, 250);
    for group in GroupFilter::ALL {
        let values = group_values(&table, "AMT_INCOME_TOTAL", group, pct(50.0)).unwrap();
        if values.is_empty() {
            continue;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        match describe(&values, values[0], false).unwrap() {
            GroupStats::Continuous {
                mean,
                median,
                std_dev,
            } => {
                assert!(min <= mean && mean <= max);
                assert!(min <= median && median <= max);
                assert!(std_dev >= 0.0);
            }
            other => panic!("Expected continuous stats, got {other:?}"),
        }
    }
}

#[test]
fn groups_partition_the_clients() {
    let table = random_table(5, 120);
    for step in [0.0, 25.0, 50.0, 75.0, 100.0] {
        let threshold = pct(step);
        let approved =
            group_values(&table, "CNT_CHILDREN", GroupFilter::ApprovedAtThreshold, threshold)
                .unwrap();
        let denied =
            group_values(&table, "CNT_CHILDREN", GroupFilter::DeniedAtThreshold, threshold)
                .unwrap();
        assert_eq!(approved.len() + denied.len(), table.row_count());
        assert_eq!(
            approved.len(),
            approval_summary(&table, threshold).approved_count
        );
    }
}

#[test]
fn histogram_heights_always_sum_to_one() {
    let table = random_table(21, 400);
    for feature in ["AMT_INCOME_TOTAL", "FLAG_OWN_CAR", "CNT_CHILDREN"] {
        let column = table.feature(feature).unwrap();
        for group in GroupFilter::ALL {
            for scale in [AxisScale::Linear, AxisScale::Logarithmic] {
                let values = group_values(&table, feature, group, pct(40.0)).unwrap();
                if values.is_empty() {
                    continue;
                }
                for bins in [1, 7, 40] {
                    let histogram = build_histogram(
                        feature,
                        &values,
                        column.range(),
                        values[0],
                        feature == "FLAG_OWN_CAR",
                        HistogramOptions { bins, scale },
                    )
                    .unwrap();
                    assert_eq!(histogram.heights.len(), bins);
                    assert_abs_diff_eq!(histogram.heights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
                    assert!(histogram.y_range.0 < histogram.y_range.1);
                }
            }
        }
    }
}

#[test]
fn approved_group_is_empty_at_the_top_threshold() {
    let table = ClientTable::from_columns(vec![
        ("AMT_CREDIT".to_string(), vec![100.0, 200.0, 300.0]),
        ("target".to_string(), vec![0.2, 0.6, 0.9]),
    ])
    .unwrap();
    let values =
        group_values(&table, "AMT_CREDIT", GroupFilter::ApprovedAtThreshold, pct(100.0)).unwrap();
    assert!(values.is_empty());
    assert!(matches!(
        describe(&values, 100.0, false),
        Err(DashboardError::EmptyGroup)
    ));
    let range = table.feature("AMT_CREDIT").unwrap().range();
    assert!(matches!(
        build_histogram(
            "AMT_CREDIT",
            &values,
            range,
            100.0,
            false,
            HistogramOptions::default()
        ),
        Err(DashboardError::EmptyGroup)
    ));
}
