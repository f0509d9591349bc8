use chrono::{Days, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use liftrs::forecast::{LinearFit, StrengthTrendForecaster};
use liftrs::history::aggregate_sessions;
use liftrs::models::SetRecord;
use liftrs::overload::ProgressiveOverloadAnalyzer;

/// Benchmarks for the per-exercise analyzers over growing histories

fn create_history(sessions: u64) -> Vec<SetRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    (0..sessions)
        .flat_map(|i| {
            let date = start.checked_add_days(Days::new(i * 2)).unwrap();
            (0..4).map(move |s| SetRecord {
                exercise_id: "squat".to_string(),
                session_date: date,
                weight: 100.0 + i as f64 * 0.5,
                reps: 5 + (s % 3),
                completed: true,
            })
        })
        .collect()
}

fn bench_session_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Session Aggregation");

    for &sessions in &[10u64, 30, 100, 365] {
        let history = create_history(sessions);

        group.throughput(Throughput::Elements(history.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("aggregate_sessions", sessions),
            &history,
            |b, history| b.iter(|| aggregate_sessions(black_box(history))),
        );
    }

    group.finish();
}

fn bench_overload_analysis(c: &mut Criterion) {
    let analyzer = ProgressiveOverloadAnalyzer::new();
    let mut group = c.benchmark_group("Overload Analysis");

    for &sessions in &[10u64, 100] {
        let history = create_history(sessions);

        group.bench_with_input(
            BenchmarkId::new("analyze_sets", sessions),
            &history,
            |b, history| b.iter(|| analyzer.analyze_sets("squat", black_box(history))),
        );
    }

    group.finish();
}

fn bench_forecast(c: &mut Criterion) {
    let forecaster = StrengthTrendForecaster::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let mut group = c.benchmark_group("PR Forecast");

    for &sessions in &[10u64, 30] {
        let history = create_history(sessions);

        group.bench_with_input(
            BenchmarkId::new("forecast_sets", sessions),
            &history,
            |b, history| b.iter(|| forecaster.forecast_sets("squat", black_box(history), now)),
        );
    }

    let series: Vec<f64> = (0..1000).map(|i| 100.0 + (i as f64).sqrt()).collect();
    group.bench_function("linear_fit_1000", |b| {
        b.iter(|| LinearFit::fit(black_box(&series)))
    });

    group.finish();
}

criterion_group!(benches, bench_session_aggregation, bench_overload_analysis, bench_forecast);
criterion_main!(benches);
