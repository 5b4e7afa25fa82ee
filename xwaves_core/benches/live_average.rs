use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use xwaves_core::{LiveAverage, live_average};

// Synthetic scans: exponential decay with additive white noise
fn synth_scans(scans: usize, points: usize, noise_amp: f64, seed: u64) -> Vec<Vec<f64>> {
    let mut state = seed.max(1);
    let mut next_f64 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..scans)
        .map(|_| {
            (0..points)
                .map(|i| {
                    let t = i as f64 / 50.0;
                    1e-3 * (-t).exp() + (next_f64() * 2.0 - 1.0) * noise_amp
                })
                .collect()
        })
        .collect()
}

pub fn bench_live_average(c: &mut Criterion) {
    let mut g = c.benchmark_group("live_average");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p xwaves_core --bench live_average
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let points = 2_000usize;
    for &scans in &[4usize, 32, 128] {
        let history = synth_scans(scans, points, 1e-5, 0xC0FFEE);
        let in_progress: Vec<f64> = history[0][..points / 2].to_vec();

        g.bench_function(format!("recompute_{scans}_scans"), |b| {
            b.iter(|| {
                let avg = live_average(black_box(&history), black_box(&in_progress));
                black_box(avg);
            })
        });

        let mut running = LiveAverage::new();
        for s in &history {
            let _ = running.push_completed(s);
        }
        g.bench_function(format!("incremental_{scans}_scans"), |b| {
            b.iter_batched(
                || in_progress.clone(),
                |p| {
                    let avg = running.current(black_box(&p));
                    black_box(avg);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(live, bench_live_average);
criterion_main!(live);
