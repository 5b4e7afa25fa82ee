use proptest::prelude::*;
use xwaves_core::sequencer::{expand, expand_leg};
use xwaves_core::{LegDescriptor, LiveAverage, live_average};

prop_compose! {
    fn leg_strategy()(
        start in -500.0f64..500.0,
        span in 0.0f64..200.0,
        step in 0.01f64..25.0,
    ) -> LegDescriptor {
        LegDescriptor::new(start, start + span, step)
    }
}

prop_compose! {
    fn history_strategy()(full in 1usize..40, scans in 1usize..6)(
        history in prop::collection::vec(prop::collection::vec(-1.0f64..1.0, full), scans),
        in_progress in prop::collection::vec(-1.0f64..1.0, 1..=full),
    ) -> (Vec<Vec<f64>>, Vec<f64>) {
        (history, in_progress)
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn legs_start_at_start_end_at_end_and_increase(leg in leg_strategy()) {
        let pos = expand_leg(&leg).unwrap();
        prop_assert_eq!(*pos.last().unwrap(), leg.end_ps);
        if leg.end_ps - leg.start_ps > leg.step_ps * 1e-6 {
            prop_assert_eq!(pos[0], leg.start_ps);
        }
        for w in pos.windows(2) {
            prop_assert!(w[1] > w[0], "not strictly increasing: {:?}", w);
            prop_assert!(w[1] - w[0] <= leg.step_ps * (1.0 + 1e-9));
        }
    }

    #[test]
    fn legs_concatenate_in_declaration_order(a in leg_strategy(), b in leg_strategy()) {
        let all = expand(&[a, b]).unwrap();
        let mut expected = expand_leg(&a).unwrap();
        expected.extend(expand_leg(&b).unwrap());
        prop_assert_eq!(all, expected);
    }

    #[test]
    fn incremental_average_matches_recomputed((history, in_progress) in history_strategy()) {
        let expected = live_average(&history, &in_progress).unwrap();
        let mut running = LiveAverage::new();
        for s in &history {
            running.push_completed(s).unwrap();
        }
        let got = running.current(&in_progress).unwrap();
        prop_assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(&expected) {
            prop_assert!((g - e).abs() < 1e-12, "{} vs {}", g, e);
        }
    }

    #[test]
    fn average_is_bounded_by_its_inputs((history, in_progress) in history_strategy()) {
        let avg = live_average(&history, &in_progress).unwrap();
        for (i, &v) in avg.iter().enumerate() {
            let mut col: Vec<f64> = history.iter().map(|s| s[i]).collect();
            if let Some(&x) = in_progress.get(i) {
                col.push(x);
            }
            let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(v >= lo - 1e-12 && v <= hi + 1e-12);
        }
    }
}
