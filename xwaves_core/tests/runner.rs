use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::rstest;
use xwaves_core::error::ScanError;
use xwaves_core::mocks::MemoryArchive;
use xwaves_core::{
    AutorangeMode, ErrorMeasurementMode, ExperimentParameters, FilterSlope, LegDescriptor,
    ScanEvent, ScanOutcome, ScanRunner, ScanState, SessionOutcome, StepStatus,
};
use xwaves_traits::clock::test_clock::TestClock;
use xwaves_traits::{DelayStage, DeviceError, LockIn};

type Log = Arc<Mutex<Vec<String>>>;

fn log(l: &Log, s: impl Into<String>) {
    l.lock().unwrap().push(s.into());
}

/// Stage that reaches exactly what was requested and logs every move.
struct ScriptStage {
    log: Log,
    fail_at_move: Option<usize>,
    moves: usize,
}

impl DelayStage for ScriptStage {
    fn move_to(&mut self, delay_ps: f64) -> Result<f64, DeviceError> {
        self.moves += 1;
        if self.fail_at_move == Some(self.moves) {
            return Err(Box::new(std::io::Error::other("stage link lost")));
        }
        log(&self.log, format!("move {delay_ps}"));
        Ok(delay_ps)
    }
    fn home(&mut self) -> Result<(), DeviceError> {
        log(&self.log, "home");
        Ok(())
    }
}

/// Lock-in returning a fixed magnitude per scan pass, plus a noise counter.
struct ScriptLockIn {
    log: Log,
    values: Vec<f64>,
    reads: usize,
    noise_reads: usize,
}

impl LockIn for ScriptLockIn {
    fn set_time_constant(&mut self, seconds: f64) -> Result<(), DeviceError> {
        log(&self.log, format!("tc {seconds}"));
        Ok(())
    }
    fn set_filter_slope(&mut self, db: u8) -> Result<(), DeviceError> {
        log(&self.log, format!("slope {db}"));
        Ok(())
    }
    fn read_magnitude(&mut self) -> Result<f64, DeviceError> {
        let v = self.values[self.reads % self.values.len()];
        self.reads += 1;
        log(&self.log, "read");
        Ok(v)
    }
    fn read_noise(&mut self) -> Result<f64, DeviceError> {
        self.noise_reads += 1;
        log(&self.log, "noise");
        Ok(1e-6 * self.noise_reads as f64)
    }
    fn autorange(&mut self) -> Result<(), DeviceError> {
        log(&self.log, "autorange");
        Ok(())
    }
    fn find_next_sensitivity(&mut self) -> Result<f64, DeviceError> {
        Ok(0.5)
    }
    fn set_sensitivity(&mut self, volts: f64) -> Result<(), DeviceError> {
        log(&self.log, format!("sens {volts}"));
        Ok(())
    }
}

fn params(num_scans: u32) -> ExperimentParameters {
    ExperimentParameters {
        experiment_name: "test".into(),
        time_constant_s: 0.1,
        filter_slope: FilterSlope::Db24,
        time_zero_ps: 0.0,
        num_scans,
        legs: vec![LegDescriptor::new(0.0, 2.0, 1.0)],
        error_mode: ErrorMeasurementMode::Never,
        autorange_mode: AutorangeMode::Never,
    }
}

struct Rig {
    log: Log,
    clock: TestClock,
    runner: ScanRunner,
}

fn rig(p: ExperimentParameters, values: Vec<f64>, fail_at_move: Option<usize>) -> Rig {
    let log: Log = Arc::default();
    let clock = TestClock::new();
    let runner = ScanRunner::builder()
        .with_stage(ScriptStage {
            log: log.clone(),
            fail_at_move,
            moves: 0,
        })
        .with_lockin(ScriptLockIn {
            log: log.clone(),
            values,
            reads: 0,
            noise_reads: 0,
        })
        .with_parameters(p)
        .with_clock(Box::new(clock.clone()))
        .build()
        .unwrap();
    Rig { log, clock, runner }
}

#[test]
fn scan_measures_every_position_in_order() {
    let mut r = rig(params(1), vec![1.0, 2.0, 3.0], None);
    let out = r.runner.run_scan(0).unwrap();
    let ScanOutcome::Completed(a) = out else {
        panic!("expected completed scan, got {out:?}");
    };
    assert_eq!(a.positions, vec![0.0, 1.0, 2.0]);
    assert_eq!(a.actual_positions, vec![0.0, 1.0, 2.0]);
    assert_eq!(a.magnitudes, vec![1.0, 2.0, 3.0]);
    assert!(a.errors.is_none());
    // First scan has nothing to average against.
    assert!(a.live_average.is_none());
    assert_eq!(r.runner.state(), ScanState::Completed);

    let log = r.log.lock().unwrap().clone();
    assert_eq!(&log[..2], &["tc 0.1".to_string(), "slope 24".to_string()]);
    let moves: Vec<_> = log.iter().filter(|l| l.starts_with("move")).collect();
    assert_eq!(moves, vec!["move 0", "move 1", "move 2"]);
}

#[test]
fn settle_wait_follows_time_constant_and_slope() {
    let mut r = rig(params(1), vec![1.0], None);
    r.runner.run_scan(0).unwrap();
    let expected = Duration::from_secs_f64(0.1 * 13.06);
    let sleeps = r.clock.sleeps();
    assert_eq!(sleeps.len(), 3);
    assert!(sleeps.iter().all(|&d| d == expected));
}

#[test]
fn session_live_average_uses_completed_scans_and_current_prefix() {
    // Scan 0 reads 4,4,4; scan 1 reads 6,6,6 (values cycle every 3 reads).
    let (tx, rx) = crossbeam_channel::unbounded();
    let clock = TestClock::new();
    let log: Log = Arc::default();
    let mut runner = ScanRunner::builder()
        .with_stage(ScriptStage {
            log: log.clone(),
            fail_at_move: None,
            moves: 0,
        })
        .with_lockin(ScriptLockIn {
            log,
            values: vec![4.0, 4.0, 4.0, 6.0, 6.0, 6.0],
            reads: 0,
            noise_reads: 0,
        })
        .with_parameters(params(2))
        .with_clock(Box::new(clock))
        .with_events(tx)
        .build()
        .unwrap();

    let outcome = runner.run_session().unwrap();
    assert_eq!(outcome, SessionOutcome::Completed { scans: 2 });
    assert_eq!(runner.history().len(), 2);
    assert_eq!(runner.completed_average().unwrap(), &[5.0, 5.0, 5.0]);

    let packets: Vec<_> = rx
        .try_iter()
        .filter_map(|e| match e {
            ScanEvent::Step(p) => Some(p),
            ScanEvent::ScanFinished(_) => None,
        })
        .collect();
    assert_eq!(packets.len(), 6);
    assert!(packets[..3].iter().all(|p| p.live_average.is_none()));
    assert_eq!(packets[3].live_average.as_deref(), Some(&[5.0, 4.0, 4.0][..]));
    assert_eq!(packets[5].live_average.as_deref(), Some(&[5.0, 5.0, 5.0][..]));
    assert_eq!(packets[4].step_index, 1);
    assert_eq!(packets[4].total_steps, 3);
}

#[test]
fn abort_discards_partial_scan_and_keeps_completed_ones() {
    let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let f2 = flag.clone();
    let archive = MemoryArchive::new();
    let log: Log = Arc::default();
    let mut runner = ScanRunner::builder()
        .with_stage(ScriptStage {
            log: log.clone(),
            fail_at_move: None,
            moves: 0,
        })
        .with_lockin(ScriptLockIn {
            log,
            values: vec![1.0],
            reads: 0,
            noise_reads: 0,
        })
        .with_parameters(params(3))
        .with_clock(Box::new(TestClock::new()))
        .with_abort_check(move || f2.load(std::sync::atomic::Ordering::Relaxed))
        .with_archive(archive.clone())
        .build()
        .unwrap();

    runner.prepare().unwrap();
    assert!(matches!(runner.run_scan(0).unwrap(), ScanOutcome::Completed(_)));

    runner.begin(1);
    assert!(matches!(runner.step().unwrap(), StepStatus::Running));
    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    match runner.step().unwrap() {
        StepStatus::Aborted {
            scan_index,
            step_index,
        } => assert_eq!((scan_index, step_index), (1, 1)),
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(runner.state(), ScanState::Aborted);
    assert_eq!(runner.history().len(), 1);
    assert_eq!(archive.scans().len(), 1);

    // Terminal until begin() is called again.
    assert!(runner.step().is_err());
}

#[test]
fn abort_during_session_reports_position_and_finalizes_archive() {
    let archive = MemoryArchive::new();
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let c2 = counter.clone();
    let log: Log = Arc::default();
    let mut runner = ScanRunner::builder()
        .with_stage(ScriptStage {
            log: log.clone(),
            fail_at_move: None,
            moves: 0,
        })
        .with_lockin(ScriptLockIn {
            log,
            values: vec![2.0],
            reads: 0,
            noise_reads: 0,
        })
        .with_parameters(params(5))
        .with_clock(Box::new(TestClock::new()))
        // Abort on the 5th check: scan 0 completes (3 checks), scan 1 stops at step 1.
        .with_abort_check(move || c2.fetch_add(1, std::sync::atomic::Ordering::Relaxed) >= 4)
        .with_archive(archive.clone())
        .build()
        .unwrap();

    let outcome = runner.run_session().unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Aborted {
            completed_scans: 1,
            at_scan: 1,
            at_step: 1
        }
    );
    assert!(archive.finished());
    assert_eq!(archive.final_average(), Some(vec![2.0, 2.0, 2.0]));
}

#[test]
fn device_failure_is_fatal_and_typed() {
    let mut r = rig(params(2), vec![1.0], Some(2));
    let err = r.runner.run_session().unwrap_err();
    match err.downcast_ref::<ScanError>() {
        Some(ScanError::DeviceCommunication(msg)) => assert!(msg.contains("link lost")),
        other => panic!("expected DeviceCommunication, got {other:?}"),
    }
    assert_eq!(r.runner.state(), ScanState::Failed);
    assert!(r.runner.history().is_empty());
}

/// Stage whose driver refuses the `n`-th move as out of travel.
struct RefusingStage {
    refuse_at: usize,
    moves: usize,
}

impl DelayStage for RefusingStage {
    fn move_to(&mut self, delay_ps: f64) -> Result<f64, DeviceError> {
        self.moves += 1;
        if self.moves == self.refuse_at {
            return Err(Box::new(xwaves_hardware::HwError::OutOfTravel {
                requested_ps: delay_ps,
                min_ps: 0.0,
                max_ps: 1.0,
            }));
        }
        Ok(delay_ps)
    }
    fn home(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

#[test]
fn driver_refusal_mid_scan_is_a_device_fault() {
    let log: Log = Arc::default();
    let mut runner = ScanRunner::builder()
        .with_stage(RefusingStage {
            refuse_at: 2,
            moves: 0,
        })
        .with_lockin(ScriptLockIn {
            log,
            values: vec![1.0],
            reads: 0,
            noise_reads: 0,
        })
        .with_parameters(params(1))
        .with_clock(Box::new(TestClock::new()))
        .build()
        .unwrap();

    let err = runner.run_session().unwrap_err();
    assert!(
        matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::DeviceCommunication(_))
        ),
        "got {err:?}"
    );
    assert_eq!(runner.state(), ScanState::Failed);
}

#[rstest]
#[case(ErrorMeasurementMode::Never, 0)]
#[case(ErrorMeasurementMode::Once, 1)]
#[case(ErrorMeasurementMode::EveryPoint, 6)]
fn noise_reads_follow_error_mode(#[case] mode: ErrorMeasurementMode, #[case] expected: usize) {
    let mut p = params(2);
    p.error_mode = mode;
    let mut r = rig(p, vec![1.0], None);
    r.runner.run_session().unwrap();
    let noise = r
        .log
        .lock()
        .unwrap()
        .iter()
        .filter(|l| *l == "noise")
        .count();
    assert_eq!(noise, expected);
}

#[test]
fn once_mode_reuses_the_first_noise_reading() {
    let mut p = params(2);
    p.error_mode = ErrorMeasurementMode::Once;
    let archive = MemoryArchive::new();
    let log: Log = Arc::default();
    let mut runner = ScanRunner::builder()
        .with_stage(ScriptStage {
            log: log.clone(),
            fail_at_move: None,
            moves: 0,
        })
        .with_lockin(ScriptLockIn {
            log,
            values: vec![1.0],
            reads: 0,
            noise_reads: 0,
        })
        .with_parameters(p)
        .with_clock(Box::new(TestClock::new()))
        .with_archive(archive.clone())
        .build()
        .unwrap();
    runner.run_session().unwrap();
    for scan in archive.scans() {
        assert_eq!(scan.errors, Some(vec![1e-6; 3]));
    }
}

#[test]
fn autorange_every_point_ranges_before_each_read() {
    let mut p = params(1);
    p.autorange_mode = AutorangeMode::EveryPoint;
    let mut r = rig(p, vec![1.0], None);
    r.runner.run_session().unwrap();
    let log = r.log.lock().unwrap().clone();
    let ranges = log.iter().filter(|l| *l == "autorange").count();
    assert_eq!(ranges, 3);
    for (i, l) in log.iter().enumerate() {
        if l == "read" {
            assert_eq!(log[i - 1], "sens 0.5");
            assert_eq!(log[i - 2], "autorange");
        }
    }
}

#[test]
fn autorange_once_parks_at_time_zero_during_prepare() {
    let mut p = params(2);
    p.time_zero_ps = 1.5;
    p.autorange_mode = AutorangeMode::OnceAtTimeZero;
    let mut r = rig(p, vec![1.0], None);
    r.runner.run_session().unwrap();
    let log = r.log.lock().unwrap().clone();
    assert_eq!(
        &log[..5],
        &["tc 0.1", "slope 24", "move 1.5", "autorange", "sens 0.5"].map(String::from)
    );
    assert_eq!(log.iter().filter(|l| *l == "autorange").count(), 1);
}

#[test]
fn abort_mid_scan_stops_packets_at_the_aborted_step() {
    let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let f2 = flag.clone();
    let (tx, rx) = crossbeam_channel::unbounded();
    let log: Log = Arc::default();
    let mut runner = ScanRunner::builder()
        .with_stage(ScriptStage {
            log: log.clone(),
            fail_at_move: None,
            moves: 0,
        })
        .with_lockin(ScriptLockIn {
            log,
            values: vec![1.0, 2.0, 3.0],
            reads: 0,
            noise_reads: 0,
        })
        .with_parameters(params(3))
        .with_clock(Box::new(TestClock::new()))
        .with_abort_check(move || f2.load(std::sync::atomic::Ordering::Relaxed))
        .with_events(tx)
        .build()
        .unwrap();

    assert!(matches!(runner.run_scan(0).unwrap(), ScanOutcome::Completed(_)));
    runner.begin(1);
    assert!(matches!(runner.step().unwrap(), StepStatus::Running));
    // Abort signaled while step 0 of scan 1 was in flight.
    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    assert!(matches!(
        runner.step().unwrap(),
        StepStatus::Aborted {
            scan_index: 1,
            step_index: 1
        }
    ));
    assert!(runner.step().is_err());

    let events: Vec<ScanEvent> = rx.try_iter().collect();
    let steps: Vec<(u32, usize)> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Step(p) => Some((p.scan_index, p.step_index)),
            ScanEvent::ScanFinished(_) => None,
        })
        .collect();
    assert_eq!(steps, vec![(0, 0), (0, 1), (0, 2), (1, 0)]);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ScanEvent::ScanFinished(a) if a.scan_index == 1))
    );
    assert_eq!(runner.history().len(), 1);
}

#[test]
fn abort_before_first_step_skips_device_preparation() {
    let log: Log = Arc::default();
    let mut runner = ScanRunner::builder()
        .with_stage(ScriptStage {
            log: log.clone(),
            fail_at_move: None,
            moves: 0,
        })
        .with_lockin(ScriptLockIn {
            log: log.clone(),
            values: vec![1.0],
            reads: 0,
            noise_reads: 0,
        })
        .with_parameters(ExperimentParameters {
            autorange_mode: AutorangeMode::OnceAtTimeZero,
            ..params(2)
        })
        .with_clock(Box::new(TestClock::new()))
        .with_abort_check(|| true)
        .build()
        .unwrap();

    runner.begin(0);
    assert!(matches!(
        runner.step().unwrap(),
        StepStatus::Aborted {
            scan_index: 0,
            step_index: 0
        }
    ));
    assert_eq!(
        runner.run_session().unwrap(),
        SessionOutcome::Aborted {
            completed_scans: 0,
            at_scan: 0,
            at_step: 0
        }
    );
    let log = log.lock().unwrap();
    assert!(log.is_empty(), "device I/O after abort: {log:?}");
}
