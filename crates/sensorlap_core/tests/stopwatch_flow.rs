use sensorlap_core::{
    decibel_level, format_elapsed, LapButtonOutcome, StopwatchError, StopwatchPhase, Stopwatch,
};

#[test]
fn formatter_switches_at_one_hour() {
    assert_eq!(format_elapsed(65_432), "01:05:43");
    assert_eq!(format_elapsed(3_599_990), "59:59:99");
    assert_eq!(format_elapsed(3_600_000), "01:00:00");
    assert_eq!(format_elapsed(7_384_000), "02:03:04");
}

#[test]
fn laps_are_listed_newest_first() {
    let mut watch = Stopwatch::new();
    watch.start(0).expect("start");
    watch.lap(1_000).expect("lap 1");
    watch.lap(2_500).expect("lap 2");
    watch.lap(4_020).expect("lap 3");

    let labels = watch.laps().iter().map(|lap| lap.label()).collect::<Vec<_>>();
    assert_eq!(
        labels,
        vec!["Lap 3: 00:04:02", "Lap 2: 00:02:50", "Lap 1: 00:01:00"]
    );
    assert_eq!(watch.next_lap_index(), 4);
}

#[test]
fn reset_clears_laps_and_restarts_numbering() {
    let mut watch = Stopwatch::new();
    watch.start(0).expect("start");
    watch.lap(500).expect("lap");
    watch.lap(900).expect("lap");
    watch.stop(1_000).expect("stop");
    watch.reset().expect("reset");

    assert!(watch.laps().is_empty());
    assert_eq!(watch.next_lap_index(), 1);
    assert_eq!(watch.display_text(5_000), "00:00:00");

    watch.start(10_000).expect("start again");
    let lap = watch.lap(10_250).expect("lap after reset");
    assert_eq!(lap.index, 1);
    assert_eq!(lap.elapsed_ms, 250);
}

#[test]
fn lap_button_laps_while_running_and_resets_while_stopped() {
    let mut watch = Stopwatch::new();
    watch.start(0).expect("start");
    match watch.press_lap_or_reset(1_230) {
        LapButtonOutcome::Lapped(lap) => assert_eq!(lap.formatted_duration, "00:01:23"),
        LapButtonOutcome::Reset => panic!("running stopwatch must lap"),
    }

    watch.stop(2_000).expect("stop");
    assert_eq!(watch.press_lap_or_reset(2_100), LapButtonOutcome::Reset);
    assert!(watch.laps().is_empty());
    assert_eq!(watch.phase(), StopwatchPhase::Idle);
}

#[test]
fn explicit_controls_are_gated_by_phase() {
    let mut watch = Stopwatch::new();
    assert_eq!(watch.lap(0), Err(StopwatchError::NotRunning));
    watch.start(0).expect("start");
    assert_eq!(watch.reset(), Err(StopwatchError::ResetWhileRunning));
}

#[test]
fn pause_and_resume_keeps_elapsed() {
    let mut watch = Stopwatch::new();
    watch.start(1_000).expect("start");
    watch.stop(2_000).expect("stop");
    watch.start(60_000).expect("resume");
    assert_eq!(watch.elapsed_ms(60_500), 1_500);
    assert_eq!(watch.display_text(60_500), "00:01:50");
}

#[test]
fn decibel_scale_is_relative_to_floor() {
    assert_eq!(decibel_level(0.02, 0.02), 0.0);
    assert!((decibel_level(0.2, 0.02) - 20.0).abs() < 1e-9);
    assert_eq!(decibel_level(0.0, 0.02), 0.0);
}
