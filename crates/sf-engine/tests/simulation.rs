//! End-to-end stepping scenarios.

use std::sync::{Arc, Mutex};

use sf_engine::{Clock, ClockEvent, ClockWorker, ControlState, compile};
use sf_eval::ExprEvaluator;
use sf_input::OverrideStream;
use sf_project::{OverrideDoc, SystemDoc};
use sf_results::{MemorySink, ResultsResult, RowSink};

/// A memory sink the test can still read after the clock takes ownership.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<MemorySink>>);

impl SharedSink {
    fn new() -> Self {
        Self::default()
    }

    fn series(&self, name: &str) -> Vec<f64> {
        self.0.lock().unwrap().series(name).unwrap()
    }

    fn rows(&self) -> usize {
        self.0.lock().unwrap().rows.len()
    }
}

impl RowSink for SharedSink {
    fn write_header(&mut self, names: &[String]) -> ResultsResult<()> {
        self.0.lock().unwrap().write_header(names)
    }

    fn write_row(&mut self, step: u64, values: &[f64]) -> ResultsResult<()> {
        self.0.lock().unwrap().write_row(step, values)
    }
}

fn system(yaml: &str) -> SystemDoc {
    serde_yaml::from_str(yaml).unwrap()
}

fn clock_for(doc: &SystemDoc, sink: SharedSink) -> Clock {
    let compiled = compile(doc, &ExprEvaluator::new()).unwrap();
    Clock::new(compiled, Box::new(ExprEvaluator::new()), Box::new(sink)).unwrap()
}

const TWO_TANKS: &str = r#"
timeSteps: 3
stocks:
  - { id: "1.1", name: a, units: liters, cur_level: 100 }
  - { id: "1.2", name: b, units: liters, cur_level: 0 }
controls:
  - { id: "3.1", name: c, function: "10", type: constant, initialvalue: 10 }
flows:
  - { id: "4.1", name: f, src_id: a, sink_id: b, control_name: c }
"#;

#[test]
fn three_steps_move_thirty_units() {
    let sink = SharedSink::new();
    let clock = clock_for(&system(TWO_TANKS), sink.clone());
    clock.run().unwrap();

    assert_eq!(clock.snapshot().state, ControlState::Completed);
    assert_eq!(clock.snapshot().step, 3);

    clock.inspect(|graph| {
        let a = graph.get(graph.lookup("a").unwrap()).unwrap();
        let b = graph.get(graph.lookup("b").unwrap()).unwrap();
        assert_eq!(a.current, 70.0);
        assert_eq!(b.current, 30.0);
    });

    // Rows capture pre-step values: 100, 90, 80.
    assert_eq!(sink.series("a"), vec![100.0, 90.0, 80.0]);
    assert_eq!(sink.series("b"), vec![0.0, 10.0, 20.0]);
}

#[test]
fn empty_override_stream_changes_nothing() {
    let doc = system(TWO_TANKS);
    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink);
    let empty: OverrideDoc = serde_yaml::from_str("id: \"9.1\"\nname: none\n").unwrap();
    clock.attach_overrides(OverrideStream::from_doc(empty));
    clock.run().unwrap();

    clock.inspect(|graph| {
        assert_eq!(graph.get(graph.lookup("a").unwrap()).unwrap().current, 70.0);
        assert_eq!(graph.get(graph.lookup("b").unwrap()).unwrap().current, 30.0);
    });
}

#[test]
fn valueset_override_rebases_the_trajectory() {
    let doc = system(TWO_TANKS);
    let overrides: OverrideDoc = serde_yaml::from_str(
        r#"
id: "9.1"
name: rebase
timesteps:
  - stepValue: 2
    overrides:
      - { id: "1.1", name: a, type: valueset, value: 50 }
"#,
    )
    .unwrap();

    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink.clone());
    clock.attach_overrides(OverrideStream::from_doc(overrides));
    clock.run().unwrap();

    // Steps 0 and 1 drain 100 -> 90 -> 80; the step-2 override restarts the
    // trajectory from 50 before that step's flow runs.
    clock.inspect(|graph| {
        assert_eq!(graph.get(graph.lookup("a").unwrap()).unwrap().current, 40.0);
        assert_eq!(graph.get(graph.lookup("b").unwrap()).unwrap().current, 30.0);
    });
    assert_eq!(sink.series("a"), vec![100.0, 90.0, 50.0]);
}

#[test]
fn add_and_scale_overrides_use_the_pre_step_value() {
    let doc = system(
        r#"
timeSteps: 2
stocks:
  - { id: "1.1", name: a, units: liters, cur_level: 100 }
"#,
    );
    let overrides: OverrideDoc = serde_yaml::from_str(
        r#"
id: "9.1"
name: nudges
timesteps:
  - stepValue: 0
    overrides:
      - { id: "1.1", name: a, type: valueadd, value: 10 }
  - stepValue: 1
    overrides:
      - { id: "1.1", name: a, type: valuescale, value: 0.5 }
"#,
    )
    .unwrap();

    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink.clone());
    clock.attach_overrides(OverrideStream::from_doc(overrides));
    clock.run().unwrap();

    assert_eq!(sink.series("a"), vec![110.0, 55.0]);
}

#[test]
fn zero_step_run_reproduces_initial_values() {
    let doc = system(
        r#"
timeSteps: 0
stocks:
  - { id: "1.1", name: tub, units: liters, cur_level: 40 }
controls:
  - { id: "3.1", name: half_tub, function: "{tub} / 2", type: function }
"#,
    );
    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink.clone());
    clock.run().unwrap();

    assert_eq!(clock.snapshot().state, ControlState::Completed);
    assert_eq!(sink.rows(), 0);
    clock.inspect(|graph| {
        assert_eq!(graph.get(graph.lookup("tub").unwrap()).unwrap().current, 40.0);
        // Initialized from the formula at load, no initialvalue declared.
        let half = graph.get(graph.lookup("half_tub").unwrap()).unwrap();
        assert_eq!(half.current, 20.0);
        assert_eq!(half.previous, 20.0);
    });
}

#[test]
fn max_rate_caps_the_transfer() {
    let doc = system(
        r#"
timeSteps: 1
stocks:
  - { id: "1.1", name: a, units: liters, cur_level: 100 }
  - { id: "1.2", name: b, units: liters, cur_level: 0 }
controls:
  - { id: "3.1", name: c, function: "9", type: constant, initialvalue: 9 }
flows:
  - { id: "4.1", name: f, max_capacity: 5, src_id: a, sink_id: b, control_name: c }
"#,
    );
    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink);
    clock.run().unwrap();

    clock.inspect(|graph| {
        assert_eq!(graph.get(graph.lookup("f").unwrap()).unwrap().current, 5.0);
        assert_eq!(graph.get(graph.lookup("a").unwrap()).unwrap().current, 95.0);
        assert_eq!(graph.get(graph.lookup("b").unwrap()).unwrap().current, 5.0);
    });
}

#[test]
fn constant_control_never_moves() {
    let sink = SharedSink::new();
    let clock = clock_for(&system(TWO_TANKS), sink.clone());
    clock.run().unwrap();
    assert_eq!(sink.series("c"), vec![10.0, 10.0, 10.0]);
}

#[test]
fn function_control_sees_last_step_values_only() {
    let doc = system(
        r#"
timeSteps: 3
stocks:
  - { id: "1.1", name: r, units: liters, cur_level: 100 }
  - { id: "1.2", name: drainpan, units: liters, cur_level: 0 }
controls:
  - { id: "3.1", name: c, function: "10", type: constant, initialvalue: 10 }
  - { id: "3.2", name: mirror, function: "{r} * 1", type: function }
flows:
  - { id: "4.1", name: f, src_id: r, sink_id: drainpan, control_name: c }
"#,
    );
    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink.clone());
    clock.run().unwrap();

    // mirror computed at step n reflects r as of the end of step n-1, never
    // the value the flow wrote earlier in the same step.
    assert_eq!(sink.series("r"), vec![100.0, 90.0, 80.0]);
    assert_eq!(sink.series("mirror"), vec![100.0, 100.0, 90.0]);
    clock.inspect(|graph| {
        assert_eq!(graph.get(graph.lookup("mirror").unwrap()).unwrap().current, 80.0);
    });
}

const CLAMP_RACE_IN_FIRST: &str = r#"
timeSteps: 1
stocks:
  - { id: "1.1", name: d, units: liters, max_level: 100, cur_level: 95 }
clouds:
  - { id: "0.1", name: upstream, units: liters }
  - { id: "0.2", name: downstream, units: liters }
controls:
  - { id: "3.1", name: ten, function: "10", type: constant, initialvalue: 10 }
  - { id: "3.2", name: five, function: "5", type: constant, initialvalue: 5 }
flows:
  - { id: "4.1", name: fill, src_id: upstream, sink_id: d, control_name: ten }
  - { id: "4.2", name: drain, src_id: d, sink_id: downstream, control_name: five }
"#;

const CLAMP_RACE_OUT_FIRST: &str = r#"
timeSteps: 1
stocks:
  - { id: "1.1", name: d, units: liters, max_level: 100, cur_level: 95 }
clouds:
  - { id: "0.1", name: upstream, units: liters }
  - { id: "0.2", name: downstream, units: liters }
controls:
  - { id: "3.1", name: ten, function: "10", type: constant, initialvalue: 10 }
  - { id: "3.2", name: five, function: "5", type: constant, initialvalue: 5 }
flows:
  - { id: "4.2", name: drain, src_id: d, sink_id: downstream, control_name: five }
  - { id: "4.1", name: fill, src_id: upstream, sink_id: d, control_name: ten }
"#;

/// Regression for the declaration-order sensitivity of capacity clamping:
/// fill-then-drain loses the clamped overflow, drain-then-fill does not.
/// Flows write reservoirs immediately, so this asymmetry is part of the
/// engine's contract.
#[test]
fn clamp_order_sensitivity_is_preserved() {
    let final_d = |yaml: &str| {
        let clock = clock_for(&system(yaml), SharedSink::new());
        clock.run().unwrap();
        clock.inspect(|graph| graph.get(graph.lookup("d").unwrap()).unwrap().current)
    };

    // 95 +10 -> clamp 100, then -5 -> 95.
    assert_eq!(final_d(CLAMP_RACE_IN_FIRST), 95.0);
    // 95 -5 -> 90, then +10 -> 100, no clamp engaged.
    assert_eq!(final_d(CLAMP_RACE_OUT_FIRST), 100.0);
}

#[test]
fn source_sink_stays_infinite_through_flows_and_overrides() {
    let doc = system(
        r#"
timeSteps: 2
stocks:
  - { id: "1.1", name: tub, units: liters, cur_level: 0 }
clouds:
  - { id: "0.1", name: mains, units: liters }
controls:
  - { id: "3.1", name: c, function: "7", type: constant, initialvalue: 7 }
flows:
  - { id: "4.1", name: tap, src_id: mains, sink_id: tub, control_name: c }
"#,
    );
    let overrides: OverrideDoc = serde_yaml::from_str(
        r#"
id: "9.1"
name: meddle
timesteps:
  - stepValue: 1
    overrides:
      - { id: "0.1", name: mains, type: valueset, value: 3 }
"#,
    )
    .unwrap();

    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink);
    clock.attach_overrides(OverrideStream::from_doc(overrides));
    clock.run().unwrap();

    clock.inspect(|graph| {
        let mains = graph.get(graph.lookup("mains").unwrap()).unwrap();
        assert!(mains.current.is_infinite());
        assert!(mains.previous.is_infinite());
        assert_eq!(graph.get(graph.lookup("tub").unwrap()).unwrap().current, 14.0);
    });
}

#[test]
fn unknown_override_target_is_skipped() {
    let doc = system(TWO_TANKS);
    let overrides: OverrideDoc = serde_yaml::from_str(
        r#"
id: "9.1"
name: typo
timesteps:
  - stepValue: 0
    overrides:
      - { id: "1.9", name: bathtub, type: valueset, value: 0 }
"#,
    )
    .unwrap();

    let clock = clock_for(&doc, SharedSink::new());
    clock.attach_overrides(OverrideStream::from_doc(overrides));
    clock.run().unwrap();
    clock.inspect(|graph| {
        assert_eq!(graph.get(graph.lookup("a").unwrap()).unwrap().current, 70.0);
    });
}

#[test]
fn pause_then_manual_steps_then_completion() {
    let doc = system(TWO_TANKS);
    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink.clone());
    let events = clock.subscribe();

    // Arm for stepping without entering the run loop.
    clock.pause();
    assert_eq!(clock.snapshot().state, ControlState::Paused);

    clock.step().unwrap();
    assert_eq!(clock.snapshot().step, 1);
    assert_eq!(clock.snapshot().state, ControlState::Paused);

    clock.step().unwrap();
    clock.step().unwrap();
    assert_eq!(clock.snapshot().state, ControlState::Completed);

    // Completed is terminal: no further stepping.
    assert!(clock.step().is_err());
    assert_eq!(sink.rows(), 3);

    let received: Vec<ClockEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            ClockEvent::StepCompleted { step: 0 },
            ClockEvent::StepCompleted { step: 1 },
            ClockEvent::StepCompleted { step: 2 },
            ClockEvent::RunCompleted { steps: 3 },
        ]
    );
}

#[test]
fn step_requires_a_paused_clock() {
    let clock = clock_for(&system(TWO_TANKS), SharedSink::new());
    assert!(clock.step().is_err());
}

#[test]
fn run_resumes_after_pause() {
    let doc = system(TWO_TANKS);
    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink.clone());

    clock.pause();
    clock.step().unwrap();
    clock.run().unwrap();

    assert_eq!(clock.snapshot().state, ControlState::Completed);
    assert_eq!(sink.rows(), 3);
}

#[test]
fn worker_runs_to_completion() {
    let doc = system(TWO_TANKS);
    let sink = SharedSink::new();
    let clock = Arc::new(clock_for(&doc, sink.clone()));
    let events = clock.subscribe();

    let worker = ClockWorker::start(Arc::clone(&clock));
    worker.join().unwrap();

    assert_eq!(clock.snapshot().state, ControlState::Completed);
    assert_eq!(sink.rows(), 3);
    assert!(
        events
            .try_iter()
            .any(|event| event == ClockEvent::RunCompleted { steps: 3 })
    );
}

#[test]
fn recursive_control_compounds_from_its_initial_value() {
    let doc = system(
        r#"
timeSteps: 3
stocks:
  - { id: "1.1", name: pool, units: units, cur_level: 0 }
clouds:
  - { id: "0.1", name: world, units: units }
controls:
  - id: "3.1"
    name: growth
    function: "{growth} * 2"
    type: recursive
    initialvalue: 1
flows:
  - { id: "4.1", name: inflow, src_id: world, sink_id: pool, control_name: growth }
"#,
    );
    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink.clone());
    clock.run().unwrap();

    // growth doubles each step: 1, 2, 4; the flow lags one step behind it.
    assert_eq!(sink.series("growth"), vec![1.0, 2.0, 4.0]);
    clock.inspect(|graph| {
        assert_eq!(graph.get(graph.lookup("pool").unwrap()).unwrap().current, 7.0);
    });
}

#[test]
fn conditional_control_switches_branches_mid_run() {
    // The drain stays open (rate 8) until the tub falls below 30, then shuts.
    let doc = system(
        r#"
timeSteps: 5
stocks:
  - { id: "1.1", name: tub, units: liters, cur_level: 40 }
  - { id: "1.2", name: floor, units: liters, cur_level: 0 }
controls:
  - { id: "3.1", name: threshold, function: "30", type: constant, initialvalue: 30 }
  - id: "3.2"
    name: drain_valve
    function: "{tub}, >, {threshold}, 8, 0"
    type: conditional
flows:
  - { id: "4.1", name: drain, src_id: tub, sink_id: floor, control_name: drain_valve }
"#,
    );
    let sink = SharedSink::new();
    let clock = clock_for(&doc, sink.clone());
    clock.run().unwrap();

    // tub: 40 -> 32 -> 24 -> 16; the valve closes when it reads 24, but the
    // drain acts on the valve's previous value, so it lags one more step.
    assert_eq!(sink.series("tub"), vec![40.0, 32.0, 24.0, 16.0, 16.0]);
    assert_eq!(sink.series("drain_valve"), vec![8.0, 8.0, 8.0, 0.0, 0.0]);
    clock.inspect(|graph| {
        assert_eq!(graph.get(graph.lookup("tub").unwrap()).unwrap().current, 16.0);
    });
}
