//! End-to-end runs through the [`Kernel`]: clocked processes, delayed cells,
//! enum and opaque signals, and configuration-driven waveform tracing.

use std::cell::{Cell, RefCell};
use std::fs;
use std::rc::Rc;

use tempfile::TempDir;
use weft_config::{load_config_from_str, ConfigError, SimulationConfig};
use weft_signal::{
    Edge, Encoding, EnumType, IntBv, Kernel, ProcessId, ProcessStatus, SignalError, SignalId,
    SimContext, SimError, Value,
};

type Step = Result<ProcessStatus, SimError>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Adds a process toggling `clk` every `half_period` ticks.
fn add_clock(kernel: &mut Kernel, clk: SignalId, half_period: u64) -> ProcessId {
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        let level = ctx.current(clk).is_truthy();
        ctx.set_pending(clk, !level)?;
        ctx.wake_after(half_period, me);
        Ok(ProcessStatus::Waiting)
    })
}

/// Adds a process incrementing `count` on every rising edge of `clk`.
fn add_counter(kernel: &mut Kernel, clk: SignalId, count: SignalId) -> ProcessId {
    let mut armed = false;
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        if armed {
            let n = ctx.current(count).as_int().unwrap_or(0);
            ctx.set_pending(count, (n + 1) % 256)?;
        }
        armed = true;
        ctx.wait_on(clk, Edge::Rising, me)?;
        Ok(ProcessStatus::Waiting)
    })
}

fn counter_design(ctx: &mut SimContext) -> (SignalId, SignalId) {
    let clk = ctx.signal(false).unwrap();
    let count = ctx.signal(IntBv::unsigned(0, 8).unwrap()).unwrap();
    ctx.set_name(clk, "clk").unwrap();
    ctx.set_name(count, "count").unwrap();
    (clk, count)
}

// ---------------------------------------------------------------------------
// Clocked logic
// ---------------------------------------------------------------------------

#[test]
fn counter_counts_rising_edges() {
    let mut ctx = SimContext::new();
    let (clk, count) = counter_design(&mut ctx);
    let mut kernel = Kernel::new(ctx);
    add_clock(&mut kernel, clk, 5);
    add_counter(&mut kernel, clk, count);

    let result = kernel.run_for(50).unwrap();
    assert_eq!(result.final_time.time, 50);
    assert_eq!(kernel.context().current(count).as_int(), Some(6));
    assert_eq!(result.warnings, 0);
    assert_eq!(kernel.process_count(), 2);
}

#[test]
fn sliced_counter_bit_toggles_at_half_rate() {
    let mut ctx = SimContext::new();
    let (clk, count) = counter_design(&mut ctx);
    let lsb = ctx.index(count, 0).unwrap();
    let edges = Rc::new(Cell::new(0u32));
    let mut kernel = Kernel::new(ctx);
    add_clock(&mut kernel, clk, 5);
    add_counter(&mut kernel, clk, count);

    let seen = Rc::clone(&edges);
    let mut armed = false;
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        if armed {
            seen.set(seen.get() + 1);
        }
        armed = true;
        ctx.wait_on(lsb, Edge::Rising, me)?;
        Ok(ProcessStatus::Waiting)
    });

    kernel.run_for(75).unwrap();
    // 8 rising clock edges: count goes 1..=8, bit 0 rises at 1, 3, 5, 7.
    assert_eq!(kernel.context().current(count).as_int(), Some(8));
    assert_eq!(edges.get(), 4);
}

#[test]
fn assign_follows_source_one_delta_later() {
    let mut ctx = SimContext::new();
    let (clk, count) = counter_design(&mut ctx);
    let shadow = ctx.copy_signal(count).unwrap();
    ctx.assign(shadow, count).unwrap();
    let mut kernel = Kernel::new(ctx);
    add_clock(&mut kernel, clk, 5);
    add_counter(&mut kernel, clk, count);

    kernel.run_for(20).unwrap();
    assert_eq!(kernel.context().current(shadow).as_int(), Some(3));
    assert!(kernel.context().get(count).is_read());
}

// ---------------------------------------------------------------------------
// Delayed cells
// ---------------------------------------------------------------------------

#[test]
fn delayed_cell_wakes_waiters_after_delay() {
    let mut ctx = SimContext::new();
    let d = ctx.delayed_signal(IntBv::unsigned(0, 8).unwrap(), 10).unwrap();
    let mut kernel = Kernel::new(ctx);
    let woke_at = Rc::new(Cell::new(None));

    kernel.add_process(move |ctx: &mut SimContext, _me: ProcessId| -> Step {
        ctx.set_pending(d, 5)?;
        Ok(ProcessStatus::Done)
    });
    let seen = Rc::clone(&woke_at);
    let mut armed = false;
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        if armed {
            seen.set(Some(ctx.now().time));
            return Ok(ProcessStatus::Done);
        }
        armed = true;
        ctx.wait_on(d, Edge::Any, me)?;
        Ok(ProcessStatus::Waiting)
    });

    let result = kernel.run().unwrap();
    assert_eq!(woke_at.get(), Some(10));
    assert_eq!(kernel.context().current(d).as_int(), Some(5));
    assert_eq!(result.final_time.time, 10);
}

#[test]
fn short_pulse_is_swallowed_by_delay() {
    let mut ctx = SimContext::new();
    let d = ctx.delayed_signal(false, 10).unwrap();
    let mut kernel = Kernel::new(ctx);
    let changes = Rc::new(Cell::new(0u32));

    let mut phase = 0;
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        phase += 1;
        match phase {
            1 => {
                ctx.set_pending(d, true)?;
                ctx.wake_after(3, me);
                Ok(ProcessStatus::Waiting)
            }
            _ => {
                ctx.set_pending(d, false)?;
                Ok(ProcessStatus::Done)
            }
        }
    });
    let seen = Rc::clone(&changes);
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        if ctx.now().time > 0 {
            seen.set(seen.get() + 1);
        }
        ctx.wait_on(d, Edge::Any, me)?;
        Ok(ProcessStatus::Waiting)
    });

    kernel.run().unwrap();
    assert_eq!(changes.get(), 0);
    assert_eq!(kernel.context().current(d), &Value::Bool(false));
}

// ---------------------------------------------------------------------------
// Enum and opaque signals
// ---------------------------------------------------------------------------

#[test]
fn enum_state_machine() {
    let states = EnumType::new("phase", &["idle", "busy", "done"], Encoding::OneHot).unwrap();
    let mut ctx = SimContext::new();
    let clk = ctx.signal(false).unwrap();
    let state = ctx.signal(states.item_at(0)).unwrap();
    let mut kernel = Kernel::new(ctx);
    add_clock(&mut kernel, clk, 5);

    let ty = states.clone();
    let mut armed = false;
    let fsm = kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        if armed {
            let current = ctx.current(state).as_enum().map(|i| i.index()).unwrap_or(0);
            if current + 1 == ty.len() {
                return Ok(ProcessStatus::Done);
            }
            ctx.set_pending(state, ty.item_at(current + 1))?;
        }
        armed = true;
        ctx.wait_on(clk, Edge::Rising, me)?;
        Ok(ProcessStatus::Waiting)
    });

    kernel.run_for(100).unwrap();
    assert!(kernel.is_done(fsm));
    assert_eq!(kernel.context().current(state).as_enum(), states.item("done").as_ref());
}

#[test]
fn enum_cells_accept_codes_and_reject_foreign_items() {
    let states = EnumType::new("phase", &["idle", "busy", "done"], Encoding::OneHot).unwrap();
    let other = EnumType::new("phase", &["idle", "busy", "done"], Encoding::OneHot).unwrap();
    let mut ctx = SimContext::new();
    let state = ctx.signal(states.item_at(0)).unwrap();

    ctx.set_pending(state, 0b100).unwrap();
    assert_eq!(ctx.pending(state).as_enum(), states.item("done").as_ref());
    assert!(ctx.set_pending(state, 0b011).is_err());
    assert!(matches!(
        ctx.set_pending(state, other.item_at(1)),
        Err(SignalError::TypeCoercion { .. })
    ));
}

#[derive(Clone, Debug, PartialEq)]
struct Packet {
    id: u32,
    payload: Vec<u8>,
}

#[test]
fn opaque_values_propagate_by_equality() {
    let mut ctx = SimContext::new();
    let first = Packet {
        id: 1,
        payload: vec![0xde, 0xad],
    };
    let link = ctx.signal(Value::opaque(first.clone())).unwrap();
    let received: Rc<RefCell<Vec<u32>>> = Rc::default();
    let mut kernel = Kernel::new(ctx);

    let mut step = 0;
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        step += 1;
        let id = match step {
            1 => 1,
            2 => 2,
            _ => return Ok(ProcessStatus::Done),
        };
        let packet = Packet {
            id,
            payload: vec![0xde, 0xad],
        };
        ctx.set_pending(link, Value::opaque(packet))?;
        ctx.wake_after(10, me);
        Ok(ProcessStatus::Waiting)
    });
    let log = Rc::clone(&received);
    let mut armed = false;
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        if armed {
            if let Some(p) = ctx.current(link).downcast_ref::<Packet>() {
                log.borrow_mut().push(p.id);
            }
        }
        armed = true;
        ctx.wait_on(link, Edge::Any, me)?;
        Ok(ProcessStatus::Waiting)
    });

    kernel.run().unwrap();
    assert_eq!(*received.borrow(), vec![2]);

    let mut ctx = kernel.into_context();
    assert!(matches!(
        ctx.set_pending(link, Value::opaque(7u64)),
        Err(SignalError::TypeCoercion { .. })
    ));
    ctx.reset().unwrap();
    assert_eq!(ctx.current(link).downcast_ref::<Packet>(), Some(&first));
}

// ---------------------------------------------------------------------------
// Configuration and tracing
// ---------------------------------------------------------------------------

#[test]
fn config_enables_vcd_trace() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wave.vcd");
    let toml = format!(
        "[simulation]\ntime_limit = 20\n\n[trace]\nenabled = true\npath = \"{}\"\ntimescale = \"10ns\"\n",
        path.display()
    );
    let config = load_config_from_str(&toml).unwrap();

    let mut ctx = SimContext::new();
    let (clk, count) = counter_design(&mut ctx);
    let mut kernel = Kernel::from_config(ctx, &config).unwrap();
    kernel.context_mut().trace(clk).unwrap();
    kernel.context_mut().trace(count).unwrap();
    add_clock(&mut kernel, clk, 5);
    add_counter(&mut kernel, clk, count);

    let result = kernel.run().unwrap();
    assert_eq!(result.final_time.time, 20);

    let vcd = fs::read_to_string(&path).unwrap();
    assert!(vcd.contains("$timescale\n  10ns\n$end"));
    assert!(vcd.contains("$scope module top $end"));
    assert!(vcd.contains("$var wire 1 ! clk $end"));
    assert!(vcd.contains("$var wire 8 \" count $end"));
    assert!(vcd.contains("$upscope $end\n$enddefinitions $end\n#0\n0!\nb00000000 \""));
    assert!(vcd.contains("#10\n1!\nb00000010 \""));
    assert!(vcd.contains("#15\n0!"));
}

#[test]
fn project_dir_config_sets_delta_limit() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("weft.toml"),
        "[simulation]\nmax_deltas_per_step = 20\n",
    )
    .unwrap();

    let mut ctx = SimContext::new();
    let s = ctx.signal(false).unwrap();
    let mut kernel = Kernel::from_project_dir(ctx, dir.path()).unwrap();
    kernel.add_process(move |ctx: &mut SimContext, me: ProcessId| -> Step {
        let v = ctx.current(s).is_truthy();
        ctx.set_pending(s, !v)?;
        ctx.wait_on(s, Edge::Any, me)?;
        Ok(ProcessStatus::Waiting)
    });

    assert!(matches!(
        kernel.run(),
        Err(SimError::DeltaCycleLimit {
            time: 0,
            max_deltas: 20
        })
    ));
}

#[test]
fn missing_project_config_is_reported() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Kernel::from_project_dir(SimContext::new(), dir.path()),
        Err(SimError::Config(ConfigError::IoError(_)))
    ));
}

#[test]
fn tracing_requires_a_path() {
    let mut config = SimulationConfig::default();
    config.trace.enabled = true;
    assert!(matches!(
        Kernel::from_config(SimContext::new(), &config),
        Err(SimError::Config(ConfigError::MissingField(_)))
    ));
}
