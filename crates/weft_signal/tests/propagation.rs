//! Integration tests for the delta-cycle contract of value cells, derived
//! signals, and tristate buses, driven by hand through the context API.

use weft_common::ArenaId;
use weft_diagnostics::codes;
use weft_signal::{
    Derivation, Drive, Edge, IntBv, ProcessId, SignalError, SignalId, SimContext, Value, Waiter,
};

/// Commits and wakes until quiescent; returns the number of delta cycles.
fn settle(ctx: &mut SimContext) -> usize {
    let mut deltas = 0;
    while ctx.has_changes() {
        let fired = ctx.commit_changed().unwrap();
        ctx.wake(fired).unwrap();
        deltas += 1;
    }
    deltas
}

#[test]
fn chained_derivations_settle_in_one_delta_each() {
    let mut ctx = SimContext::new();
    let src = byte(&mut ctx, 0);
    let alias = ctx.clone_signal(src).unwrap();
    let top = ctx.slice(alias, 8, 4).unwrap();
    ctx.set_pending(src, 0x70).unwrap();
    assert_eq!(settle(&mut ctx), 3);
    assert_eq!(ctx.current(top).as_int(), Some(7));
    assert_eq!(ctx.now().delta, 3);
}

fn process(n: u32) -> ProcessId {
    ProcessId::from_raw(n)
}

fn byte(ctx: &mut SimContext, v: i128) -> SignalId {
    ctx.signal(IntBv::unsigned(v, 8).unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// Idempotence and edges
// ---------------------------------------------------------------------------

#[test]
fn update_without_change_returns_nothing() {
    let mut ctx = SimContext::new();
    let s = byte(&mut ctx, 9);
    ctx.wait_on(s, Edge::Any, process(0)).unwrap();
    ctx.set_pending(s, 9).unwrap();

    assert!(ctx.update(s).unwrap().is_empty());
    assert_eq!(ctx.current(s).as_int(), Some(9));
    assert_eq!(ctx.pending(s).as_int(), Some(9));
    assert_eq!(ctx.get(s).waiters().on_change(), &[Waiter::Process(process(0))]);
}

#[test]
fn rising_edge_fires_change_and_rising_only() {
    let mut ctx = SimContext::new();
    let clk = ctx.signal(false).unwrap();
    ctx.wait_on(clk, Edge::Any, process(0)).unwrap();
    ctx.wait_on(clk, Edge::Rising, process(1)).unwrap();
    ctx.wait_on(clk, Edge::Falling, process(2)).unwrap();

    ctx.set_pending(clk, true).unwrap();
    let fired = ctx.update(clk).unwrap();
    assert_eq!(
        fired,
        vec![Waiter::Process(process(0)), Waiter::Process(process(1))]
    );
    assert!(ctx.get(clk).waiters().on_change().is_empty());
    assert!(ctx.get(clk).waiters().on_rising().is_empty());
    assert_eq!(ctx.get(clk).waiters().on_falling(), &[Waiter::Process(process(2))]);
}

#[test]
fn falling_edge_fires_change_and_falling_only() {
    let mut ctx = SimContext::new();
    let clk = ctx.signal(true).unwrap();
    ctx.wait_on(clk, Edge::Any, process(0)).unwrap();
    ctx.wait_on(clk, Edge::Rising, process(1)).unwrap();
    ctx.wait_on(clk, Edge::Falling, process(2)).unwrap();

    ctx.set_pending(clk, false).unwrap();
    let fired = ctx.update(clk).unwrap();
    assert_eq!(
        fired,
        vec![Waiter::Process(process(0)), Waiter::Process(process(2))]
    );
    assert_eq!(ctx.get(clk).waiters().on_rising(), &[Waiter::Process(process(1))]);
}

#[test]
fn edge_waiters_are_one_shot() {
    let mut ctx = SimContext::new();
    let clk = ctx.signal(false).unwrap();
    ctx.wait_on(clk, Edge::Rising, process(0)).unwrap();
    ctx.set_pending(clk, true).unwrap();
    assert_eq!(ctx.commit_changed().unwrap().len(), 1);
    ctx.set_pending(clk, false).unwrap();
    ctx.commit_changed().unwrap();
    ctx.set_pending(clk, true).unwrap();
    assert!(ctx.commit_changed().unwrap().is_empty());
}

#[test]
fn vector_edges_follow_truthiness() {
    let mut ctx = SimContext::new();
    let v = byte(&mut ctx, 0);
    ctx.wait_on(v, Edge::Rising, process(0)).unwrap();
    ctx.set_pending(v, 3).unwrap();
    assert_eq!(ctx.commit_changed().unwrap(), vec![Waiter::Process(process(0))]);

    ctx.wait_on(v, Edge::Rising, process(0)).unwrap();
    ctx.set_pending(v, 5).unwrap();
    assert!(ctx.commit_changed().unwrap().is_empty());
}

#[test]
fn same_process_waiting_twice_is_woken_once() {
    let mut ctx = SimContext::new();
    let a = ctx.signal(false).unwrap();
    let b = ctx.signal(false).unwrap();
    ctx.wait_on(a, Edge::Any, process(0)).unwrap();
    ctx.wait_on(b, Edge::Any, process(0)).unwrap();
    ctx.set_pending(a, true).unwrap();
    ctx.set_pending(b, true).unwrap();
    let fired = ctx.commit_changed().unwrap();
    assert_eq!(ctx.wake(fired).unwrap(), vec![process(0)]);
}

// ---------------------------------------------------------------------------
// Bounds and coercion
// ---------------------------------------------------------------------------

#[test]
fn out_of_bounds_leaves_cell_untouched() {
    let mut ctx = SimContext::new();
    let s = byte(&mut ctx, 17);
    ctx.set_name(s, "count").unwrap();
    let err = ctx.set_pending(s, 256).unwrap_err();
    assert!(matches!(err, SignalError::TypeCoercion { ref signal, .. } if signal == "count"));
    assert!(ctx.set_pending(s, -1).is_err());
    assert_eq!(ctx.pending(s).as_int(), Some(17));
    assert_eq!(ctx.current(s).as_int(), Some(17));
    assert!(!ctx.has_changes());
}

#[test]
fn signed_bounds() {
    let mut ctx = SimContext::new();
    let s = ctx.signal(IntBv::signed(0, 4).unwrap()).unwrap();
    ctx.set_pending(s, -8).unwrap();
    assert!(ctx.set_pending(s, 8).is_err());
    assert!(ctx.set_pending(s, -9).is_err());
    settle(&mut ctx);
    assert_eq!(ctx.current(s).as_int(), Some(-8));
}

#[test]
fn boolean_rejects_wide_values() {
    let mut ctx = SimContext::new();
    let flag = ctx.signal(false).unwrap();
    assert!(ctx.set_pending(flag, 2).is_err());
    let wide = byte(&mut ctx, 200);
    assert!(ctx.set_pending(flag, wide).is_err());
    let narrow = byte(&mut ctx, 1);
    ctx.set_pending(flag, narrow).unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(flag), &Value::Bool(true));
}

#[test]
fn vector_accepts_binary_and_packed_fields() {
    let mut ctx = SimContext::new();
    let s = byte(&mut ctx, 0);
    ctx.set_pending(s, "1111_0000").unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(s).as_int(), Some(0xF0));

    let flag = ctx.signal(true).unwrap();
    ctx.set_pending(
        s,
        Drive::Concat(vec![flag.into(), "0000".into(), IntBv::unsigned(5, 3).unwrap().into()]),
    )
    .unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(s).as_int(), Some(0b1000_0101));
}

// ---------------------------------------------------------------------------
// Derived signals
// ---------------------------------------------------------------------------

#[test]
fn slice_fidelity() {
    let mut ctx = SimContext::new();
    let src = byte(&mut ctx, 0);
    let hi = ctx.slice(src, 8, 4).unwrap();
    assert_eq!(ctx.current(hi).as_int(), Some(0));

    ctx.set_pending(src, 0xA5).unwrap();
    let fired = ctx.update(src).unwrap();
    ctx.wake(fired).unwrap();
    ctx.update(hi).unwrap();
    assert_eq!(ctx.current(hi).as_int(), Some(0xA));
}

#[test]
fn concatenation_fidelity() {
    let mut ctx = SimContext::new();
    let a = ctx.signal(true).unwrap();
    let b = ctx.signal(IntBv::unsigned(5, 3).unwrap()).unwrap();
    let c = ctx.concat(vec![a.into(), b.into()]).unwrap();
    assert_eq!(ctx.current(c).as_int(), Some(0b1101));
    assert_eq!(ctx.get(c).bit_width(), 4);
}

#[test]
fn clone_round_trip_one_delta_later() {
    let mut ctx = SimContext::new();
    let src = byte(&mut ctx, 12);
    let alias = ctx.clone_signal(src).unwrap();
    assert_eq!(ctx.current(alias).as_int(), Some(12));

    ctx.set_pending(src, 99).unwrap();
    let fired = ctx.commit_changed().unwrap();
    ctx.wake(fired).unwrap();
    assert_eq!(ctx.current(alias).as_int(), Some(12));
    ctx.commit_changed().unwrap();
    assert_eq!(ctx.current(alias).as_int(), Some(99));
}

#[test]
fn derived_signals_reject_writes() {
    let mut ctx = SimContext::new();
    let src = byte(&mut ctx, 0);
    let derived = [
        ctx.slice(src, 4, 0).unwrap(),
        ctx.index(src, 7).unwrap(),
        ctx.clone_signal(src).unwrap(),
        ctx.reverse(src).unwrap(),
        ctx.concat(vec![src.into()]).unwrap(),
    ];
    for id in derived {
        assert!(matches!(
            ctx.set_pending(id, 0),
            Err(SignalError::ReadOnlyAssignment { .. })
        ));
    }
}

#[test]
fn derived_waiters_see_their_own_change() {
    let mut ctx = SimContext::new();
    let src = byte(&mut ctx, 0);
    let top = ctx.index(src, 7).unwrap();
    ctx.wait_on(top, Edge::Rising, process(4)).unwrap();

    ctx.set_pending(src, 0x80).unwrap();
    let fired = ctx.commit_changed().unwrap();
    assert!(ctx.wake(fired).unwrap().is_empty());
    let fired = ctx.commit_changed().unwrap();
    assert_eq!(ctx.wake(fired).unwrap(), vec![process(4)]);
}

#[test]
fn derivation_metadata_for_backends() {
    let mut ctx = SimContext::new();
    let src = byte(&mut ctx, 0);
    let hi = ctx.slice_signed(src, 8, 4).unwrap();
    assert_eq!(
        ctx.derivation(hi),
        Some(&Derivation::Slice {
            source: src,
            high: 8,
            low: 4,
            signed: true
        })
    );
}

// ---------------------------------------------------------------------------
// Tristate buses
// ---------------------------------------------------------------------------

#[test]
fn bus_arbitration() {
    let mut ctx = SimContext::new();
    let bus = ctx.tristate(IntBv::unsigned(0, 8).unwrap()).unwrap();
    let a = ctx.driver(bus).unwrap();
    let b = ctx.driver(bus).unwrap();

    settle(&mut ctx);
    assert!(ctx.current(bus).is_undriven());

    ctx.set_pending(a, 7).unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(bus).as_int(), Some(7));
    assert_eq!(ctx.diagnostics().warning_count(), 0);

    ctx.set_pending(b, 3).unwrap();
    settle(&mut ctx);
    assert!(ctx.current(bus).is_undriven());
    assert_eq!(ctx.diagnostics().count_code(codes::BUS_CONTENTION), 1);

    ctx.release(a).unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(bus).as_int(), Some(3));
    assert_eq!(ctx.diagnostics().count_code(codes::BUS_CONTENTION), 1);
}

#[test]
fn simultaneous_drive_warns_exactly_once() {
    let mut ctx = SimContext::new();
    let bus = ctx.tristate(IntBv::unsigned(0, 8).unwrap()).unwrap();
    let a = ctx.driver(bus).unwrap();
    let b = ctx.driver(bus).unwrap();
    ctx.set_pending(a, 7).unwrap();
    ctx.set_pending(b, 3).unwrap();
    settle(&mut ctx);
    assert!(ctx.current(bus).is_undriven());
    assert_eq!(ctx.diagnostics().count_code(codes::BUS_CONTENTION), 1);
}

#[test]
fn bus_value_feeds_derived_signal() {
    let mut ctx = SimContext::new();
    let bus = ctx.tristate(IntBv::unsigned(0, 8).unwrap()).unwrap();
    let low = ctx.slice(bus, 4, 0).unwrap();
    assert!(ctx.current(low).is_undriven());
    let d = ctx.driver(bus).unwrap();
    ctx.set_pending(d, 0x3C).unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(low).as_int(), Some(0xC));
}

// ---------------------------------------------------------------------------
// Restart and observer failures
// ---------------------------------------------------------------------------

#[test]
fn derived_cells_follow_sources_through_reset() {
    let mut ctx = SimContext::new();
    let src = byte(&mut ctx, 0);
    ctx.set_pending(src, 0xA5).unwrap();
    settle(&mut ctx);
    let hi = ctx.slice(src, 8, 4).unwrap();
    let alias = ctx.clone_signal(src).unwrap();
    let top = ctx.index(alias, 7).unwrap();
    assert_eq!(ctx.current(hi).as_int(), Some(0xA));

    ctx.reset().unwrap();
    assert_eq!(ctx.current(src).as_int(), Some(0));
    assert_eq!(ctx.current(hi).as_int(), Some(0));
    assert_eq!(ctx.pending(hi).as_int(), Some(0));
    assert_eq!(ctx.current(alias).as_int(), Some(0));
    assert_eq!(ctx.current(top), &Value::Bool(false));
    assert!(!ctx.has_changes());

    ctx.set_pending(src, 0x3C).unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(hi).as_int(), Some(0x3));
    assert_eq!(ctx.current(alias).as_int(), Some(0x3C));
}

#[test]
fn assignment_is_redriven_after_reset() {
    let mut ctx = SimContext::new();
    let src = byte(&mut ctx, 0);
    let dst = byte(&mut ctx, 4);
    ctx.assign(dst, src).unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(dst).as_int(), Some(0));

    ctx.set_pending(src, 9).unwrap();
    settle(&mut ctx);
    ctx.reset().unwrap();
    assert_eq!(ctx.current(dst).as_int(), Some(4));
    assert_eq!(ctx.pending(dst).as_int(), Some(0));
    settle(&mut ctx);
    assert_eq!(ctx.current(dst).as_int(), Some(0));
}

#[test]
fn failing_observer_does_not_stall_its_batch() {
    let mut ctx = SimContext::new();
    let src = ctx.signal(IntBv::unsigned(0, 16).unwrap()).unwrap();
    let narrow = byte(&mut ctx, 0);
    ctx.assign(narrow, src).unwrap();
    let alias = ctx.clone_signal(src).unwrap();
    settle(&mut ctx);

    ctx.set_pending(src, 300).unwrap();
    let fired = ctx.commit_changed().unwrap();
    assert!(matches!(
        ctx.wake(fired),
        Err(SignalError::TypeCoercion { .. })
    ));
    settle(&mut ctx);
    assert_eq!(ctx.current(alias).as_int(), Some(300));
    assert_eq!(ctx.current(narrow).as_int(), Some(0));

    ctx.set_pending(src, 5).unwrap();
    settle(&mut ctx);
    assert_eq!(ctx.current(alias).as_int(), Some(5));
    assert_eq!(ctx.current(narrow).as_int(), Some(5));
}
