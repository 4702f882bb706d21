//! Delayed signals and the queue of future events.
//!
//! A delayed signal does not commit in the delta cycle it was written in.
//! Its update schedules the commit `delay` ticks ahead, tagged with the
//! time of the most recent distinct change. When the event comes due it is
//! applied only if no newer change has been scheduled since, so a pulse
//! shorter than the delay never reaches the output.

use std::cmp::{Ordering, Reverse};

use crate::context::SimContext;
use crate::error::{SignalError, SimError};
use crate::signal::{DelayState, SignalId};
use crate::time::SimTime;
use crate::value::Value;
use crate::waiter::{ProcessId, Waiter};

/// Something due at a future tick.
#[derive(Debug)]
pub(crate) enum FutureEvent {
    /// Commit a delayed signal's scheduled value.
    Commit {
        signal: SignalId,
        value: Value,
        stamp: SimTime,
    },
    /// Resume a process.
    Wake(ProcessId),
}

/// A future event ordered by due time, then by scheduling order.
#[derive(Debug)]
pub(crate) struct ScheduledEvent {
    pub(crate) time: u64,
    pub(crate) seq: u64,
    pub(crate) event: FutureEvent,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SimContext {
    /// Creates a signal whose committed value trails its writes by `delay` ticks.
    pub fn delayed_signal(&mut self, init: impl Into<Value>, delay: u64) -> Result<SignalId, SignalError> {
        let id = self.signal(init)?;
        let state = self.table.get_mut(id);
        state.delay = Some(DelayState {
            delay,
            scheduled: state.init.clone(),
            stamp: SimTime::zero(),
        });
        Ok(id)
    }

    /// Resumes `process` after `delay` ticks.
    pub fn wake_after(&mut self, delay: u64, process: ProcessId) {
        let time = self.now.time.saturating_add(delay);
        self.schedule(time, FutureEvent::Wake(process));
    }

    /// The tick of the earliest pending future event.
    pub fn next_event_time(&self) -> Option<u64> {
        self.future.peek().map(|Reverse(e)| e.time)
    }

    /// Moves time to `time` and applies every event due by then.
    ///
    /// Returns the waiters fired by delayed commits plus the processes whose
    /// timed wait expired.
    pub fn advance_to(&mut self, time: u64) -> Result<Vec<Waiter>, SimError> {
        if time < self.now.time {
            return Err(SimError::TimeReversal {
                from: self.now.time,
                to: time,
            });
        }
        self.dump_traced()?;
        self.now = self.now.advance_to(time);

        let mut fired = Vec::new();
        while self.future.peek().is_some_and(|Reverse(e)| e.time <= time) {
            let Some(Reverse(due)) = self.future.pop() else {
                break;
            };
            match due.event {
                FutureEvent::Commit {
                    signal,
                    value,
                    stamp,
                } => fired.extend(self.apply_delayed(signal, value, stamp)?),
                FutureEvent::Wake(pid) => fired.push(Waiter::Process(pid)),
            }
        }
        Ok(fired)
    }

    fn schedule(&mut self, time: u64, event: FutureEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.future.push(Reverse(ScheduledEvent { time, seq, event }));
    }

    /// Update half of a delayed signal: stamp distinct changes and schedule the commit.
    pub(crate) fn schedule_delayed(&mut self, id: SignalId) {
        let now = self.now;
        let state = self.table.get_mut(id);
        let Some(delay) = state.delay.as_mut() else {
            return;
        };
        if state.pending != delay.scheduled {
            delay.stamp = now;
            delay.scheduled = state.pending.clone();
        }
        let event = FutureEvent::Commit {
            signal: id,
            value: state.pending.clone(),
            stamp: delay.stamp,
        };
        let due = now.time.saturating_add(delay.delay);
        self.schedule(due, event);
    }

    fn apply_delayed(&mut self, id: SignalId, value: Value, stamp: SimTime) -> Result<Vec<Waiter>, SimError> {
        let state = self.table.get_mut(id);
        let fresh = state.delay.as_ref().is_some_and(|d| d.stamp == stamp);
        if !fresh || state.current == value {
            return Ok(Vec::new());
        }
        let fired = state.transition(value);
        self.record(id)?;
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_common::ArenaId;

    fn run_to(ctx: &mut SimContext, time: u64) {
        ctx.advance_to(time).unwrap();
    }

    #[test]
    fn commit_lands_after_delay() {
        let mut ctx = SimContext::new();
        let d = ctx.delayed_signal(false, 5).unwrap();
        ctx.set_pending(d, true).unwrap();
        ctx.commit_changed().unwrap();
        assert_eq!(ctx.current(d), &Value::Bool(false));
        assert_eq!(ctx.next_event_time(), Some(5));

        run_to(&mut ctx, 4);
        assert_eq!(ctx.current(d), &Value::Bool(false));
        run_to(&mut ctx, 5);
        assert_eq!(ctx.current(d), &Value::Bool(true));
        assert_eq!(ctx.get(d).delay(), Some(5));
    }

    #[test]
    fn short_pulse_is_swallowed() {
        let mut ctx = SimContext::new();
        let d = ctx.delayed_signal(false, 5).unwrap();
        ctx.set_pending(d, true).unwrap();
        ctx.commit_changed().unwrap();
        run_to(&mut ctx, 2);
        ctx.set_pending(d, false).unwrap();
        ctx.commit_changed().unwrap();

        run_to(&mut ctx, 5);
        assert_eq!(ctx.current(d), &Value::Bool(false));
        run_to(&mut ctx, 7);
        assert_eq!(ctx.current(d), &Value::Bool(false));
        assert_eq!(ctx.next_event_time(), None);
    }

    #[test]
    fn delayed_commit_fires_waiters() {
        let mut ctx = SimContext::new();
        let d = ctx.delayed_signal(0, 3).unwrap();
        let p = ProcessId::from_raw(0);
        ctx.wait_on(d, crate::waiter::Edge::Any, p).unwrap();
        ctx.set_pending(d, 4).unwrap();
        assert!(ctx.commit_changed().unwrap().is_empty());
        let fired = ctx.advance_to(3).unwrap();
        assert_eq!(fired, vec![Waiter::Process(p)]);
        assert_eq!(ctx.current(d).as_int(), Some(4));
    }

    #[test]
    fn timed_wakes_in_order() {
        let mut ctx = SimContext::new();
        let a = ProcessId::from_raw(0);
        let b = ProcessId::from_raw(1);
        ctx.wake_after(10, a);
        ctx.wake_after(10, b);
        ctx.wake_after(3, b);
        assert_eq!(ctx.next_event_time(), Some(3));
        assert_eq!(ctx.advance_to(3).unwrap(), vec![Waiter::Process(b)]);
        assert_eq!(
            ctx.advance_to(10).unwrap(),
            vec![Waiter::Process(a), Waiter::Process(b)]
        );
        assert_eq!(ctx.now(), SimTime::at(10));
    }

    #[test]
    fn time_cannot_go_backwards() {
        let mut ctx = SimContext::new();
        ctx.advance_to(8).unwrap();
        assert!(matches!(
            ctx.advance_to(2),
            Err(SimError::TimeReversal { from: 8, to: 2 })
        ));
    }

    #[test]
    fn reset_drops_future_events() {
        let mut ctx = SimContext::new();
        let d = ctx.delayed_signal(false, 5).unwrap();
        ctx.set_pending(d, true).unwrap();
        ctx.commit_changed().unwrap();
        ctx.reset().unwrap();
        assert_eq!(ctx.next_event_time(), None);
        assert_eq!(ctx.current(d), &Value::Bool(false));
    }
}
