//! The event scheduler of the [`PS2`](super::PS2).
//!
//! Every clocked unit is driven from a single time base counted in EE cycles. Each iteration of
//! the run loop asks the scheduler how far it may go before something happens, advances every
//! unit by that much and then lets the scheduler fire whatever became due.

use easyerr::Error;
use glimmer_core::cpu::{BUS_DIVIDER, IOP_DIVIDER};
use std::{cmp::Reverse, collections::BinaryHeap};
use tracing::trace;

/// Upper bound of a single run budget, in EE cycles.
pub const MAX_RUN_CYCLES: u64 = 1024;

/// Identifies a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u32);

/// Identifies a scheduled one-shot event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

/// Identifies a periodic timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u32);

#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("no handler with id {id} is registered")]
    UnknownHandler { id: u32 },
    #[error("no handler named {name:?} is registered")]
    UnknownHandlerName { name: String },
}

/// A scheduler callback. Receives the event payload, or the due cycle for periodic timers.
pub type Callback<C> = fn(&mut C, u64) -> Result<(), SchedulerError>;

/// Types which own a [`Scheduler`] driving them.
pub trait Context: Sized {
    fn scheduler(&mut self) -> &mut Scheduler<Self>;
}

struct Handler<C> {
    name: &'static str,
    callback: Callback<C>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ScheduledEvent {
    cycle: u64,
    seq: u64,
    handler: u32,
    payload: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PeriodicTimer {
    interval: u64,
    next_fire: u64,
    seq: u64,
    handler: u32,
}

/// Something that became due in [`Scheduler::process_events`].
#[derive(Clone, Copy)]
enum Due {
    Event,
    Timer(usize),
}

/// A scheduled event, as stored in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub cycle: u64,
    pub seq: u64,
    pub handler: String,
    pub payload: u64,
}

/// A periodic timer, as stored in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerRecord {
    pub interval: u64,
    pub next_fire: u64,
    pub seq: u64,
    pub handler: String,
}

/// The persistent state of a [`Scheduler`]. Handlers are referred to by name so that a snapshot
/// stays meaningful across runs, where ids are handed out again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub elapsed: u64,
    pub next_seq: u64,
    pub events: Vec<EventRecord>,
    pub timers: Vec<TimerRecord>,
}

/// A [`Snapshot`] whose handler names were resolved against a scheduler. Applying it cannot fail.
#[derive(Debug)]
pub struct ResolvedSnapshot {
    elapsed: u64,
    next_seq: u64,
    events: Vec<ScheduledEvent>,
    timers: Vec<PeriodicTimer>,
}

/// The event scheduler.
pub struct Scheduler<C> {
    handlers: Vec<Handler<C>>,
    events: BinaryHeap<Reverse<ScheduledEvent>>,
    timers: Vec<PeriodicTimer>,

    /// EE cycles elapsed since reset.
    elapsed: u64,
    /// The budget computed by the last [`Scheduler::calculate_run_cycles`].
    budget: u64,
    bus_budget: u64,
    iop_budget: u64,
    next_seq: u64,
}

impl<C> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name).collect::<Vec<_>>(),
            )
            .field("events", &self.events.len())
            .field("timers", &self.timers.len())
            .field("elapsed", &self.elapsed)
            .field("budget", &self.budget)
            .finish()
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::with_capacity(16),
            events: BinaryHeap::with_capacity(32),
            timers: Vec::with_capacity(4),
            elapsed: 0,
            budget: 0,
            bus_budget: 0,
            iop_budget: 0,
            next_seq: 0,
        }
    }

    /// Forgets every handler, event and timer and rewinds the clock. Handler ids handed out
    /// before are invalid afterwards.
    pub fn reset(&mut self) {
        self.handlers.clear();
        self.events.clear();
        self.timers.clear();
        self.elapsed = 0;
        self.budget = 0;
        self.bus_budget = 0;
        self.iop_budget = 0;
        self.next_seq = 0;
    }

    /// Registers a callback under the given name. Names identify handlers in snapshots and
    /// should be unique.
    pub fn register_function(&mut self, name: &'static str, callback: Callback<C>) -> HandlerId {
        let id = self.handlers.len() as u32;
        self.handlers.push(Handler { name, callback });
        HandlerId(id)
    }

    /// Returns the handler registered under `name`, if any.
    pub fn handler(&self, name: &str) -> Option<HandlerId> {
        self.handlers
            .iter()
            .position(|h| h.name == name)
            .map(|i| HandlerId(i as u32))
    }

    #[inline(always)]
    fn check_handler(&self, handler: HandlerId) -> Result<(), SchedulerError> {
        if (handler.0 as usize) < self.handlers.len() {
            Ok(())
        } else {
            Err(SchedulerError::UnknownHandler { id: handler.0 })
        }
    }

    #[inline(always)]
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Schedules `handler` to run `cycles_from_now` cycles in the future with a zero payload.
    ///
    /// Offsets that are negative or already elapsed are legal: the event fires on the next
    /// [`Scheduler::process_events`].
    pub fn add_event(
        &mut self,
        handler: HandlerId,
        cycles_from_now: i64,
    ) -> Result<EventId, SchedulerError> {
        self.add_event_with(handler, cycles_from_now, 0)
    }

    /// Same as [`Scheduler::add_event`], but with a payload passed to the callback.
    pub fn add_event_with(
        &mut self,
        handler: HandlerId,
        cycles_from_now: i64,
        payload: u64,
    ) -> Result<EventId, SchedulerError> {
        self.check_handler(handler)?;

        let seq = self.take_seq();
        let cycle = self
            .elapsed
            .saturating_add_signed(cycles_from_now)
            .max(self.elapsed);
        self.events.push(Reverse(ScheduledEvent {
            cycle,
            seq,
            handler: handler.0,
            payload,
        }));

        Ok(EventId(seq))
    }

    /// Registers a timer that fires `handler` every `interval` cycles, starting `interval`
    /// cycles from now. The timer re-arms itself right before its callback runs.
    pub fn add_periodic(
        &mut self,
        handler: HandlerId,
        interval: u64,
    ) -> Result<TimerId, SchedulerError> {
        self.check_handler(handler)?;

        let interval = interval.max(1);
        let seq = self.take_seq();
        let id = self.timers.len() as u32;
        self.timers.push(PeriodicTimer {
            interval,
            next_fire: self.elapsed + interval,
            seq,
            handler: handler.0,
        });

        Ok(TimerId(id))
    }

    /// Number of pending one-shot events.
    #[inline(always)]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// EE cycles elapsed since reset.
    #[inline(always)]
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// The cycle of the earliest event or timer, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        let event = self.events.peek().map(|Reverse(e)| e.cycle);
        let timer = self.timers.iter().map(|t| t.next_fire).min();

        match (event, timer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Computes how many EE cycles may elapse before the earliest deadline. Never returns less
    /// than one cycle, so that an already due event cannot stall the run loop, nor more than
    /// [`MAX_RUN_CYCLES`].
    ///
    /// The bus and IOP budgets are derived at the same time, see [`Scheduler::bus_run_cycles`]
    /// and [`Scheduler::iop_run_cycles`].
    pub fn calculate_run_cycles(&mut self) -> u64 {
        let until = self
            .next_deadline()
            .map_or(MAX_RUN_CYCLES, |deadline| deadline.saturating_sub(self.elapsed));

        let budget = until.clamp(1, MAX_RUN_CYCLES);
        let end = self.elapsed + budget;

        self.budget = budget;
        self.bus_budget = end / BUS_DIVIDER - self.elapsed / BUS_DIVIDER;
        self.iop_budget = end / IOP_DIVIDER - self.elapsed / IOP_DIVIDER;

        budget
    }

    /// The EE budget of the current iteration.
    #[inline(always)]
    pub fn run_cycles(&self) -> u64 {
        self.budget
    }

    /// The bus clock budget of the current iteration.
    #[inline(always)]
    pub fn bus_run_cycles(&self) -> u64 {
        self.bus_budget
    }

    /// The IOP budget of the current iteration.
    #[inline(always)]
    pub fn iop_run_cycles(&self) -> u64 {
        self.iop_budget
    }

    /// Commits the current budget into the elapsed cycle count. Called before any unit runs.
    pub fn update_cycle_counts(&mut self) {
        self.elapsed += self.budget;
    }

    /// Picks the next due item. One-shot events are only eligible if they existed when
    /// processing started (`seq < barrier`).
    ///
    /// New events are never scheduled before the current cycle, so if any one-shot event is
    /// eligible, the top of the heap is.
    fn next_due(&self, barrier: u64) -> Option<Due> {
        let event = self
            .events
            .peek()
            .filter(|Reverse(e)| e.cycle <= self.elapsed && e.seq < barrier)
            .map(|Reverse(e)| ((e.cycle, e.seq), Due::Event));

        let timer = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.next_fire <= self.elapsed)
            .map(|(i, t)| ((t.next_fire, t.seq), Due::Timer(i)))
            .min_by_key(|(key, _)| *key);

        match (event, timer) {
            (Some(e), Some(t)) => Some(if e.0 <= t.0 { e.1 } else { t.1 }),
            (e, t) => e.or(t).map(|(_, due)| due),
        }
    }

    /// Removes the next due item and returns its callback and payload.
    fn pop_due(&mut self, barrier: u64) -> Option<(Callback<C>, u64)> {
        let (handler, payload) = match self.next_due(barrier)? {
            Due::Event => {
                let Reverse(event) = self.events.pop()?;
                (event.handler, event.payload)
            }
            Due::Timer(index) => {
                let seq = self.take_seq();
                let timer = &mut self.timers[index];
                let due = timer.next_fire;
                timer.next_fire += timer.interval;
                timer.seq = seq;
                (timer.handler, due)
            }
        };

        let handler = &self.handlers[handler as usize];
        trace!(handler = handler.name, payload, "firing");
        Some((handler.callback, payload))
    }
}

impl<C: Context> Scheduler<C> {
    /// Fires every event and timer due at the current cycle, in cycle order, ties broken by
    /// insertion order. Events added by the callbacks themselves are left for a later call.
    pub fn process_events(ctx: &mut C) -> Result<(), SchedulerError> {
        let barrier = ctx.scheduler().next_seq;
        while let Some((callback, payload)) = ctx.scheduler().pop_due(barrier) {
            callback(ctx, payload)?;
        }

        Ok(())
    }
}

impl<C> Scheduler<C> {
    /// Captures the persistent state of this scheduler.
    pub fn snapshot(&self) -> Snapshot {
        let name = |handler: u32| self.handlers[handler as usize].name.to_owned();

        let mut events: Vec<_> = self
            .events
            .iter()
            .map(|Reverse(e)| EventRecord {
                cycle: e.cycle,
                seq: e.seq,
                handler: name(e.handler),
                payload: e.payload,
            })
            .collect();
        events.sort_by_key(|e| (e.cycle, e.seq));

        Snapshot {
            elapsed: self.elapsed,
            next_seq: self.next_seq,
            events,
            timers: self
                .timers
                .iter()
                .map(|t| TimerRecord {
                    interval: t.interval,
                    next_fire: t.next_fire,
                    seq: t.seq,
                    handler: name(t.handler),
                })
                .collect(),
        }
    }

    /// Resolves the handler names of `snapshot` against the handlers registered in this
    /// scheduler, without modifying it.
    pub fn resolve(&self, snapshot: &Snapshot) -> Result<ResolvedSnapshot, SchedulerError> {
        let lookup = |name: &str| {
            self.handler(name)
                .map(|id| id.0)
                .ok_or_else(|| SchedulerError::UnknownHandlerName {
                    name: name.to_owned(),
                })
        };

        let events = snapshot
            .events
            .iter()
            .map(|e| {
                Ok(ScheduledEvent {
                    cycle: e.cycle,
                    seq: e.seq,
                    handler: lookup(&e.handler)?,
                    payload: e.payload,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timers = snapshot
            .timers
            .iter()
            .map(|t| {
                Ok(PeriodicTimer {
                    interval: t.interval.max(1),
                    next_fire: t.next_fire,
                    seq: t.seq,
                    handler: lookup(&t.handler)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedSnapshot {
            elapsed: snapshot.elapsed,
            next_seq: snapshot.next_seq,
            events,
            timers,
        })
    }

    /// Replaces the events, timers and clock of this scheduler. Registered handlers are kept.
    pub fn restore(&mut self, resolved: ResolvedSnapshot) {
        self.events = resolved.events.into_iter().map(Reverse).collect();
        self.timers = resolved.timers;
        self.elapsed = resolved.elapsed;
        self.next_seq = resolved.next_seq;
        self.budget = 0;
        self.bus_budget = 0;
        self.iop_budget = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Log {
        scheduler: Scheduler<Log>,
        fired: Vec<(&'static str, u64, u64)>,
        follow_up: Option<HandlerId>,
    }

    impl Context for Log {
        fn scheduler(&mut self) -> &mut Scheduler<Self> {
            &mut self.scheduler
        }
    }

    fn record_a(log: &mut Log, payload: u64) -> Result<(), SchedulerError> {
        let at = log.scheduler.elapsed();
        log.fired.push(("a", at, payload));
        Ok(())
    }

    fn record_b(log: &mut Log, payload: u64) -> Result<(), SchedulerError> {
        let at = log.scheduler.elapsed();
        log.fired.push(("b", at, payload));
        Ok(())
    }

    fn reschedule(log: &mut Log, payload: u64) -> Result<(), SchedulerError> {
        let at = log.scheduler.elapsed();
        log.fired.push(("again", at, payload));
        if let Some(handler) = log.follow_up {
            log.scheduler.add_event(handler, 0)?;
        }

        Ok(())
    }

    /// Runs iterations of the budget loop until `cycles` have elapsed.
    fn run(log: &mut Log, cycles: u64) {
        while log.scheduler.elapsed() < cycles {
            log.scheduler.calculate_run_cycles();
            log.scheduler.update_cycle_counts();
            Scheduler::process_events(log).unwrap();
        }
    }

    #[test]
    fn periodic_interleave() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        let b = log.scheduler.register_function("b", record_b);
        log.scheduler.add_periodic(a, 100).unwrap();
        log.scheduler.add_periodic(b, 150).unwrap();

        run(&mut log, 300);

        let order: Vec<_> = log.fired.iter().map(|(name, at, _)| (*name, *at)).collect();
        assert_eq!(
            order,
            [("a", 100), ("b", 150), ("a", 200), ("b", 300), ("a", 300)]
        );
        assert_eq!(log.scheduler.elapsed(), 300);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        let b = log.scheduler.register_function("b", record_b);
        log.scheduler.add_event_with(b, 10, 1).unwrap();
        log.scheduler.add_event_with(a, 10, 2).unwrap();
        log.scheduler.add_event_with(b, 10, 3).unwrap();
        log.scheduler.add_event_with(a, 5, 4).unwrap();

        run(&mut log, 10);

        let payloads: Vec<_> = log.fired.iter().map(|(_, _, p)| *p).collect();
        assert_eq!(payloads, [4, 1, 2, 3]);
    }

    #[test]
    fn budget_stops_at_the_earliest_deadline() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        log.scheduler.add_event(a, 37).unwrap();

        assert_eq!(log.scheduler.calculate_run_cycles(), 37);
        log.scheduler.update_cycle_counts();
        Scheduler::process_events(&mut log).unwrap();
        assert_eq!(log.fired, [("a", 37, 0)]);

        // nothing pending
        assert_eq!(log.scheduler.calculate_run_cycles(), MAX_RUN_CYCLES);
    }

    #[test]
    fn budget_is_at_least_one() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        log.scheduler.add_event(a, -20).unwrap();

        assert_eq!(log.scheduler.calculate_run_cycles(), 1);
        log.scheduler.update_cycle_counts();
        Scheduler::process_events(&mut log).unwrap();
        assert_eq!(log.fired.len(), 1);
    }

    #[test]
    fn elapsed_offsets_fire_on_next_processing() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        run(&mut log, 50);

        let now = log.scheduler.elapsed();
        log.scheduler.add_event(a, -10).unwrap();
        Scheduler::process_events(&mut log).unwrap();
        assert_eq!(log.fired, [("a", now, 0)]);
    }

    #[test]
    fn events_added_while_processing_wait() {
        let mut log = Log::default();
        let again = log.scheduler.register_function("again", reschedule);
        log.follow_up = Some(again);
        log.scheduler.add_event(again, 0).unwrap();

        Scheduler::process_events(&mut log).unwrap();
        assert_eq!(log.fired.len(), 1);
        assert_eq!(log.scheduler.pending_events(), 1);

        Scheduler::process_events(&mut log).unwrap();
        assert_eq!(log.fired.len(), 2);
    }

    #[test]
    fn unknown_handler() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        log.scheduler.reset();

        assert!(matches!(
            log.scheduler.add_event(a, 1),
            Err(SchedulerError::UnknownHandler { id: 0 })
        ));
        assert!(log.scheduler.add_periodic(a, 1).is_err());
    }

    #[test]
    fn bus_and_iop_budgets() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        log.scheduler.add_periodic(a, 3).unwrap();

        let mut ee = 0;
        let mut bus = 0;
        let mut iop = 0;
        while log.scheduler.elapsed() < 240 {
            ee += log.scheduler.calculate_run_cycles();
            bus += log.scheduler.bus_run_cycles();
            iop += log.scheduler.iop_run_cycles();
            log.scheduler.update_cycle_counts();
            Scheduler::process_events(&mut log).unwrap();
        }

        assert_eq!(ee, 240);
        assert_eq!(bus, 120);
        assert_eq!(iop, 30);
    }

    #[test]
    fn snapshot_restore() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        let b = log.scheduler.register_function("b", record_b);
        log.scheduler.add_periodic(b, 40).unwrap();
        log.scheduler.add_event_with(a, 25, 7).unwrap();

        let snapshot = log.scheduler.snapshot();

        // handlers registered in a different order get different ids
        let mut other = Log::default();
        other.scheduler.register_function("b", record_b);
        other.scheduler.register_function("a", record_a);
        let resolved = other.scheduler.resolve(&snapshot).unwrap();
        other.scheduler.restore(resolved);
        assert_eq!(other.scheduler.snapshot(), snapshot);

        run(&mut other, 80);
        let fired: Vec<_> = other.fired.iter().map(|(n, at, _)| (*n, *at)).collect();
        assert_eq!(fired, [("a", 25), ("b", 40), ("b", 80)]);
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        let mut log = Log::default();
        let a = log.scheduler.register_function("a", record_a);
        log.scheduler.add_event(a, 5).unwrap();
        let snapshot = log.scheduler.snapshot();

        let mut other = Log::default();
        other.scheduler.register_function("b", record_b);
        assert!(matches!(
            other.scheduler.resolve(&snapshot),
            Err(SchedulerError::UnknownHandlerName { .. })
        ));
        assert_eq!(other.scheduler.pending_events(), 0);
    }

    proptest! {
        #[test]
        fn fires_in_cycle_order(offsets in prop::collection::vec(0i64..500, 1..40)) {
            let mut log = Log::default();
            let a = log.scheduler.register_function("a", record_a);
            for (i, offset) in offsets.iter().enumerate() {
                log.scheduler.add_event_with(a, *offset, i as u64).unwrap();
            }

            run(&mut log, 500);

            let mut expected: Vec<_> = offsets
                .iter()
                .enumerate()
                .map(|(i, offset)| (*offset as u64, i as u64))
                .collect();
            expected.sort();

            let order: Vec<_> = log.fired.iter().map(|(_, _, payload)| *payload).collect();
            let expected_order: Vec<_> = expected.iter().map(|(_, payload)| *payload).collect();
            prop_assert_eq!(order, expected_order);

            for ((_, at, _), (offset, _)) in log.fired.iter().zip(&expected) {
                prop_assert!(*at >= *offset);
            }
        }
    }
}
