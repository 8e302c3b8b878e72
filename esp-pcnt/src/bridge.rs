//! # Moving events out of interrupt context
//!
//! The dispatcher hands watch-point events to application code in one of two
//! ways:
//!
//! - **Direct callback.** An [`EventHandler`] attached to a counter runs
//!   inside the interrupt handler. It receives the events together with an
//!   [`InterruptContext`], and must obey interrupt-context rules: no
//!   blocking, no allocation, no console output.
//! - **Deferred flag.** Without a callback, the dispatcher raises the unit's
//!   [`EventFlag`]. Normal-priority code polls it and consumes the pending
//!   events with [`EventFlag::take`].
//!
//! Events that arrive before the flag is consumed are merged: the event sets
//! are OR-ed together and only the most recent count snapshot is kept.
//! Individual occurrences are not queued.
//!
//! [`EventFlag`] is also useful on its own, as the hand-off from a callback:
//!
//! ```rust
//! use enumset::EnumSet;
//! use esp_pcnt::{Event, EventFlag, EventHandler, InterruptContext};
//!
//! static PC0_EVENTS: EventFlag = EventFlag::new();
//!
//! fn on_pc0(events: EnumSet<Event>, ctx: &InterruptContext<'_>) {
//!     PC0_EVENTS.raise(ctx.critical_section(), ctx.unit(), events, ctx.count());
//! }
//!
//! const PC0_HANDLER: EventHandler = EventHandler::new(on_pc0);
//!
//! // In the main loop:
//! if let Some(notification) = PC0_EVENTS.take() {
//!     if notification.events.contains(Event::Threshold0) {
//!         // ...
//!     }
//! }
//! ```

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};
use enumset::EnumSet;
use portable_atomic::{AtomicBool, Ordering};

use crate::unit::{Event, UnitId};

/// Signature of an event callback.
pub type EventCallback = fn(EnumSet<Event>, &InterruptContext<'_>);

/// A callback invoked by the dispatcher when a counter's unit fires.
///
/// The function runs in interrupt context.
#[derive(Clone, Copy)]
pub struct EventHandler {
    callback: EventCallback,
}

impl EventHandler {
    /// Wraps a callback.
    pub const fn new(callback: EventCallback) -> Self {
        Self { callback }
    }

    pub(crate) fn call(&self, events: EnumSet<Event>, ctx: &InterruptContext<'_>) {
        (self.callback)(events, ctx)
    }
}

impl core::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventHandler")
            .field("callback", &(self.callback as *const ()))
            .finish()
    }
}

/// What an [`EventHandler`] knows about the interrupt it runs in.
///
/// Only the dispatcher creates these, so holding one proves that the code
/// runs in interrupt context, inside the critical section.
pub struct InterruptContext<'cs> {
    cs: CriticalSection<'cs>,
    unit: UnitId,
    count: i16,
}

impl<'cs> InterruptContext<'cs> {
    pub(crate) fn new(cs: CriticalSection<'cs>, unit: UnitId, count: i16) -> Self {
        Self { cs, unit, count }
    }

    /// The unit that fired.
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// The counter value read while servicing the interrupt.
    pub fn count(&self) -> i16 {
        self.count
    }

    /// The critical section the dispatcher holds.
    pub fn critical_section(&self) -> CriticalSection<'cs> {
        self.cs
    }
}

/// Events handed from interrupt context to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Notification {
    /// The unit that fired.
    pub unit: UnitId,
    /// Every event latched since the flag was last consumed.
    pub events: EnumSet<Event>,
    /// Counter snapshot from the most recent interrupt.
    pub count: i16,
    /// How many interrupts were merged into this notification.
    pub occurrences: u16,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Notification {
    fn format(&self, fmt: defmt::Formatter<'_>) {
        defmt::write!(
            fmt,
            "Notification {{ unit: {}, events: {=u8:#x}, count: {}, occurrences: {} }}",
            self.unit,
            self.events.as_repr(),
            self.count,
            self.occurrences
        )
    }
}

#[derive(Clone, Copy)]
struct Pending {
    unit: UnitId,
    events: EnumSet<Event>,
    count: i16,
    occurrences: u16,
}

/// A pending-event flag, raised in interrupt context and consumed by
/// normal-priority code.
pub struct EventFlag {
    raised: AtomicBool,
    pending: Mutex<Cell<Option<Pending>>>,
}

impl Default for EventFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFlag {
    /// Creates a lowered flag.
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            pending: Mutex::new(Cell::new(None)),
        }
    }

    /// Records events for `unit`, merging with anything not yet consumed.
    pub fn raise(&self, cs: CriticalSection<'_>, unit: UnitId, events: EnumSet<Event>, count: i16) {
        let cell = self.pending.borrow(cs);
        let next = match cell.get() {
            Some(prev) => Pending {
                unit,
                events: prev.events | events,
                count,
                occurrences: prev.occurrences.saturating_add(1),
            },
            None => Pending {
                unit,
                events,
                count,
                occurrences: 1,
            },
        };
        cell.set(Some(next));
        self.raised.store(true, Ordering::Release);
    }

    /// Whether events are waiting. Cheap enough to busy-poll.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Consumes the pending events and lowers the flag.
    pub fn take(&self) -> Option<Notification> {
        if !self.is_raised() {
            return None;
        }
        critical_section::with(|cs| self.take_cs(cs))
    }

    fn take_cs(&self, cs: CriticalSection<'_>) -> Option<Notification> {
        self.raised.store(false, Ordering::Relaxed);
        self.pending.borrow(cs).take().map(|p| Notification {
            unit: p.unit,
            events: p.events,
            count: p.count,
            occurrences: p.occurrences,
        })
    }

    /// Drops anything pending.
    pub(crate) fn reset(&self, cs: CriticalSection<'_>) {
        self.take_cs(cs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(n: u8) -> UnitId {
        UnitId::new(n).unwrap()
    }

    #[test]
    fn lowered_flag_yields_nothing() {
        let flag = EventFlag::new();
        assert!(!flag.is_raised());
        assert_eq!(flag.take(), None);
    }

    #[test]
    fn raised_events_are_consumed_once() {
        let flag = EventFlag::new();
        critical_section::with(|cs| flag.raise(cs, unit(2), Event::Threshold0.into(), 10));

        assert!(flag.is_raised());
        let n = flag.take().unwrap();
        assert_eq!(n.unit, unit(2));
        assert_eq!(n.events, EnumSet::only(Event::Threshold0));
        assert_eq!(n.count, 10);
        assert_eq!(n.occurrences, 1);

        assert!(!flag.is_raised());
        assert_eq!(flag.take(), None);
    }

    #[test]
    fn events_coalesce_until_consumed() {
        let flag = EventFlag::new();
        critical_section::with(|cs| {
            flag.raise(cs, unit(0), Event::Threshold0.into(), 10);
            flag.raise(cs, unit(0), Event::Threshold1.into(), 20);
        });

        let n = flag.take().unwrap();
        assert_eq!(n.events, Event::Threshold0 | Event::Threshold1);
        assert_eq!(n.count, 20);
        assert_eq!(n.occurrences, 2);
        assert_eq!(flag.take(), None);
    }

    #[test]
    fn reset_discards_pending_events() {
        let flag = EventFlag::new();
        critical_section::with(|cs| {
            flag.raise(cs, unit(1), Event::Zero.into(), 0);
            flag.reset(cs);
        });
        assert!(!flag.is_raised());
        assert_eq!(flag.take(), None);
    }
}
