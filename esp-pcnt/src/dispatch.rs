//! # Interrupt dispatch
//!
//! The interrupt controller only stores plain function pointers, so every
//! unit gets its own statically generated trampoline. A trampoline knows its
//! unit number and its registry at compile time and looks the owner up by
//! index. Peripherals with a single interrupt line for all units use
//! [`shared_handler`] instead, which reads the interrupt status once and
//! services every unit whose bit is set, lowest unit first.
//!
//! Servicing a unit acknowledges its latched events and its interrupt status
//! bit before the events are delivered, whether or not anybody owns the
//! unit. Everything runs inside one critical section and touches neither
//! the allocator nor the logger.

use core::marker::PhantomData;

use critical_section::CriticalSection;

use crate::{
    bridge::InterruptContext,
    peripheral::IsrFn,
    registry::{Owner, Registry, RegistryHandle},
    sync::CriticalGuard,
    unit::{MAX_UNITS, UnitId},
};

/// The per-unit interrupt routines of registry `R`.
pub(crate) struct Trampolines<R>(PhantomData<R>);

impl<R: RegistryHandle> Trampolines<R> {
    cfg_if::cfg_if! {
        if #[cfg(any(
            feature = "esp32s2",
            feature = "esp32s3",
            feature = "esp32c6",
            feature = "esp32h2"
        ))] {
            pub(crate) const TABLE: [IsrFn; MAX_UNITS] = [
                trampoline::<R, 0>,
                trampoline::<R, 1>,
                trampoline::<R, 2>,
                trampoline::<R, 3>,
            ];
        } else {
            pub(crate) const TABLE: [IsrFn; MAX_UNITS] = [
                trampoline::<R, 0>,
                trampoline::<R, 1>,
                trampoline::<R, 2>,
                trampoline::<R, 3>,
                trampoline::<R, 4>,
                trampoline::<R, 5>,
                trampoline::<R, 6>,
                trampoline::<R, 7>,
            ];
        }
    }

    pub(crate) fn get(unit: UnitId) -> IsrFn {
        Self::TABLE[unit.index()]
    }
}

extern "C" fn trampoline<R: RegistryHandle, const UNIT: u8>() {
    let guard = CriticalGuard::acquire();
    service_unit(guard.token(), R::registry(), UnitId::from_index(UNIT as usize));
}

/// Routine for the shared interrupt line of registry `R`.
pub(crate) extern "C" fn shared_handler<R: RegistryHandle>() {
    let guard = CriticalGuard::acquire();
    let cs = guard.token();
    let registry = R::registry();

    let Some(peripheral) = registry.peripheral_cs(cs) else {
        return;
    };
    let status = peripheral.interrupt_status();
    for unit in UnitId::iter_mask(status) {
        service_unit(cs, registry, unit);
    }
}

/// Services the units whose bits are set in `units`, lowest unit first, as
/// if their interrupts had fired.
///
/// This is for applications that own the interrupt vector themselves and
/// learn the firing units some other way.
pub fn dispatch<R: RegistryHandle>(units: u32) {
    let guard = CriticalGuard::acquire();
    let registry = R::registry();
    for unit in UnitId::iter_mask(units) {
        service_unit(guard.token(), registry, unit);
    }
}

fn service_unit(cs: CriticalSection<'_>, registry: &Registry, unit: UnitId) {
    let Some(peripheral) = registry.peripheral_cs(cs) else {
        return;
    };

    let events = peripheral.event_status(unit);
    peripheral.clear_event_status(unit, events);
    peripheral.clear_interrupt_status(unit.mask());
    let count = peripheral.counter(unit);

    match registry.owner(cs, unit) {
        Some(Owner {
            handler: Some(handler),
        }) => handler.call(events, &InterruptContext::new(cs, unit, count)),
        Some(Owner { handler: None }) => registry.slot(unit).events.raise(cs, unit, events, count),
        None => registry.note_spurious(unit),
    }
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;
    use portable_atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        Event,
        bridge::EventHandler,
        peripheral::PcntPeripheral,
        registry::init_registry,
        sim::{Routing, SimulatedPcnt},
    };

    macro_rules! test_registry {
        ($name:ident, $routing:expr) => {
            struct $name;
            impl RegistryHandle for $name {
                fn registry() -> &'static Registry {
                    static REGISTRY: Registry = Registry::new();
                    &REGISTRY
                }
            }
            static SIM: SimulatedPcnt = SimulatedPcnt::new($routing);
            init_registry::<$name>(&SIM).unwrap();
        };
    }

    fn unit(n: u8) -> UnitId {
        UnitId::new(n).unwrap()
    }

    #[test]
    fn trampolines_are_distinct_per_unit() {
        struct A;
        impl RegistryHandle for A {
            fn registry() -> &'static Registry {
                static REGISTRY: Registry = Registry::new();
                &REGISTRY
            }
        }

        let table = Trampolines::<A>::TABLE;
        for (i, a) in table.iter().enumerate() {
            for b in &table[i + 1..] {
                assert_ne!(*a as usize, *b as usize);
            }
        }
    }

    #[test]
    fn unowned_unit_is_spurious_and_acknowledged() {
        test_registry!(Spurious, Routing::PerUnit);
        let registry = Spurious::registry();

        SIM.force_event(unit(2), Event::Threshold0);
        SIM.take_clear_log();
        dispatch::<Spurious>(unit(2).mask());

        assert_eq!(registry.spurious_interrupts(unit(2)), 1);
        assert_eq!(SIM.event_status(unit(2)), EnumSet::empty());
        assert_eq!(SIM.take_clear_log().as_slice(), &[unit(2).mask()]);
    }

    #[test]
    fn owner_without_handler_gets_flag() {
        test_registry!(Flagged, Routing::PerUnit);
        let registry = Flagged::registry();

        let u = registry.allocate(None).unwrap();
        SIM.force_event(u, Event::HighLimit);
        dispatch::<Flagged>(u.mask());

        let n = registry.slot(u).events.take().unwrap();
        assert_eq!(n.events, EnumSet::only(Event::HighLimit));
        assert_eq!(registry.spurious_interrupts(u), 0);
    }

    #[test]
    fn owner_with_handler_is_called_once() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        static SEEN: AtomicU32 = AtomicU32::new(0);

        fn on_event(events: EnumSet<Event>, ctx: &InterruptContext<'_>) {
            CALLS.fetch_add(1, Ordering::Relaxed);
            SEEN.store(events.as_repr() as u32 | (ctx.unit().mask() << 8), Ordering::Relaxed);
        }

        test_registry!(Called, Routing::PerUnit);
        let registry = Called::registry();

        let u = registry.allocate(None).unwrap();
        registry.update_owner(u, |owner| owner.handler = Some(EventHandler::new(on_event)));
        SIM.force_event(u, Event::Threshold1);
        dispatch::<Called>(u.mask());

        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
        assert_eq!(
            SEEN.load(Ordering::Relaxed),
            EnumSet::only(Event::Threshold1).as_repr() as u32 | (u.mask() << 8)
        );
        assert!(!registry.slot(u).events.is_raised());
    }

    #[test]
    fn shared_line_services_units_in_order() {
        test_registry!(Shared, Routing::Shared);
        let registry = Shared::registry();

        for _ in 0..3 {
            registry.allocate(None).unwrap();
        }
        for n in 0..3 {
            SIM.set_interrupt_enabled(unit(n), true);
        }
        SIM.force_event(unit(2), Event::Threshold0);
        SIM.force_event(unit(0), Event::Threshold1);
        SIM.force_event(unit(1), Event::Zero);
        SIM.take_clear_log();

        shared_handler::<Shared>();

        assert_eq!(
            SIM.take_clear_log().as_slice(),
            &[unit(0).mask(), unit(1).mask(), unit(2).mask()]
        );
        for n in 0..3 {
            assert!(registry.slot(unit(n)).events.is_raised());
        }
        assert_eq!(SIM.raw_interrupts(), 0);
    }
}
