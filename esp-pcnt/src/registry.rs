//! # Unit allocation
//!
//! ## Overview
//! A [`Registry`] owns the bookkeeping for one pulse counter peripheral: the
//! bound [`PcntPeripheral`], an allocation bitmask and, for every unit, the
//! record of the counter owning it. The dispatcher looks owners up by unit
//! index, so the table is fixed-size and lives as long as the program.
//!
//! Registries are statics. A zero-sized type implementing [`RegistryHandle`]
//! names one, which lets the interrupt trampolines and
//! [`PulseCounter`](crate::PulseCounter) reach it without storing a pointer.
//! [`Global`] names the crate's own registry, bound with [`crate::init`].
//!
//! ## Lifecycle
//! 1. const-constructed empty,
//! 2. bound to a peripheral exactly once by [`init_registry`],
//! 3. mutated only by allocating and releasing units,
//! 4. never torn down.
//!
//! ## Invariants
//! A unit's bit is set in the allocation mask if and only if its owner record
//! is present. Both are updated inside the same critical section, so
//! concurrent allocations can never claim the same unit. Allocation and
//! release are meant for normal-priority code; the dispatcher only reads.

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};
use portable_atomic::{AtomicU32, Ordering};

use crate::{
    Error,
    bridge::{EventFlag, EventHandler},
    dispatch,
    peripheral::PcntPeripheral,
    unit::{ALL_UNITS, MAX_UNITS, UnitId},
};

/// Names a static [`Registry`].
///
/// Implemented by zero-sized marker types:
///
/// ```rust
/// use esp_pcnt::{Registry, RegistryHandle};
///
/// static MOTORS: Registry = Registry::new();
///
/// struct Motors;
///
/// impl RegistryHandle for Motors {
///     fn registry() -> &'static Registry {
///         &MOTORS
///     }
/// }
/// ```
pub trait RegistryHandle: 'static {
    /// The registry this type names.
    fn registry() -> &'static Registry;
}

static GLOBAL: Registry = Registry::new();

/// The process-wide registry, bound by [`crate::init`].
#[derive(Debug, Clone, Copy)]
pub struct Global;

impl RegistryHandle for Global {
    fn registry() -> &'static Registry {
        &GLOBAL
    }
}

/// The record of the counter owning a unit.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Owner {
    pub(crate) handler: Option<EventHandler>,
}

pub(crate) struct Slot {
    owner: Mutex<Cell<Option<Owner>>>,
    pub(crate) events: EventFlag,
    spurious: AtomicU32,
}

impl Slot {
    const fn new() -> Self {
        Self {
            owner: Mutex::new(Cell::new(None)),
            events: EventFlag::new(),
            spurious: AtomicU32::new(0),
        }
    }
}

/// Unit allocation table of one pulse counter peripheral.
pub struct Registry {
    peripheral: Mutex<Cell<Option<&'static dyn PcntPeripheral>>>,
    allocated: AtomicU32,
    slots: [Slot; MAX_UNITS],
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty, unbound registry.
    pub const fn new() -> Self {
        Self {
            peripheral: Mutex::new(Cell::new(None)),
            allocated: AtomicU32::new(0),
            slots: [const { Slot::new() }; MAX_UNITS],
        }
    }

    /// The bound peripheral.
    pub fn peripheral(&self) -> Option<&'static dyn PcntPeripheral> {
        critical_section::with(|cs| self.peripheral_cs(cs))
    }

    pub(crate) fn peripheral_cs(
        &self,
        cs: CriticalSection<'_>,
    ) -> Option<&'static dyn PcntPeripheral> {
        self.peripheral.borrow(cs).get()
    }

    /// Whether a peripheral has been bound.
    pub fn is_initialized(&self) -> bool {
        self.peripheral().is_some()
    }

    fn bind(&self, peripheral: &'static dyn PcntPeripheral) -> Result<(), Error> {
        critical_section::with(|cs| {
            let bound = self.peripheral.borrow(cs);
            if bound.get().is_some() {
                return Err(Error::AlreadyInitialized);
            }
            bound.set(Some(peripheral));
            Ok(())
        })
    }

    /// Claims a unit: the requested one, or the lowest-numbered free unit.
    ///
    /// On failure the registry is left unchanged.
    pub fn allocate(&self, request: Option<UnitId>) -> Result<UnitId, Error> {
        let result = critical_section::with(|cs| {
            if self.peripheral_cs(cs).is_none() {
                return Err(Error::NotInitialized);
            }

            let mask = self.allocated.load(Ordering::Relaxed);
            let unit = match request {
                Some(unit) if mask & unit.mask() != 0 => return Err(Error::UnitInUse),
                Some(unit) => unit,
                None => {
                    let free = !mask & ALL_UNITS;
                    if free == 0 {
                        return Err(Error::Exhausted);
                    }
                    UnitId::from_index(free.trailing_zeros() as usize)
                }
            };

            let slot = &self.slots[unit.index()];
            slot.owner.borrow(cs).set(Some(Owner::default()));
            slot.events.reset(cs);
            self.allocated.store(mask | unit.mask(), Ordering::Release);

            Ok(unit)
        });

        match result {
            Ok(unit) => debug!("allocated {}", unit),
            Err(e) => warn!("allocation failed: {}", e),
        }
        result
    }

    /// Returns a unit to the pool. Releasing a free unit does nothing.
    pub fn release(&self, unit: UnitId) {
        let released = critical_section::with(|cs| {
            let slot = &self.slots[unit.index()];
            let was_owned = slot.owner.borrow(cs).take().is_some();
            slot.events.reset(cs);
            self.allocated.fetch_and(!unit.mask(), Ordering::Release);
            was_owned
        });

        if released {
            debug!("released {}", unit);
        }
    }

    /// Bitmask of the allocated units.
    pub fn allocated_mask(&self) -> u32 {
        self.allocated.load(Ordering::Acquire)
    }

    /// Whether `unit` is owned by a counter.
    pub fn is_allocated(&self, unit: UnitId) -> bool {
        self.allocated_mask() & unit.mask() != 0
    }

    /// Number of interrupts serviced for `unit` while no counter owned it.
    pub fn spurious_interrupts(&self, unit: UnitId) -> u32 {
        self.slots[unit.index()].spurious.load(Ordering::Relaxed)
    }

    pub(crate) fn owner(&self, cs: CriticalSection<'_>, unit: UnitId) -> Option<Owner> {
        self.slots[unit.index()].owner.borrow(cs).get()
    }

    /// Updates the owner record of an allocated unit. Returns `false` if the
    /// unit is free.
    pub(crate) fn update_owner(&self, unit: UnitId, f: impl FnOnce(&mut Owner)) -> bool {
        critical_section::with(|cs| {
            let cell = self.slots[unit.index()].owner.borrow(cs);
            match cell.get() {
                Some(mut owner) => {
                    f(&mut owner);
                    cell.set(Some(owner));
                    true
                }
                None => false,
            }
        })
    }

    /// Drops the notifications waiting for `unit`.
    pub(crate) fn reset_events(&self, unit: UnitId) {
        critical_section::with(|cs| self.slots[unit.index()].events.reset(cs));
    }

    pub(crate) fn slot(&self, unit: UnitId) -> &Slot {
        &self.slots[unit.index()]
    }

    pub(crate) fn note_spurious(&self, unit: UnitId) {
        self.slots[unit.index()].spurious.fetch_add(1, Ordering::Relaxed);
    }

    /// Checks that the allocation mask and the owner table agree.
    pub fn is_consistent(&self) -> bool {
        critical_section::with(|cs| {
            let mask = self.allocated.load(Ordering::Relaxed);
            if mask & !ALL_UNITS != 0 {
                return false;
            }
            UnitId::all().all(|unit| {
                let owned = self.slots[unit.index()].owner.borrow(cs).get().is_some();
                owned == (mask & unit.mask() != 0)
            })
        })
    }
}

/// Binds the registry named by `R` to a peripheral.
///
/// Every unit is reset and the shared interrupt line, if the peripheral has
/// one, is bound to `R`'s dispatcher. Must run once, before any counter of
/// `R` is configured.
pub fn init_registry<R: RegistryHandle>(
    peripheral: &'static dyn PcntPeripheral,
) -> Result<(), Error> {
    let registry = R::registry();
    registry.bind(peripheral)?;

    for unit in UnitId::all() {
        peripheral.install_unit_handler(unit, None);
        peripheral.reset_unit(unit);
    }
    critical_section::with(|_| peripheral.clear_interrupt_status(ALL_UNITS));
    peripheral.install_shared_handler(dispatch::shared_handler::<R>);

    info!("pcnt registry initialized with {} units", MAX_UNITS);
    Ok(())
}
