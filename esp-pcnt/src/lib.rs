//! Unit allocation and interrupt dispatch for the ESP32 pulse counter
//! (PCNT).
//!
//! The PCNT peripheral has a fixed number of counter units, each counting the
//! edges of up to two input signals and comparing the count against five
//! watch points. This crate hands the units out to [`PulseCounter`]s at
//! runtime and routes the unit interrupts back to the counter owning the
//! unit, without allocating and without logging in interrupt context.
//!
//! The register block is reached through the [`PcntPeripheral`] trait. With
//! the `sim` feature, [`sim::SimulatedPcnt`] provides a software model of the
//! ESP32 block for host-side testing.
//!
//! ## Usage
//!
//! Bind the global registry to the peripheral once, then configure counters:
//!
//! ```rust, no_run
//! # fn peripheral() -> &'static dyn esp_pcnt::PcntPeripheral { unimplemented!() }
//! use esp_pcnt::{Event, InputPin, PulseCounter};
//!
//! esp_pcnt::init(peripheral())?;
//!
//! let mut counter: PulseCounter = PulseCounter::new();
//! counter.configure(InputPin::new(4), None)?;
//! counter.set_watch_point(Event::Threshold0, 10)?;
//! counter.enable_interrupt()?;
//! counter.resume()?;
//! # Ok::<(), esp_pcnt::Error>(())
//! ```
//!
//! Events reach the application either through a callback attached with
//! [`PulseCounter::attach_callback`], which runs in interrupt context, or
//! through the counter's event flag, polled with
//! [`PulseCounter::take_events`]. See the [`bridge`] module.
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// MUST be the first module
mod fmt;

pub mod bridge;
mod channel;
mod counter;
mod dispatch;
mod peripheral;
mod registry;
#[cfg(any(test, feature = "sim"))]
#[cfg_attr(docsrs, doc(cfg(feature = "sim")))]
pub mod sim;
pub mod sync;
mod unit;

pub use self::{
    bridge::{EventCallback, EventFlag, EventHandler, InterruptContext, Notification},
    channel::{Channel, ChannelMode, CtrlMode, EdgeMode, InputPin},
    counter::{Config, PulseCounter},
    dispatch::dispatch,
    peripheral::{IsrFn, PcntPeripheral},
    registry::{Global, Registry, RegistryHandle, init_registry},
    unit::{ConfigError, Event, MAX_FILTER_THRESHOLD, MAX_UNITS, UnitId, ZeroMode},
};

/// Binds the [`Global`] registry to `peripheral`.
///
/// Must be called once, before the first [`PulseCounter`] is configured.
pub fn init(peripheral: &'static dyn PcntPeripheral) -> Result<(), Error> {
    init_registry::<Global>(peripheral)
}

/// Pulse counter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Every unit is owned by a counter.
    Exhausted,
    /// The requested unit is owned by another counter.
    UnitInUse,
    /// The peripheral has no unit with this number.
    InvalidUnit,
    /// The registry has not been bound to a peripheral.
    NotInitialized,
    /// The registry is already bound to a peripheral.
    AlreadyInitialized,
    /// The counter does not own a unit.
    Unallocated,
    /// A configuration value was rejected.
    InvalidConfiguration(ConfigError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Exhausted => write!(f, "no free counter unit"),
            Error::UnitInUse => write!(f, "counter unit already in use"),
            Error::InvalidUnit => write!(f, "no such counter unit"),
            Error::NotInitialized => write!(f, "pulse counter registry not initialized"),
            Error::AlreadyInitialized => write!(f, "pulse counter registry already initialized"),
            Error::Unallocated => write!(f, "counter has no unit"),
            Error::InvalidConfiguration(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidConfiguration(e)
    }
}
