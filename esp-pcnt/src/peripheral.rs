//! # PCNT - peripheral capability
//!
//! The register block is reached through [`PcntPeripheral`]. Edge counting,
//! glitch filtering and the watch-point comparisons all happen behind this
//! trait; the driver only configures units and services their interrupts.
//!
//! Implementations are shared between normal-priority code and the interrupt
//! handlers, so every method takes `&self`. The driver guarantees that the
//! per-unit methods are only called for a unit by its current owner or by the
//! dispatcher servicing that unit. The shared interrupt status methods are
//! always called inside a critical section.

use enumset::EnumSet;

use crate::{
    channel::{Channel, ChannelMode, InputPin},
    unit::{Event, UnitId, ZeroMode},
};

/// An interrupt service routine as the interrupt controller stores it.
pub type IsrFn = extern "C" fn();

/// Register-level access to a pulse counter peripheral.
pub trait PcntPeripheral: Sync {
    /// Returns a unit to its reset configuration: filter, events and channel
    /// modes disabled, counter cleared, interrupt disabled, latches cleared.
    fn reset_unit(&self, unit: UnitId);

    /// Routes the signal and control inputs of a channel. `None` leaves the
    /// input unconnected.
    fn set_channel_inputs(
        &self,
        unit: UnitId,
        channel: Channel,
        signal: Option<InputPin>,
        control: Option<InputPin>,
    );

    /// Sets the counting mode of a channel.
    fn set_channel_mode(&self, unit: UnitId, channel: Channel, mode: ChannelMode);

    /// Reads the counter register.
    fn counter(&self, unit: UnitId) -> i16;

    /// Stops counting. The counter keeps its value.
    fn pause(&self, unit: UnitId);

    /// Resumes counting.
    fn resume(&self, unit: UnitId);

    /// Resets the counter register to zero.
    fn clear(&self, unit: UnitId);

    /// Configures the glitch filter. `None` disables it.
    fn set_filter(&self, unit: UnitId, threshold: Option<u16>);

    /// Writes the compare value of a watch point. Not called for
    /// [`Event::Zero`].
    fn set_watch_value(&self, unit: UnitId, event: Event, value: i16);

    /// Reads back the compare value of a watch point.
    fn watch_value(&self, unit: UnitId, event: Event) -> i16;

    /// Arms or disarms a watch point.
    fn set_event_enabled(&self, unit: UnitId, event: Event, enabled: bool);

    /// The armed watch points.
    fn enabled_events(&self, unit: UnitId) -> EnumSet<Event>;

    /// Latched watch-point events. Reading does not acknowledge them.
    fn event_status(&self, unit: UnitId) -> EnumSet<Event>;

    /// Acknowledges latched watch-point events.
    fn clear_event_status(&self, unit: UnitId, events: EnumSet<Event>);

    /// How the counter last reached zero.
    fn zero_mode(&self, unit: UnitId) -> ZeroMode;

    /// Enables or disables interrupt delivery for a unit. Watch points keep
    /// latching while delivery is disabled.
    fn set_interrupt_enabled(&self, unit: UnitId, enabled: bool);

    /// Whether the unit's raw interrupt bit is set, delivered or not.
    fn interrupt_raw(&self, unit: UnitId) -> bool;

    /// The shared interrupt status: one bit per unit with a pending, enabled
    /// interrupt.
    fn interrupt_status(&self) -> u32;

    /// Clears the given unit bits in the shared interrupt status.
    fn clear_interrupt_status(&self, units: u32);

    /// Binds (or with `None`, unbinds) a per-unit interrupt routine. On
    /// peripherals with a single interrupt line this is a no-op.
    fn install_unit_handler(&self, unit: UnitId, handler: Option<IsrFn>);

    /// Binds the routine of the shared interrupt line. On peripherals with
    /// per-unit interrupts this is a no-op.
    fn install_shared_handler(&self, handler: IsrFn);
}
