//! # Pulse counter instances
//!
//! ## Overview
//! A [`PulseCounter`] is the application's handle on one counter unit. It is
//! created unallocated; [`PulseCounter::configure`] claims a unit from the
//! registry, routes the inputs and installs the unit's interrupt trampoline.
//! Dropping the counter gives the unit back.
//!
//! Every operation on an unallocated counter fails with
//! [`Error::Unallocated`] and touches no hardware. A failed allocation leaves
//! the counter unallocated, so the error surfaces at the `configure` call and
//! again at every later use until a `configure` succeeds.
//!
//! A freshly configured unit is paused with its counter cleared. Arm the
//! watch points, then [`resume`](PulseCounter::resume).
//!
//! ## Examples
//!
//! ```rust, no_run
//! use esp_pcnt::{Event, InputPin, PulseCounter};
//!
//! let mut counter: PulseCounter = PulseCounter::new();
//! counter.configure(InputPin::new(4), None)?;
//! counter.set_filter(100)?;
//! counter.set_watch_point(Event::Threshold0, 1000)?;
//! counter.set_watch_point(Event::HighLimit, 3000)?;
//! counter.enable_interrupt()?;
//! counter.resume()?;
//!
//! loop {
//!     if let Some(notification) = counter.take_events()? {
//!         if notification.events.contains(Event::HighLimit) {
//!             // ...
//!         }
//!     }
//! }
//! # Ok::<(), esp_pcnt::Error>(())
//! ```

use core::marker::PhantomData;

use enumset::EnumSet;

use crate::{
    Error,
    bridge::{EventHandler, Notification},
    channel::{Channel, ChannelMode, CtrlMode, EdgeMode, InputPin},
    dispatch::Trampolines,
    peripheral::PcntPeripheral,
    registry::{Global, RegistryHandle},
    unit::{ConfigError, Event, UnitId, ZeroMode, validate_filter, validate_watch_point},
};

/// Counter setup applied by [`PulseCounter::configure_with`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Config {
    /// The unit to claim. `None` claims the lowest free unit.
    pub unit: Option<UnitId>,
    /// The channel the inputs are routed to.
    pub channel: Channel,
    /// The signal input.
    pub signal: InputPin,
    /// The control input. `None` leaves it unconnected, which reads high.
    pub control: Option<InputPin>,
    /// Counting mode of the channel.
    pub mode: ChannelMode,
    /// Glitch filter threshold in APB cycles. `None` disables the filter.
    pub filter: Option<u16>,
}

impl Config {
    /// Count rising edges of `signal` on channel 0 of any free unit.
    pub fn new(signal: InputPin) -> Self {
        Self {
            unit: None,
            channel: Channel::Channel0,
            signal,
            control: None,
            mode: ChannelMode::default(),
            filter: None,
        }
    }

    /// Claim a specific unit.
    #[must_use]
    pub fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Route the inputs to `channel`.
    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// Connect a control input.
    #[must_use]
    pub fn with_control(mut self, control: InputPin) -> Self {
        self.control = Some(control);
        self
    }

    /// Assign the counting mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ChannelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable the glitch filter with the given threshold.
    #[must_use]
    pub fn with_filter(mut self, threshold: u16) -> Self {
        self.filter = Some(threshold);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.control == Some(self.signal) {
            return Err(ConfigError::SharedPin);
        }
        if let Some(threshold) = self.filter {
            validate_filter(threshold)?;
        }
        Ok(())
    }
}

/// One logical pulse counter, backed by a unit of registry `R`.
pub struct PulseCounter<R: RegistryHandle = Global> {
    unit: Option<UnitId>,
    channel: Channel,
    mode: ChannelMode,
    filter_threshold: u16,
    filter_enabled: bool,
    interrupt_enabled: bool,
    _registry: PhantomData<fn() -> R>,
}

impl<R: RegistryHandle> Default for PulseCounter<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RegistryHandle> core::fmt::Debug for PulseCounter<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseCounter")
            .field("unit", &self.unit)
            .field("channel", &self.channel)
            .field("interrupt_enabled", &self.interrupt_enabled)
            .finish()
    }
}

impl<R: RegistryHandle> PulseCounter<R> {
    /// Creates an unallocated counter.
    pub const fn new() -> Self {
        Self {
            unit: None,
            channel: Channel::Channel0,
            mode: ChannelMode::disabled(),
            filter_threshold: 0,
            filter_enabled: false,
            interrupt_enabled: false,
            _registry: PhantomData,
        }
    }

    /// The unit this counter owns.
    pub fn unit(&self) -> Option<UnitId> {
        self.unit
    }

    /// Whether this counter owns a unit.
    pub fn is_allocated(&self) -> bool {
        self.unit.is_some()
    }

    fn hw(&self) -> Result<(UnitId, &'static dyn PcntPeripheral), Error> {
        let unit = self.unit.ok_or(Error::Unallocated)?;
        let peripheral = R::registry().peripheral().ok_or(Error::NotInitialized)?;
        Ok((unit, peripheral))
    }

    /// Counts rising edges of `signal` on channel 0, claiming a unit if the
    /// counter has none yet.
    pub fn configure(
        &mut self,
        signal: InputPin,
        control: Option<InputPin>,
    ) -> Result<UnitId, Error> {
        let mut config = Config::new(signal);
        config.control = control;
        self.configure_with(&config)
    }

    /// Applies `config`, claiming a unit if the counter has none yet or owns
    /// a different one than `config` asks for.
    ///
    /// The unit is reset first: events are disarmed, the counter is cleared
    /// and paused, the interrupt is disabled and undelivered notifications
    /// are dropped. An attached callback stays attached. If the requested
    /// unit cannot be claimed, the counter keeps the unit it had.
    pub fn configure_with(&mut self, config: &Config) -> Result<UnitId, Error> {
        if let Err(e) = config.validate() {
            warn!("rejected counter configuration: {}", e);
            return Err(e.into());
        }

        let registry = R::registry();
        let peripheral = registry.peripheral().ok_or(Error::NotInitialized)?;

        let unit = match self.unit {
            Some(unit) if config.unit.is_none_or(|requested| requested == unit) => {
                registry.reset_events(unit);
                unit
            }
            _ => {
                // The current unit is only given up once the new one is ours.
                let claimed = registry.allocate(config.unit)?;
                if let Some(old) = self.unit {
                    let handler = critical_section::with(|cs| registry.owner(cs, old))
                        .and_then(|owner| owner.handler);
                    registry.update_owner(claimed, |owner| owner.handler = handler);
                }
                self.release();
                claimed
            }
        };

        peripheral.reset_unit(unit);
        peripheral.set_channel_inputs(unit, config.channel, Some(config.signal), config.control);
        peripheral.set_channel_mode(unit, config.channel, config.mode);
        peripheral.set_filter(unit, config.filter);
        peripheral.install_unit_handler(unit, Some(Trampolines::<R>::get(unit)));

        self.unit = Some(unit);
        self.channel = config.channel;
        self.mode = config.mode;
        self.filter_threshold = config.filter.unwrap_or(0);
        self.filter_enabled = config.filter.is_some();
        self.interrupt_enabled = false;

        debug!(
            "{} configured: channel {}, signal gpio{}",
            unit,
            config.channel.index(),
            config.signal.number()
        );
        Ok(unit)
    }

    /// Sets the edge action per signal polarity and the modification per
    /// control level. Input inversion is kept.
    pub fn set_mode(
        &mut self,
        pos_edge: EdgeMode,
        neg_edge: EdgeMode,
        hctrl_mode: CtrlMode,
        lctrl_mode: CtrlMode,
    ) -> Result<(), Error> {
        let mode = self
            .mode
            .with_pos_edge(pos_edge)
            .with_neg_edge(neg_edge)
            .with_hctrl_mode(hctrl_mode)
            .with_lctrl_mode(lctrl_mode);
        self.set_channel_mode(mode)
    }

    /// Replaces the whole channel mode.
    pub fn set_channel_mode(&mut self, mode: ChannelMode) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.set_channel_mode(unit, self.channel, mode);
        self.mode = mode;
        Ok(())
    }

    /// The channel mode last applied.
    pub fn channel_mode(&self) -> Result<ChannelMode, Error> {
        self.hw()?;
        Ok(self.mode)
    }

    /// Sets the glitch filter threshold in APB cycles and enables the
    /// filter. Pulses shorter than the threshold are ignored.
    pub fn set_filter(&mut self, threshold: u16) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        if let Err(e) = validate_filter(threshold) {
            warn!("{}: rejected filter threshold {}", unit, threshold);
            return Err(e.into());
        }
        hw.set_filter(unit, Some(threshold));
        self.filter_threshold = threshold;
        self.filter_enabled = true;
        Ok(())
    }

    /// Enables the filter with the last threshold set.
    pub fn enable_filter(&mut self) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.set_filter(unit, Some(self.filter_threshold));
        self.filter_enabled = true;
        Ok(())
    }

    /// Disables the filter. The threshold is kept.
    pub fn disable_filter(&mut self) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.set_filter(unit, None);
        self.filter_enabled = false;
        Ok(())
    }

    /// The filter threshold if the filter is enabled.
    pub fn filter(&self) -> Result<Option<u16>, Error> {
        self.hw()?;
        Ok(self.filter_enabled.then_some(self.filter_threshold))
    }

    /// Sets the value of a watch point and arms it.
    ///
    /// Reaching the low or high limit resets the counter to 0. The zero
    /// event has no value; arm it with
    /// [`enable_event`](Self::enable_event).
    pub fn set_watch_point(&mut self, event: Event, value: i16) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        if let Err(e) = validate_watch_point(event, value) {
            warn!("{}: rejected {} value {}", unit, event, value);
            return Err(e.into());
        }
        hw.set_watch_value(unit, event, value);
        hw.set_event_enabled(unit, event, true);
        Ok(())
    }

    /// The value of a watch point. The zero event reads 0.
    pub fn watch_point(&self, event: Event) -> Result<i16, Error> {
        let (unit, hw) = self.hw()?;
        match event {
            Event::Zero => Ok(0),
            _ => Ok(hw.watch_value(unit, event)),
        }
    }

    /// Arms a watch point with its current value.
    pub fn enable_event(&mut self, event: Event) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.set_event_enabled(unit, event, true);
        Ok(())
    }

    /// Disarms a watch point.
    pub fn disable_event(&mut self, event: Event) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.set_event_enabled(unit, event, false);
        Ok(())
    }

    /// The armed watch points.
    pub fn enabled_events(&self) -> Result<EnumSet<Event>, Error> {
        let (unit, hw) = self.hw()?;
        Ok(hw.enabled_events(unit))
    }

    /// The current count.
    pub fn count(&self) -> Result<i16, Error> {
        let (unit, hw) = self.hw()?;
        Ok(hw.counter(unit))
    }

    /// Stops counting.
    pub fn pause(&mut self) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.pause(unit);
        Ok(())
    }

    /// Resumes counting.
    pub fn resume(&mut self) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.resume(unit);
        Ok(())
    }

    /// Resets the count to zero without pausing or resuming.
    pub fn clear(&mut self) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.clear(unit);
        Ok(())
    }

    /// Enables interrupt delivery for the counter's unit. Events that
    /// latched while delivery was disabled are delivered right away.
    pub fn enable_interrupt(&mut self) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        self.interrupt_enabled = true;
        hw.set_interrupt_enabled(unit, true);
        Ok(())
    }

    /// Stops interrupt delivery. Watch points keep latching.
    pub fn disable_interrupt(&mut self) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        hw.set_interrupt_enabled(unit, false);
        self.interrupt_enabled = false;
        Ok(())
    }

    /// Whether interrupt delivery is enabled.
    pub fn interrupt_enabled(&self) -> Result<bool, Error> {
        self.hw()?;
        Ok(self.interrupt_enabled)
    }

    /// Whether the unit's raw interrupt bit is set, delivered or not.
    pub fn interrupt_is_set(&self) -> Result<bool, Error> {
        let (unit, hw) = self.hw()?;
        Ok(hw.interrupt_raw(unit))
    }

    /// Clears the unit's interrupt bit. Latched events are kept.
    pub fn reset_interrupt(&mut self) -> Result<(), Error> {
        let (unit, hw) = self.hw()?;
        critical_section::with(|_| hw.clear_interrupt_status(unit.mask()));
        Ok(())
    }

    /// Runs `handler` in interrupt context whenever the unit fires, in place
    /// of raising the counter's event flag. Replaces any earlier handler.
    pub fn attach_callback(&mut self, handler: EventHandler) -> Result<(), Error> {
        let unit = self.unit.ok_or(Error::Unallocated)?;
        if !R::registry().update_owner(unit, |owner| owner.handler = Some(handler)) {
            return Err(Error::Unallocated);
        }
        Ok(())
    }

    /// Removes the handler. Later events raise the counter's event flag.
    pub fn detach_callback(&mut self) -> Result<(), Error> {
        let unit = self.unit.ok_or(Error::Unallocated)?;
        if !R::registry().update_owner(unit, |owner| owner.handler = None) {
            return Err(Error::Unallocated);
        }
        Ok(())
    }

    /// The latched watch-point events. Reading does not acknowledge them.
    pub fn event_status(&self) -> Result<EnumSet<Event>, Error> {
        let (unit, hw) = self.hw()?;
        Ok(hw.event_status(unit))
    }

    /// Acknowledges every latched event and returns the acknowledged set.
    pub fn clear_event_status(&mut self) -> Result<EnumSet<Event>, Error> {
        let (unit, hw) = self.hw()?;
        Ok(critical_section::with(|_| {
            let events = hw.event_status(unit);
            hw.clear_event_status(unit, events);
            events
        }))
    }

    /// How the counter last reached zero.
    pub fn zero_mode(&self) -> Result<ZeroMode, Error> {
        let (unit, hw) = self.hw()?;
        Ok(hw.zero_mode(unit))
    }

    /// Whether events are waiting in the counter's event flag.
    pub fn has_pending_events(&self) -> Result<bool, Error> {
        let unit = self.unit.ok_or(Error::Unallocated)?;
        Ok(R::registry().slot(unit).events.is_raised())
    }

    /// Consumes the events waiting in the counter's event flag.
    pub fn take_events(&mut self) -> Result<Option<Notification>, Error> {
        let unit = self.unit.ok_or(Error::Unallocated)?;
        Ok(R::registry().slot(unit).events.take())
    }

    /// Stops the unit and returns it to the registry. Does nothing on an
    /// unallocated counter.
    pub fn release(&mut self) {
        let Some(unit) = self.unit.take() else {
            return;
        };
        let registry = R::registry();

        if let Some(hw) = registry.peripheral() {
            hw.pause(unit);
            hw.set_interrupt_enabled(unit, false);
            for event in EnumSet::<Event>::all() {
                hw.set_event_enabled(unit, event, false);
            }
            hw.install_unit_handler(unit, None);
        }
        registry.release(unit);
        self.interrupt_enabled = false;
    }
}

impl<R: RegistryHandle> Drop for PulseCounter<R> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bridge::InterruptContext,
        dispatch::dispatch,
        registry::{Registry, init_registry},
        sim::{Routing, SimulatedPcnt},
        unit::MAX_UNITS,
    };

    macro_rules! test_registry {
        ($name:ident) => {
            struct $name;
            impl RegistryHandle for $name {
                fn registry() -> &'static Registry {
                    static REGISTRY: Registry = Registry::new();
                    &REGISTRY
                }
            }
            static SIM: SimulatedPcnt = SimulatedPcnt::new(Routing::PerUnit);
            init_registry::<$name>(&SIM).unwrap();
        };
    }

    #[test]
    fn unallocated_counter_rejects_everything() {
        test_registry!(Idle);
        let mut counter = PulseCounter::<Idle>::new();

        assert_eq!(counter.count(), Err(Error::Unallocated));
        assert_eq!(counter.resume(), Err(Error::Unallocated));
        assert_eq!(counter.set_filter(10), Err(Error::Unallocated));
        assert_eq!(counter.set_watch_point(Event::Threshold0, 5), Err(Error::Unallocated));
        assert_eq!(counter.enable_interrupt(), Err(Error::Unallocated));
        assert_eq!(counter.take_events(), Err(Error::Unallocated));
        assert_eq!(Idle::registry().allocated_mask(), 0);

        counter.release();
        assert!(!counter.is_allocated());
    }

    #[test]
    fn configure_claims_and_routes() {
        test_registry!(Routed);
        let mut counter = PulseCounter::<Routed>::new();

        let unit = counter.configure(InputPin::new(4), Some(InputPin::new(5))).unwrap();
        assert_eq!(unit.number(), 0);
        assert_eq!(
            SIM.channel_inputs(unit, Channel::Channel0),
            (Some(InputPin::new(4)), Some(InputPin::new(5)))
        );
        assert_eq!(SIM.channel_mode(unit, Channel::Channel0), ChannelMode::default());
        assert!(SIM.has_unit_handler(unit));
        assert!(SIM.is_paused(unit));
        assert_eq!(counter.count(), Ok(0));
    }

    #[test]
    fn reconfigure_keeps_the_unit() {
        fn ignore(_: EnumSet<Event>, _: &InterruptContext<'_>) {}

        test_registry!(Again);
        let mut counter = PulseCounter::<Again>::new();

        let first = counter.configure(InputPin::new(4), None).unwrap();
        counter.attach_callback(EventHandler::new(ignore)).unwrap();
        let config = Config::new(InputPin::new(6))
            .with_channel(Channel::Channel1)
            .with_filter(50);
        assert_eq!(counter.configure_with(&config), Ok(first));
        assert_eq!(Again::registry().allocated_mask(), first.mask());
        assert_eq!(SIM.filter(first), Some(50));
        assert_eq!(counter.filter(), Ok(Some(50)));

        let other = UnitId::new(3).unwrap();
        assert_eq!(counter.configure_with(&config.with_unit(other)), Ok(other));
        assert_eq!(Again::registry().allocated_mask(), other.mask());
        assert!(!SIM.has_unit_handler(first));

        // the callback moved along with the counter
        SIM.force_event(other, Event::Threshold0);
        dispatch::<Again>(other.mask());
        assert!(!counter.has_pending_events().unwrap());
    }

    #[test]
    fn contested_unit_switch_keeps_the_current_unit() {
        test_registry!(Contested);
        let mut a = PulseCounter::<Contested>::new();
        let mut b = PulseCounter::<Contested>::new();
        let ua = a.configure(InputPin::new(4), None).unwrap();
        let ub = b.configure(InputPin::new(5), None).unwrap();
        a.set_watch_point(Event::Threshold0, 7).unwrap();

        let config = Config::new(InputPin::new(6)).with_unit(ub);
        assert_eq!(a.configure_with(&config), Err(Error::UnitInUse));

        assert_eq!(a.unit(), Some(ua));
        assert_eq!(b.unit(), Some(ub));
        assert_eq!(Contested::registry().allocated_mask(), ua.mask() | ub.mask());
        assert!(Contested::registry().is_consistent());
        assert!(SIM.has_unit_handler(ua));
        assert_eq!(a.watch_point(Event::Threshold0), Ok(7));
        assert_eq!(
            SIM.channel_inputs(ua, Channel::Channel0),
            (Some(InputPin::new(4)), None)
        );
    }

    #[test]
    fn reconfigure_drops_undelivered_notifications() {
        test_registry!(Stale);
        let mut counter = PulseCounter::<Stale>::new();
        let unit = counter.configure(InputPin::new(4), None).unwrap();

        SIM.force_event(unit, Event::HighLimit);
        dispatch::<Stale>(unit.mask());
        assert!(counter.has_pending_events().unwrap());

        assert_eq!(counter.configure(InputPin::new(4), None), Ok(unit));
        assert!(!counter.has_pending_events().unwrap());
        assert_eq!(counter.take_events(), Ok(None));
    }

    #[test]
    fn shared_pin_is_rejected() {
        test_registry!(Shared);
        let mut counter = PulseCounter::<Shared>::new();

        assert_eq!(
            counter.configure(InputPin::new(4), Some(InputPin::new(4))),
            Err(Error::InvalidConfiguration(ConfigError::SharedPin))
        );
        assert!(!counter.is_allocated());
        assert_eq!(Shared::registry().allocated_mask(), 0);
    }

    #[test]
    fn filter_can_be_toggled() {
        test_registry!(Filtered);
        let mut counter = PulseCounter::<Filtered>::new();
        let unit = counter.configure(InputPin::new(4), None).unwrap();

        assert_eq!(
            counter.set_filter(1024),
            Err(Error::InvalidConfiguration(ConfigError::FilterThresholdTooLarge))
        );
        assert_eq!(counter.filter(), Ok(None));

        counter.set_filter(1000).unwrap();
        assert_eq!(SIM.filter(unit), Some(1000));
        counter.disable_filter().unwrap();
        assert_eq!(SIM.filter(unit), None);
        assert_eq!(counter.filter(), Ok(None));
        counter.enable_filter().unwrap();
        assert_eq!(SIM.filter(unit), Some(1000));
    }

    #[test]
    fn watch_points_round_trip_and_arm() {
        test_registry!(Watched);
        let mut counter = PulseCounter::<Watched>::new();
        counter.configure(InputPin::new(4), None).unwrap();

        counter.set_watch_point(Event::Threshold1, -20).unwrap();
        counter.set_watch_point(Event::LowLimit, -100).unwrap();
        assert_eq!(counter.watch_point(Event::Threshold1), Ok(-20));
        assert_eq!(counter.watch_point(Event::LowLimit), Ok(-100));
        assert_eq!(counter.watch_point(Event::Zero), Ok(0));
        assert_eq!(counter.enabled_events(), Ok(Event::Threshold1 | Event::LowLimit));

        assert_eq!(
            counter.set_watch_point(Event::HighLimit, -1),
            Err(Error::InvalidConfiguration(ConfigError::InvalidHighLimit))
        );
        assert_eq!(
            counter.set_watch_point(Event::Zero, 0),
            Err(Error::InvalidConfiguration(ConfigError::ZeroHasNoValue))
        );

        counter.disable_event(Event::LowLimit).unwrap();
        counter.enable_event(Event::Zero).unwrap();
        assert_eq!(counter.enabled_events(), Ok(Event::Threshold1 | Event::Zero));
    }

    #[test]
    fn exhausted_counter_stays_unallocated() {
        test_registry!(Crowded);
        let mut counters: [PulseCounter<Crowded>; MAX_UNITS] =
            core::array::from_fn(|_| PulseCounter::new());
        for (pin, counter) in counters.iter_mut().enumerate() {
            counter.configure(InputPin::new(pin as u8), None).unwrap();
        }

        let mut extra = PulseCounter::<Crowded>::new();
        assert_eq!(extra.configure(InputPin::new(20), None), Err(Error::Exhausted));
        assert_eq!(extra.count(), Err(Error::Unallocated));
        drop(extra);
        assert_eq!(Crowded::registry().allocated_mask().count_ones() as usize, MAX_UNITS);

        counters[1].release();
        let mut retry = PulseCounter::<Crowded>::new();
        assert_eq!(retry.configure(InputPin::new(20), None).map(UnitId::number), Ok(1));
    }

    #[test]
    fn drop_releases_the_unit() {
        test_registry!(Dropped);
        let unit = {
            let mut counter = PulseCounter::<Dropped>::new();
            let unit = counter.configure(InputPin::new(4), None).unwrap();
            counter.enable_interrupt().unwrap();
            unit
        };

        assert!(!Dropped::registry().is_allocated(unit));
        assert!(!SIM.has_unit_handler(unit));
        assert!(SIM.is_paused(unit));
        assert_eq!(SIM.enabled_events(unit), EnumSet::empty());
        assert!(Dropped::registry().is_consistent());
    }
}
