//! # Software pulse counter
//!
//! [`SimulatedPcnt`] models the ESP32 PCNT block closely enough to run the
//! driver without hardware. Input edges are injected per GPIO with
//! [`SimulatedPcnt::set_level`], [`SimulatedPcnt::pulse`] and
//! [`SimulatedPcnt::pulse_n`]; every channel routed to that GPIO reacts as the
//! hardware would:
//!
//! - the glitch filter drops pulses shorter than its threshold,
//! - the channel mode decides the step from the edge polarity and the
//!   control level (an unconnected control input reads high),
//! - after each step the watch points are compared. Reaching an armed limit
//!   resets the counter to 0; with the limit disarmed the counter wraps.
//!
//! Latching an event sets the unit's raw interrupt bit. If the unit's
//! interrupt is enabled, the installed routine runs right away on the
//! injecting thread, after the model's own state has been unlocked.
//!
//! A unit leaves [`PcntPeripheral::reset_unit`] paused with a cleared counter,
//! like the hardware after `pcnt_unit_config`.

use enumset::EnumSet;

use crate::{
    channel::{Channel, ChannelMode, InputPin},
    peripheral::{IsrFn, PcntPeripheral},
    sync::Locked,
    unit::{Event, MAX_UNITS, UnitId, ZeroMode},
};

/// Capacity of the interrupt-status clear log.
pub const CLEAR_LOG_CAPACITY: usize = 64;

/// How the model raises interrupts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Routing {
    /// Every unit has its own interrupt routine.
    PerUnit,
    /// All units share one interrupt line and one routine.
    Shared,
}

#[derive(Clone, Copy)]
struct ChannelState {
    signal: Option<InputPin>,
    control: Option<InputPin>,
    mode: ChannelMode,
}

impl ChannelState {
    const RESET: Self = Self {
        signal: None,
        control: None,
        mode: ChannelMode::disabled(),
    };
}

#[derive(Clone, Copy)]
struct UnitState {
    channels: [ChannelState; 2],
    count: i16,
    paused: bool,
    filter: Option<u16>,
    // threshold 1, threshold 0, low limit, high limit
    watch: [i16; 4],
    enabled: EnumSet<Event>,
    status: EnumSet<Event>,
    zero_mode: ZeroMode,
    int_enabled: bool,
    int_raw: bool,
    handler: Option<IsrFn>,
}

impl UnitState {
    const RESET: Self = Self {
        channels: [ChannelState::RESET; 2],
        count: 0,
        paused: true,
        filter: None,
        watch: [0; 4],
        enabled: EnumSet::empty(),
        status: EnumSet::empty(),
        zero_mode: ZeroMode::PosZero,
        int_enabled: false,
        int_raw: false,
        handler: None,
    };

    fn watch_index(event: Event) -> Option<usize> {
        match event {
            Event::Threshold1 => Some(0),
            Event::Threshold0 => Some(1),
            Event::LowLimit => Some(2),
            Event::HighLimit => Some(3),
            Event::Zero => None,
        }
    }

    fn watch(&self, event: Event) -> i16 {
        Self::watch_index(event).map_or(0, |i| self.watch[i])
    }

    /// Applies one counter step and latches whatever it matches. Returns the
    /// newly latched events.
    fn step(&mut self, step: i16) -> EnumSet<Event> {
        let prev = self.count;
        let mut next = prev.wrapping_add(step);
        let mut latched = EnumSet::empty();

        for event in [Event::Threshold0, Event::Threshold1] {
            if self.enabled.contains(event) && next == self.watch(event) {
                latched |= event;
            }
        }

        let mut limit_reset = false;
        for event in [Event::HighLimit, Event::LowLimit] {
            if self.enabled.contains(event) && next == self.watch(event) {
                latched |= event;
                limit_reset = true;
            }
        }
        if limit_reset {
            next = 0;
        }

        self.zero_mode = match next {
            0 if prev > 0 => ZeroMode::PosZero,
            0 => ZeroMode::NegZero,
            n if n < 0 => ZeroMode::Negative,
            _ => ZeroMode::Positive,
        };
        if next == 0 && !limit_reset && self.enabled.contains(Event::Zero) {
            latched |= Event::Zero;
        }

        self.count = next;
        self.latch(latched);
        latched
    }

    fn latch(&mut self, events: EnumSet<Event>) {
        if !events.is_empty() {
            self.status |= events;
            self.int_raw = true;
        }
    }
}

struct State {
    levels: u64,
    units: [UnitState; MAX_UNITS],
    shared_handler: Option<IsrFn>,
    clears: heapless::Vec<u32, CLEAR_LOG_CAPACITY>,
}

impl State {
    fn level(&self, pin: InputPin) -> bool {
        1u64.checked_shl(pin.number() as u32)
            .is_some_and(|bit| self.levels & bit != 0)
    }

    fn unit(&mut self, unit: UnitId) -> &mut UnitState {
        &mut self.units[unit.index()]
    }
}

/// Routines to run once the model is unlocked.
#[derive(Default)]
struct Fire {
    handlers: heapless::Vec<IsrFn, MAX_UNITS>,
}

impl Fire {
    fn run(self) {
        for handler in self.handlers {
            handler();
        }
    }
}

/// Software model of the PCNT peripheral.
pub struct SimulatedPcnt {
    routing: Routing,
    state: Locked<State>,
}

impl SimulatedPcnt {
    /// Creates a model with every unit in its reset state and all GPIOs low.
    pub const fn new(routing: Routing) -> Self {
        Self {
            routing,
            state: Locked::new(State {
                levels: 0,
                units: [UnitState::RESET; MAX_UNITS],
                shared_handler: None,
                clears: heapless::Vec::new(),
            }),
        }
    }

    /// The interrupt routing of this model.
    pub fn routing(&self) -> Routing {
        self.routing
    }

    /// The current level of a GPIO.
    pub fn level(&self, gpio: u8) -> bool {
        self.state.with(|state| state.level(InputPin::new(gpio)))
    }

    /// Drives a GPIO to `high`. A level change is an edge that lasts forever
    /// and so passes every glitch filter.
    pub fn set_level(&self, gpio: u8, high: bool) {
        self.edge(InputPin::new(gpio), high, u32::MAX);
    }

    /// Toggles a GPIO for `width_cycles` APB cycles and back.
    ///
    /// Units whose glitch filter threshold exceeds the width see neither
    /// edge.
    pub fn pulse(&self, gpio: u8, width_cycles: u32) {
        let pin = InputPin::new(gpio);
        let idle = self.state.with(|state| state.level(pin));
        self.edge(pin, !idle, width_cycles);
        self.edge(pin, idle, width_cycles);
    }

    /// Emits `n` pulses of `width_cycles` each.
    pub fn pulse_n(&self, gpio: u8, n: usize, width_cycles: u32) {
        for _ in 0..n {
            self.pulse(gpio, width_cycles);
        }
    }

    /// Latches `event` on `unit` as if its comparator had matched, without
    /// running any interrupt routine.
    pub fn force_event(&self, unit: UnitId, event: Event) {
        self.state.with(|state| state.unit(unit).latch(event.into()));
    }

    /// Bitmask of the units whose raw interrupt bit is set, enabled or not.
    pub fn raw_interrupts(&self) -> u32 {
        self.state.with(|state| {
            UnitId::all()
                .filter(|u| state.units[u.index()].int_raw)
                .fold(0, |mask, u| mask | u.mask())
        })
    }

    /// Whether `unit` is paused.
    pub fn is_paused(&self, unit: UnitId) -> bool {
        self.state.with(|state| state.unit(unit).paused)
    }

    /// The glitch filter threshold of `unit`, if the filter is enabled.
    pub fn filter(&self, unit: UnitId) -> Option<u16> {
        self.state.with(|state| state.unit(unit).filter)
    }

    /// The channel mode of `unit`'s `channel`.
    pub fn channel_mode(&self, unit: UnitId, channel: Channel) -> ChannelMode {
        self.state
            .with(|state| state.unit(unit).channels[channel.index()].mode)
    }

    /// The inputs routed to `unit`'s `channel`, as `(signal, control)`.
    pub fn channel_inputs(
        &self,
        unit: UnitId,
        channel: Channel,
    ) -> (Option<InputPin>, Option<InputPin>) {
        self.state.with(|state| {
            let ch = state.unit(unit).channels[channel.index()];
            (ch.signal, ch.control)
        })
    }

    /// Whether a per-unit routine is installed for `unit`.
    pub fn has_unit_handler(&self, unit: UnitId) -> bool {
        self.state.with(|state| state.unit(unit).handler.is_some())
    }

    /// Drains the masks passed to
    /// [`clear_interrupt_status`](PcntPeripheral::clear_interrupt_status),
    /// oldest first. Clears beyond the log capacity are not recorded.
    pub fn take_clear_log(&self) -> heapless::Vec<u32, CLEAR_LOG_CAPACITY> {
        self.state.with(|state| core::mem::take(&mut state.clears))
    }

    fn edge(&self, pin: InputPin, high: bool, width: u32) {
        let fire = self.state.with(|state| {
            let Some(bit) = 1u64.checked_shl(pin.number() as u32) else {
                return Fire::default();
            };
            let was_high = state.levels & bit != 0;
            if was_high == high {
                return Fire::default();
            }
            if high {
                state.levels |= bit;
            } else {
                state.levels &= !bit;
            }

            let levels = state.levels;
            let level_of = |pin: InputPin| {
                1u64.checked_shl(pin.number() as u32)
                    .is_some_and(|bit| levels & bit != 0)
            };

            let mut latched_units = 0u32;
            for unit in UnitId::all() {
                let u = state.unit(unit);
                if u.paused || u.filter.is_some_and(|t| width < t as u32) {
                    continue;
                }
                for ch in 0..u.channels.len() {
                    let channel = u.channels[ch];
                    if channel.signal != Some(pin) {
                        continue;
                    }
                    let rising = high != channel.mode.invert_sig;
                    let control =
                        channel.control.map_or(true, level_of) != channel.mode.invert_ctrl;
                    let step = channel.mode.step(rising, control);
                    if step != 0 && !u.step(step).is_empty() {
                        latched_units |= unit.mask();
                    }
                }
            }

            self.pending_fire(state, latched_units)
        });
        fire.run();
    }

    fn pending_fire(&self, state: &State, units: u32) -> Fire {
        let mut fire = Fire::default();
        match self.routing {
            Routing::PerUnit => {
                for unit in UnitId::iter_mask(units) {
                    let u = &state.units[unit.index()];
                    if let (true, Some(handler)) = (u.int_enabled, u.handler) {
                        let _ = fire.handlers.push(handler);
                    }
                }
            }
            Routing::Shared => {
                let active = UnitId::iter_mask(units).any(|u| state.units[u.index()].int_enabled);
                if let (true, Some(handler)) = (active, state.shared_handler) {
                    let _ = fire.handlers.push(handler);
                }
            }
        }
        fire
    }
}

impl PcntPeripheral for SimulatedPcnt {
    fn reset_unit(&self, unit: UnitId) {
        self.state.with(|state| {
            let u = state.unit(unit);
            *u = UnitState {
                handler: u.handler,
                ..UnitState::RESET
            };
        });
    }

    fn set_channel_inputs(
        &self,
        unit: UnitId,
        channel: Channel,
        signal: Option<InputPin>,
        control: Option<InputPin>,
    ) {
        self.state.with(|state| {
            let ch = &mut state.unit(unit).channels[channel.index()];
            ch.signal = signal;
            ch.control = control;
        });
    }

    fn set_channel_mode(&self, unit: UnitId, channel: Channel, mode: ChannelMode) {
        self.state
            .with(|state| state.unit(unit).channels[channel.index()].mode = mode);
    }

    fn counter(&self, unit: UnitId) -> i16 {
        self.state.with(|state| state.unit(unit).count)
    }

    fn pause(&self, unit: UnitId) {
        self.state.with(|state| state.unit(unit).paused = true);
    }

    fn resume(&self, unit: UnitId) {
        self.state.with(|state| state.unit(unit).paused = false);
    }

    fn clear(&self, unit: UnitId) {
        self.state.with(|state| {
            let u = state.unit(unit);
            u.count = 0;
            u.zero_mode = ZeroMode::PosZero;
        });
    }

    fn set_filter(&self, unit: UnitId, threshold: Option<u16>) {
        self.state.with(|state| state.unit(unit).filter = threshold);
    }

    fn set_watch_value(&self, unit: UnitId, event: Event, value: i16) {
        self.state.with(|state| {
            if let Some(i) = UnitState::watch_index(event) {
                state.unit(unit).watch[i] = value;
            }
        });
    }

    fn watch_value(&self, unit: UnitId, event: Event) -> i16 {
        self.state.with(|state| state.unit(unit).watch(event))
    }

    fn set_event_enabled(&self, unit: UnitId, event: Event, enabled: bool) {
        self.state.with(|state| {
            let u = state.unit(unit);
            if enabled {
                u.enabled |= event;
            } else {
                u.enabled -= event;
            }
        });
    }

    fn enabled_events(&self, unit: UnitId) -> EnumSet<Event> {
        self.state.with(|state| state.unit(unit).enabled)
    }

    fn event_status(&self, unit: UnitId) -> EnumSet<Event> {
        self.state.with(|state| state.unit(unit).status)
    }

    fn clear_event_status(&self, unit: UnitId, events: EnumSet<Event>) {
        self.state.with(|state| state.unit(unit).status -= events);
    }

    fn zero_mode(&self, unit: UnitId) -> ZeroMode {
        self.state.with(|state| state.unit(unit).zero_mode)
    }

    fn set_interrupt_enabled(&self, unit: UnitId, enabled: bool) {
        let fire = self.state.with(|state| {
            let u = state.unit(unit);
            u.int_enabled = enabled;
            if enabled && u.int_raw {
                self.pending_fire(state, unit.mask())
            } else {
                Fire::default()
            }
        });
        fire.run();
    }

    fn interrupt_raw(&self, unit: UnitId) -> bool {
        self.state.with(|state| state.unit(unit).int_raw)
    }

    fn interrupt_status(&self) -> u32 {
        self.state.with(|state| {
            UnitId::all()
                .filter(|u| {
                    let u = &state.units[u.index()];
                    u.int_raw && u.int_enabled
                })
                .fold(0, |mask, u| mask | u.mask())
        })
    }

    fn clear_interrupt_status(&self, units: u32) {
        self.state.with(|state| {
            for unit in UnitId::iter_mask(units) {
                state.unit(unit).int_raw = false;
            }
            let _ = state.clears.push(units);
        });
    }

    fn install_unit_handler(&self, unit: UnitId, handler: Option<IsrFn>) {
        if self.routing == Routing::PerUnit {
            self.state.with(|state| state.unit(unit).handler = handler);
        }
    }

    fn install_shared_handler(&self, handler: IsrFn) {
        if self.routing == Routing::Shared {
            self.state.with(|state| state.shared_handler = Some(handler));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CtrlMode, EdgeMode};

    const SIG: u8 = 4;
    const CTRL: u8 = 5;

    fn unit(n: u8) -> UnitId {
        UnitId::new(n).unwrap()
    }

    fn counting_unit(sim: &SimulatedPcnt, mode: ChannelMode) -> UnitId {
        let u = unit(0);
        sim.set_channel_inputs(u, Channel::Channel0, Some(InputPin::new(SIG)), None);
        sim.set_channel_mode(u, Channel::Channel0, mode);
        sim.resume(u);
        u
    }

    #[test]
    fn reset_units_are_paused() {
        let sim = SimulatedPcnt::new(Routing::PerUnit);
        let u = unit(0);
        sim.set_channel_inputs(u, Channel::Channel0, Some(InputPin::new(SIG)), None);
        sim.set_channel_mode(u, Channel::Channel0, ChannelMode::default());

        sim.pulse_n(SIG, 5, 100);
        assert_eq!(sim.counter(u), 0);
        assert!(sim.is_paused(u));
    }

    #[test]
    fn edges_follow_channel_mode() {
        let sim = SimulatedPcnt::new(Routing::PerUnit);
        let mode = ChannelMode::default()
            .with_pos_edge(EdgeMode::Increment)
            .with_neg_edge(EdgeMode::Increment);
        let u = counting_unit(&sim, mode);

        sim.pulse_n(SIG, 3, 100);
        assert_eq!(sim.counter(u), 6);
        assert!(!sim.level(SIG));

        sim.set_channel_mode(
            u,
            Channel::Channel0,
            mode.with_invert_sig(true).with_neg_edge(EdgeMode::Decrement),
        );
        // inverted: the rising edge counts as falling
        sim.set_level(SIG, true);
        assert_eq!(sim.counter(u), 5);
    }

    #[test]
    fn control_level_reverses_direction() {
        let sim = SimulatedPcnt::new(Routing::PerUnit);
        let u = counting_unit(
            &sim,
            ChannelMode::default().with_lctrl_mode(CtrlMode::Reverse),
        );
        sim.set_channel_inputs(
            u,
            Channel::Channel0,
            Some(InputPin::new(SIG)),
            Some(InputPin::new(CTRL)),
        );

        sim.pulse_n(SIG, 2, 100);
        assert_eq!(sim.counter(u), -2);
        sim.set_level(CTRL, true);
        sim.pulse_n(SIG, 5, 100);
        assert_eq!(sim.counter(u), 3);
    }

    #[test]
    fn filter_drops_short_pulses() {
        let sim = SimulatedPcnt::new(Routing::PerUnit);
        let u = counting_unit(&sim, ChannelMode::default());
        sim.set_filter(u, Some(100));

        sim.pulse(SIG, 99);
        assert_eq!(sim.counter(u), 0);
        sim.pulse(SIG, 100);
        assert_eq!(sim.counter(u), 1);
    }

    #[test]
    fn limits_reset_or_wrap() {
        let sim = SimulatedPcnt::new(Routing::PerUnit);
        let u = counting_unit(&sim, ChannelMode::default());

        sim.set_watch_value(u, Event::HighLimit, 3);
        sim.set_event_enabled(u, Event::HighLimit, true);
        sim.pulse_n(SIG, 3, 1);
        assert_eq!(sim.counter(u), 0);
        assert_eq!(sim.event_status(u), EnumSet::only(Event::HighLimit));
        assert!(sim.interrupt_raw(u));

        sim.set_event_enabled(u, Event::HighLimit, false);
        sim.clear_event_status(u, EnumSet::all());
        sim.pulse_n(SIG, 3, 1);
        assert_eq!(sim.counter(u), 3);
        assert_eq!(sim.event_status(u), EnumSet::empty());
    }

    #[test]
    fn zero_crossing_sets_zero_mode() {
        let sim = SimulatedPcnt::new(Routing::PerUnit);
        let mode = ChannelMode::default()
            .with_pos_edge(EdgeMode::Decrement)
            .with_neg_edge(EdgeMode::Increment);
        let u = counting_unit(&sim, mode);
        sim.set_event_enabled(u, Event::Zero, true);

        sim.set_level(SIG, true);
        assert_eq!(sim.counter(u), -1);
        assert_eq!(sim.zero_mode(u), ZeroMode::Negative);
        sim.set_level(SIG, false);
        assert_eq!(sim.counter(u), 0);
        assert_eq!(sim.zero_mode(u), ZeroMode::NegZero);
        assert_eq!(sim.event_status(u), EnumSet::only(Event::Zero));
    }

    #[test]
    fn clears_are_logged() {
        let sim = SimulatedPcnt::new(Routing::Shared);
        sim.force_event(unit(1), Event::Threshold0);
        assert_eq!(sim.raw_interrupts(), unit(1).mask());
        assert_eq!(sim.interrupt_status(), 0);

        sim.clear_interrupt_status(unit(1).mask());
        assert_eq!(sim.raw_interrupts(), 0);
        assert_eq!(sim.take_clear_log().as_slice(), &[unit(1).mask()]);
        assert!(sim.take_clear_log().is_empty());
    }
}
