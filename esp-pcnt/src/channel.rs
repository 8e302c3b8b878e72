//! # PCNT - channel configuration
//!
//! ## Overview
//! Every unit has two channels. A channel watches one signal input for edges
//! and one control input for its level, and decides per edge polarity and
//! per control level whether the unit's counter goes up, down or stays put.

/// Channel number within a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Channel 0
    #[default]
    Channel0 = 0,
    /// Channel 1
    Channel1 = 1,
}

impl Channel {
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// Action taken on a signal edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeMode {
    /// Keep the current count.
    #[default]
    Hold,
    /// Increase the count.
    Increment,
    /// Decrease the count.
    Decrement,
}

/// How the control input level modifies the edge action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CtrlMode {
    /// Use the edge action as configured.
    #[default]
    Keep,
    /// Swap increment and decrement.
    Reverse,
    /// Do not count.
    Disable,
}

impl CtrlMode {
    /// The counter step of an edge whose configured action is `edge`.
    pub fn apply(self, edge: EdgeMode) -> i16 {
        let step = match edge {
            EdgeMode::Hold => 0,
            EdgeMode::Increment => 1,
            EdgeMode::Decrement => -1,
        };
        match self {
            CtrlMode::Keep => step,
            CtrlMode::Reverse => -step,
            CtrlMode::Disable => 0,
        }
    }
}

/// Counting mode of a single channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct ChannelMode {
    /// Action on a rising edge of the signal input.
    pub pos_edge: EdgeMode,
    /// Action on a falling edge of the signal input.
    pub neg_edge: EdgeMode,
    /// Modification while the control input is high.
    pub hctrl_mode: CtrlMode,
    /// Modification while the control input is low.
    pub lctrl_mode: CtrlMode,
    /// Invert the signal input before edge detection.
    pub invert_sig: bool,
    /// Invert the control input before level detection.
    pub invert_ctrl: bool,
}

impl Default for ChannelMode {
    fn default() -> Self {
        Self {
            pos_edge: EdgeMode::Increment,
            neg_edge: EdgeMode::Hold,
            hctrl_mode: CtrlMode::Keep,
            lctrl_mode: CtrlMode::Keep,
            invert_sig: false,
            invert_ctrl: false,
        }
    }
}

impl ChannelMode {
    /// A mode in which the channel never counts. This is what a unit reset
    /// leaves behind.
    pub const fn disabled() -> Self {
        Self {
            pos_edge: EdgeMode::Hold,
            neg_edge: EdgeMode::Hold,
            hctrl_mode: CtrlMode::Keep,
            lctrl_mode: CtrlMode::Keep,
            invert_sig: false,
            invert_ctrl: false,
        }
    }

    /// Assign the rising edge action.
    #[must_use]
    pub fn with_pos_edge(mut self, mode: EdgeMode) -> Self {
        self.pos_edge = mode;
        self
    }

    /// Assign the falling edge action.
    #[must_use]
    pub fn with_neg_edge(mut self, mode: EdgeMode) -> Self {
        self.neg_edge = mode;
        self
    }

    /// Assign the modification while the control input is high.
    #[must_use]
    pub fn with_hctrl_mode(mut self, mode: CtrlMode) -> Self {
        self.hctrl_mode = mode;
        self
    }

    /// Assign the modification while the control input is low.
    #[must_use]
    pub fn with_lctrl_mode(mut self, mode: CtrlMode) -> Self {
        self.lctrl_mode = mode;
        self
    }

    /// Invert the signal input.
    #[must_use]
    pub fn with_invert_sig(mut self, invert: bool) -> Self {
        self.invert_sig = invert;
        self
    }

    /// Invert the control input.
    #[must_use]
    pub fn with_invert_ctrl(mut self, invert: bool) -> Self {
        self.invert_ctrl = invert;
        self
    }

    /// The counter step for an edge, given the (already inverted) signal
    /// edge polarity and control level.
    pub fn step(&self, rising: bool, control_high: bool) -> i16 {
        let edge = if rising { self.pos_edge } else { self.neg_edge };
        let ctrl = if control_high {
            self.hctrl_mode
        } else {
            self.lctrl_mode
        };
        ctrl.apply(edge)
    }
}

/// A GPIO routed to a channel input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputPin(u8);

impl InputPin {
    /// Routes GPIO number `gpio`.
    pub const fn new(gpio: u8) -> Self {
        Self(gpio)
    }

    /// The GPIO number.
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl From<u8> for InputPin {
    fn from(gpio: u8) -> Self {
        Self(gpio)
    }
}
