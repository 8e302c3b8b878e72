//! # PCNT - units and watch-point events
//!
//! ## Overview
//! A unit is one independent 16-bit signed counter with two input channels
//! and five watch points. Units are identified by a [`UnitId`] in
//! `0..MAX_UNITS`; the [`Registry`](crate::Registry) hands them out to
//! [`PulseCounter`](crate::PulseCounter)s.
//!
//! Each watch point is an [`Event`]. A set of events is an
//! [`EnumSet<Event>`](enumset::EnumSet), whose raw representation follows the bit positions of
//! the unit status register.

use core::fmt::Display;

use enumset::EnumSetType;

cfg_if::cfg_if! {
    if #[cfg(any(
        feature = "esp32s2",
        feature = "esp32s3",
        feature = "esp32c6",
        feature = "esp32h2"
    ))] {
        /// Number of counter units in the peripheral.
        pub const MAX_UNITS: usize = 4;
    } else {
        /// Number of counter units in the peripheral.
        pub const MAX_UNITS: usize = 8;
    }
}

/// Mask with one bit set for every unit in the peripheral.
pub(crate) const ALL_UNITS: u32 = (1 << MAX_UNITS) - 1;

/// Largest glitch filter threshold the hardware accepts (10-bit field).
pub const MAX_FILTER_THRESHOLD: u16 = 1023;

/// Identifies one hardware counter unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnitId(u8);

impl UnitId {
    /// Returns the unit with the given number, or `None` if the peripheral
    /// has no such unit.
    pub const fn new(number: u8) -> Option<Self> {
        if (number as usize) < MAX_UNITS {
            Some(Self(number))
        } else {
            None
        }
    }

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u8)
    }

    /// The unit number.
    pub const fn number(self) -> u8 {
        self.0
    }

    /// The unit number as an index into per-unit tables.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// This unit's bit in the interrupt status and allocation masks.
    pub const fn mask(self) -> u32 {
        1 << self.0
    }

    /// Iterates over every unit of the peripheral in increasing order.
    pub fn all() -> impl Iterator<Item = UnitId> {
        (0..MAX_UNITS).map(Self::from_index)
    }

    /// Iterates over the units whose bits are set in `mask`, lowest first.
    /// Bits beyond the peripheral's unit count are ignored.
    pub fn iter_mask(mask: u32) -> impl Iterator<Item = UnitId> {
        let mut pending = mask & ALL_UNITS;
        core::iter::from_fn(move || {
            if pending == 0 {
                return None;
            }
            let pos = pending.trailing_zeros();
            pending &= !(1 << pos);
            Some(Self(pos as u8))
        })
    }
}

impl Display for UnitId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unit{}", self.0)
    }
}

impl TryFrom<u8> for UnitId {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(crate::Error::InvalidUnit)
    }
}

/// Watch-point events of a pulse counter unit.
///
/// The discriminants are the bit positions in the unit status register.
#[derive(Debug, Hash, EnumSetType, strum::Display)]
#[enumset(repr = "u8")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The count equals the threshold 1 value.
    Threshold1 = 2,
    /// The count equals the threshold 0 value.
    Threshold0 = 3,
    /// The count reached the low limit. The counter resets to 0.
    LowLimit   = 4,
    /// The count reached the high limit. The counter resets to 0.
    HighLimit  = 5,
    /// The count reached zero.
    Zero       = 6,
}

/// How the counter arrived at zero the last time it did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ZeroMode {
    /// The counter decreased from positive to 0.
    #[default]
    PosZero  = 0,
    /// The counter increased from negative to 0.
    NegZero  = 1,
    /// The counter is negative.
    Negative = 2,
    /// The counter is positive.
    Positive = 3,
}

/// Rejected configuration values.
///
/// These are always reported by the call that supplied the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum ConfigError {
    /// The control input uses the same pin as the signal input.
    #[strum(to_string = "control input uses the signal pin")]
    SharedPin,
    /// The glitch filter threshold does not fit the 10-bit field.
    #[strum(to_string = "filter threshold above 1023 cycles")]
    FilterThresholdTooLarge,
    /// The low limit must be negative.
    #[strum(to_string = "low limit must be negative")]
    InvalidLowLimit,
    /// The high limit must be positive.
    #[strum(to_string = "high limit must be positive")]
    InvalidHighLimit,
    /// The zero event has no configurable value.
    #[strum(to_string = "the zero event has no value")]
    ZeroHasNoValue,
}

impl core::error::Error for ConfigError {}

/// Checks a watch-point value against the limits the hardware accepts.
pub(crate) fn validate_watch_point(event: Event, value: i16) -> Result<(), ConfigError> {
    match event {
        Event::Zero => Err(ConfigError::ZeroHasNoValue),
        // A low limit of zero or above is never reached the way the hardware
        // compares it; i16::MIN is reported as a high limit event.
        Event::LowLimit if !value.is_negative() || value == i16::MIN => {
            Err(ConfigError::InvalidLowLimit)
        }
        Event::HighLimit if !value.is_positive() => Err(ConfigError::InvalidHighLimit),
        _ => Ok(()),
    }
}

pub(crate) fn validate_filter(threshold: u16) -> Result<(), ConfigError> {
    if threshold > MAX_FILTER_THRESHOLD {
        Err(ConfigError::FilterThresholdTooLarge)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;

    use super::*;

    #[test]
    fn unit_ids_are_bounded() {
        assert!(UnitId::new(0).is_some());
        assert!(UnitId::new(MAX_UNITS as u8 - 1).is_some());
        assert!(UnitId::new(MAX_UNITS as u8).is_none());
        assert_eq!(UnitId::try_from(200), Err(crate::Error::InvalidUnit));
    }

    #[test]
    fn mask_iteration_is_lowest_first_and_bounded() {
        let units: heapless::Vec<u8, 8> = UnitId::iter_mask(0b1010_0101 | (1 << 20))
            .map(UnitId::number)
            .collect();
        if MAX_UNITS == 8 {
            assert_eq!(units.as_slice(), &[0, 2, 5, 7]);
        } else {
            assert_eq!(units.as_slice(), &[0, 2]);
        }
    }

    #[test]
    fn event_bits_follow_status_register() {
        assert_eq!(EnumSet::only(Event::Threshold1).as_repr(), 1 << 2);
        assert_eq!(EnumSet::only(Event::Threshold0).as_repr(), 1 << 3);
        assert_eq!(EnumSet::only(Event::LowLimit).as_repr(), 1 << 4);
        assert_eq!(EnumSet::only(Event::HighLimit).as_repr(), 1 << 5);
        assert_eq!(EnumSet::only(Event::Zero).as_repr(), 1 << 6);
    }

    #[test]
    fn limits_are_validated() {
        assert_eq!(validate_watch_point(Event::LowLimit, 0), Err(ConfigError::InvalidLowLimit));
        assert_eq!(
            validate_watch_point(Event::LowLimit, i16::MIN),
            Err(ConfigError::InvalidLowLimit)
        );
        assert_eq!(validate_watch_point(Event::LowLimit, -5), Ok(()));
        assert_eq!(validate_watch_point(Event::HighLimit, 0), Err(ConfigError::InvalidHighLimit));
        assert_eq!(validate_watch_point(Event::HighLimit, 30), Ok(()));
        assert_eq!(validate_watch_point(Event::Threshold0, -30), Ok(()));
        assert_eq!(validate_watch_point(Event::Zero, 0), Err(ConfigError::ZeroHasNoValue));
        assert_eq!(validate_filter(1023), Ok(()));
        assert_eq!(validate_filter(1024), Err(ConfigError::FilterThresholdTooLarge));
    }
}
