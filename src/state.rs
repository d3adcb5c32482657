//! Semantic values of the air conditioner and their protocol encodings.
use crate::Error;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Targets below this are only reachable through the frost guard special mode.
pub const FROST_GUARD_THRESHOLD: u8 = 17;
/// Wire bias of the target temperature while the frost guard is active.
pub const FROST_GUARD_OFFSET: u8 = 16;

/// Declares a closed enum together with its decode and encode tables.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident: $kind:literal {
            $($variant:ident = $wire:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum $name {
            $(
                #[cfg_attr(feature = "serde", serde(rename = $label))]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn from_wire(value: u8) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn to_wire(self) -> u8 {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Case-insensitive lookup by display name.
            pub fn from_name(name: &str) -> Result<Self, Error> {
                let name = name.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name().eq_ignore_ascii_case(name))
                    .ok_or_else(|| Error::unresolvable($kind, name))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

wire_enum! {
    PowerState: "power state" {
        On = 48 => "on",
        Off = 49 => "off",
    }
}

wire_enum! {
    /// Fan speeds of the standard climate vocabulary.
    FanMode: "fan mode" {
        Auto = 65 => "auto",
        Quiet = 49 => "quiet",
        Low = 50 => "low",
        Medium = 52 => "medium",
        High = 54 => "high",
    }
}

wire_enum! {
    /// The five discrete fan levels, reachable by name only.
    CustomFanLevel: "custom fan level" {
        Level1 = 50 => "Level 1",
        Level2 = 51 => "Level 2",
        Level3 = 52 => "Level 3",
        Level4 = 53 => "Level 4",
        Level5 = 54 => "Level 5",
    }
}

wire_enum! {
    SwingMode: "swing mode" {
        Off = 49 => "off",
        Vertical = 65 => "vertical",
        Horizontal = 66 => "horizontal",
        Both = 67 => "both",
    }
}

wire_enum! {
    /// Compressor power limit.
    PowerLevel: "power level" {
        Percent50 = 50 => "50 %",
        Percent75 = 75 => "75 %",
        Percent100 = 100 => "100 %",
    }
}

wire_enum! {
    SpecialMode: "special mode" {
        Standard = 0 => "Standard",
        HiPower = 1 => "Hi POWER",
        Silent1 = 2 => "Silent#1",
        Eco = 3 => "ECO",
        FrostGuard = 4 => "8 degrees",
        Silent2 = 10 => "Silent#2",
        Fireplace1 = 32 => "Fireplace 1",
        Fireplace2 = 48 => "Fireplace 2",
    }
}

impl FromStr for PowerState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl FromStr for FanMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl FromStr for CustomFanLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl FromStr for SwingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl FromStr for SpecialMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl FromStr for PowerLevel {
    type Err = Error;

    /// Accepts "75 %" as well as "75%" and "75".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).or_else(|err| {
            let digits = s.trim().trim_end_matches('%').trim();
            Self::ALL
                .iter()
                .copied()
                .find(|level| level.name().trim_end_matches(" %") == digits)
                .ok_or(err)
        })
    }
}

impl Default for PowerState {
    fn default() -> Self {
        PowerState::Off
    }
}

impl Default for SpecialMode {
    fn default() -> Self {
        SpecialMode::Standard
    }
}

impl SpecialMode {
    pub fn is_frost_guard(self) -> bool {
        self == SpecialMode::FrostGuard
    }
}

/// Climate mode as seen by the user. `Off` is expressed through the power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClimateMode {
    #[default]
    Off,
    Auto,
    Cool,
    Heat,
    Dry,
    FanOnly,
}

impl ClimateMode {
    pub const ALL: &'static [ClimateMode] = &[
        ClimateMode::Off,
        ClimateMode::Auto,
        ClimateMode::Cool,
        ClimateMode::Heat,
        ClimateMode::Dry,
        ClimateMode::FanOnly,
    ];

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            65 => Some(ClimateMode::Auto),
            66 => Some(ClimateMode::Cool),
            67 => Some(ClimateMode::Heat),
            68 => Some(ClimateMode::Dry),
            69 => Some(ClimateMode::FanOnly),
            _ => None,
        }
    }

    /// `None` for `Off`, which has no mode value.
    pub fn to_wire(self) -> Option<u8> {
        match self {
            ClimateMode::Off => None,
            ClimateMode::Auto => Some(65),
            ClimateMode::Cool => Some(66),
            ClimateMode::Heat => Some(67),
            ClimateMode::Dry => Some(68),
            ClimateMode::FanOnly => Some(69),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ClimateMode::Off => "off",
            ClimateMode::Auto => "auto",
            ClimateMode::Cool => "cool",
            ClimateMode::Heat => "heat",
            ClimateMode::Dry => "dry",
            ClimateMode::FanOnly => "fan_only",
        }
    }
}

impl fmt::Display for ClimateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClimateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::unresolvable("climate mode", name))
    }
}

/// Fan value as reported by the unit, either in the standard vocabulary or
/// as one of the custom levels that have no standard name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Fan {
    Standard(FanMode),
    Custom(CustomFanLevel),
}

impl Fan {
    pub fn from_wire(value: u8) -> Option<Self> {
        FanMode::from_wire(value)
            .map(Fan::Standard)
            .or_else(|| CustomFanLevel::from_wire(value).map(Fan::Custom))
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Fan::Standard(mode) => mode.to_wire(),
            Fan::Custom(level) => level.to_wire(),
        }
    }
}

impl fmt::Display for Fan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fan::Standard(mode) => fmt::Display::fmt(mode, f),
            Fan::Custom(level) => fmt::Display::fmt(level, f),
        }
    }
}

/// Wire value of the comfort sleep switch.
pub fn comfort_sleep_from_wire(value: u8) -> Option<bool> {
    match value {
        65 => Some(true),
        66 => Some(false),
        _ => None,
    }
}

pub fn comfort_sleep_to_wire(enabled: bool) -> u8 {
    if enabled {
        65
    } else {
        66
    }
}

/// Converts a reported target temperature to °C, `None` if it underflows the frost guard bias.
pub fn decode_target_temperature(value: u8, special_mode: SpecialMode) -> Option<u8> {
    if special_mode.is_frost_guard() {
        value.checked_sub(FROST_GUARD_OFFSET)
    } else {
        Some(value)
    }
}

pub fn encode_target_temperature(celsius: u8, special_mode: SpecialMode) -> u8 {
    if special_mode.is_frost_guard() {
        celsius.saturating_add(FROST_GUARD_OFFSET)
    } else {
        celsius
    }
}

/// Last known state of the unit.
///
/// Attributes the unit has not reported yet are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClimateState {
    pub power: PowerState,
    pub mode: ClimateMode,
    /// Target temperature in °C
    pub target_temperature: Option<u8>,
    /// Room temperature in °C
    pub current_temperature: Option<u8>,
    pub fan: Option<Fan>,
    pub swing: Option<SwingMode>,
    pub special_mode: SpecialMode,
    /// Outdoor temperature in °C
    pub outdoor_temperature: Option<i8>,
    pub power_level: Option<PowerLevel>,
    pub comfort_sleep: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_state() {
        let state = ClimateState::default();
        assert_eq!(state.power, PowerState::Off);
        assert_eq!(state.mode, ClimateMode::Off);
        assert_eq!(state.special_mode, SpecialMode::Standard);
        assert_eq!(state.target_temperature, None);
    }

    #[test_case(65, Fan::Standard(FanMode::Auto))]
    #[test_case(49, Fan::Standard(FanMode::Quiet))]
    #[test_case(50, Fan::Standard(FanMode::Low))]
    #[test_case(51, Fan::Custom(CustomFanLevel::Level2))]
    #[test_case(52, Fan::Standard(FanMode::Medium))]
    #[test_case(53, Fan::Custom(CustomFanLevel::Level4))]
    #[test_case(54, Fan::Standard(FanMode::High))]
    fn fan_decode(wire: u8, expected: Fan) {
        assert_eq!(Fan::from_wire(wire), Some(expected));
        assert_eq!(expected.to_wire(), wire);
    }

    #[test]
    fn custom_levels_share_wire_values() {
        assert_eq!(CustomFanLevel::Level1.to_wire(), FanMode::Low.to_wire());
        assert_eq!(CustomFanLevel::Level5.to_wire(), FanMode::High.to_wire());
        assert_eq!(Fan::from_wire(66), None);
    }

    #[test]
    fn off_has_no_mode_value() {
        assert_eq!(ClimateMode::Off.to_wire(), None);
        assert_eq!(ClimateMode::Dry.to_wire(), Some(68));
        assert_eq!(ClimateMode::from_wire(69), Some(ClimateMode::FanOnly));
        assert_eq!(ClimateMode::from_wire(70), None);
    }

    #[test_case("Hi POWER", SpecialMode::HiPower)]
    #[test_case("hi power", SpecialMode::HiPower)]
    #[test_case(" 8 degrees ", SpecialMode::FrostGuard)]
    #[test_case("silent#2", SpecialMode::Silent2)]
    #[test_case("FIREPLACE 2", SpecialMode::Fireplace2)]
    fn special_mode_names(name: &str, expected: SpecialMode) {
        assert_eq!(name.parse::<SpecialMode>().unwrap(), expected);
    }

    #[test_case("50 %", PowerLevel::Percent50)]
    #[test_case("75%", PowerLevel::Percent75)]
    #[test_case("100", PowerLevel::Percent100)]
    fn power_level_names(name: &str, expected: PowerLevel) {
        assert_eq!(name.parse::<PowerLevel>().unwrap(), expected);
    }

    #[test]
    fn unresolvable_names() {
        assert!(matches!(
            "turbo".parse::<FanMode>(),
            Err(Error::Unresolvable { kind: "fan mode", .. })
        ));
        assert!("60 %".parse::<PowerLevel>().is_err());
        assert!("heat_cool".parse::<ClimateMode>().is_err());
        assert_eq!("Level 3".parse::<CustomFanLevel>().unwrap(), CustomFanLevel::Level3);
    }

    #[test]
    fn frost_guard_bias() {
        assert_eq!(decode_target_temperature(21, SpecialMode::FrostGuard), Some(5));
        assert_eq!(decode_target_temperature(21, SpecialMode::Eco), Some(21));
        assert_eq!(decode_target_temperature(10, SpecialMode::FrostGuard), None);
        assert_eq!(encode_target_temperature(16, SpecialMode::FrostGuard), 32);
        assert_eq!(encode_target_temperature(22, SpecialMode::Standard), 22);
    }

    #[test]
    fn comfort_sleep_values() {
        assert_eq!(comfort_sleep_from_wire(65), Some(true));
        assert_eq!(comfort_sleep_from_wire(66), Some(false));
        assert_eq!(comfort_sleep_from_wire(0), None);
        assert_eq!(comfort_sleep_to_wire(false), 66);
    }

    #[test]
    fn special_mode_values() {
        assert_eq!(SpecialMode::from_wire(10), Some(SpecialMode::Silent2));
        assert_eq!(SpecialMode::Fireplace1.to_wire(), 32);
        assert_eq!(SpecialMode::from_wire(5), None);
        assert!(SpecialMode::FrostGuard.is_frost_guard());
    }
}
