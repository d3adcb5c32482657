use crate::state::{SpecialMode, SwingMode};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Optional capabilities of the connected unit.
///
/// Values that are only reported for enabled capabilities reach the
/// [`StateObserver`](crate::engine::StateObserver) sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Unit reports the outdoor temperature
    pub outdoor_temperature: bool,
    /// Unit supports the compressor power limit
    pub power_level: bool,
    /// Special modes offered to the user, empty disables the special mode sink
    pub special_modes: Vec<SpecialMode>,
    /// Louvers also move horizontally
    pub horizontal_swing: bool,
    /// Lowest target temperature in °C
    pub min_temperature: u8,
    /// Highest target temperature in °C
    pub max_temperature: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            outdoor_temperature: true,
            power_level: false,
            special_modes: Vec::new(),
            horizontal_swing: false,
            min_temperature: 5,
            max_temperature: 30,
        }
    }
}

impl EngineConfig {
    pub fn supported_swing_modes(&self) -> Vec<SwingMode> {
        if self.horizontal_swing {
            vec![
                SwingMode::Off,
                SwingMode::Vertical,
                SwingMode::Horizontal,
                SwingMode::Both,
            ]
        } else {
            vec![SwingMode::Off, SwingMode::Vertical]
        }
    }

    pub fn supports_swing(&self, mode: SwingMode) -> bool {
        self.supported_swing_modes().contains(&mode)
    }

    pub fn supports_special_mode(&self, mode: SpecialMode) -> bool {
        self.special_modes.contains(&mode)
    }

    pub fn supports_temperature(&self, celsius: u8) -> bool {
        (self.min_temperature..=self.max_temperature).contains(&celsius)
    }
}
