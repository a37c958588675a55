// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashSet;

use serde::Deserialize;

use super::error::ConfigError;
use crate::gpio::{Numbering, Pin};

const DEFAULT_DEVICE: &str = "rppal";
const DEFAULT_PINS: [Pin; 3] = [Pin::new(11), Pin::new(12), Pin::new(13)];

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

fn default_pins() -> Vec<Pin> {
    DEFAULT_PINS.to_vec()
}

/// The sensor inputs.
#[derive(Deserialize, Clone, Debug)]
pub struct Gpio {
    /// "rppal" for Raspberry Pi hardware, or a name starting with "mock".
    #[serde(default = "default_device")]
    device: String,

    /// How the pins below are numbered.
    #[serde(default)]
    numbering: Numbering,

    /// Sensor pins in scan order. The first pin that reads HIGH wins.
    #[serde(default = "default_pins")]
    pins: Vec<Pin>,
}

impl Default for Gpio {
    fn default() -> Self {
        Gpio {
            device: default_device(),
            numbering: Numbering::default(),
            pins: default_pins(),
        }
    }
}

impl Gpio {
    pub fn new(device: &str, numbering: Numbering, pins: Vec<Pin>) -> Gpio {
        Gpio {
            device: device.to_string(),
            numbering,
            pins,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn numbering(&self) -> Numbering {
        self.numbering
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.pins.is_empty() {
            return Err(ConfigError::Invalid(
                "gpio.pins must list at least one pin".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for pin in &self.pins {
            if !seen.insert(pin) {
                return Err(ConfigError::Invalid(format!(
                    "gpio.pins lists pin {} more than once",
                    pin
                )));
            }
            if self.numbering.to_bcm(*pin).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "gpio.pins: {} is not a GPIO line in {} numbering",
                    pin, self.numbering
                )));
            }
        }
        Ok(())
    }
}
