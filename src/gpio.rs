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
use std::{fmt, sync::Arc};

use serde::Deserialize;

use crate::config;

pub mod header;
pub mod mock;
pub mod rppal;

/// A digital input line, addressed in the configured numbering scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct Pin(u8);

impl Pin {
    pub const fn new(number: u8) -> Pin {
        Pin(number)
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The logical state of an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Low => "LOW",
            Level::High => "HIGH",
        })
    }
}

/// How pin numbers in the configuration are interpreted.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Numbering {
    /// Physical position on the 40-pin header.
    #[default]
    Board,
    /// Broadcom GPIO line number.
    Bcm,
}

impl Numbering {
    /// Translates the pin to its BCM line, or None if it isn't a GPIO line.
    pub fn to_bcm(self, pin: Pin) -> Option<u8> {
        match self {
            Numbering::Board => header::board_to_bcm(pin.number()),
            Numbering::Bcm => (pin.number() <= header::MAX_BCM_LINE).then_some(pin.number()),
        }
    }
}

impl fmt::Display for Numbering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Numbering::Board => "board",
            Numbering::Bcm => "bcm",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("GPIO error: {0}")]
    Rppal(#[from] ::rppal::gpio::Error),

    #[error("pin {pin} is not a GPIO line in {numbering} numbering")]
    UnmappedPin { pin: Pin, numbering: Numbering },

    #[error("pin {0} has not been configured as an input")]
    NotConfigured(Pin),

    #[error("GPIO device has been released")]
    Released,

    #[error("unable to read pin {pin}: {message}")]
    Read { pin: Pin, message: String },
}

/// A source of digital input lines.
///
/// Lines are only ever configured as inputs with a pull-down bias. Configuring a
/// line that is already configured is a no-op, so callers may re-apply it on
/// every pass. Release returns every claimed line to its prior state and must be
/// safe to call more than once.
pub trait Device: fmt::Display + Send + Sync {
    /// Configures the pin as an input with a pull-down resistor.
    fn configure_input(&self, pin: Pin) -> Result<(), GpioError>;

    /// Reads the current level of a configured pin.
    fn read(&self, pin: Pin) -> Result<Level, GpioError>;

    /// Releases every claimed line.
    fn release(&self);
}

/// Opens the GPIO device described by the configuration.
pub fn get_device(config: &config::Gpio) -> Result<Arc<dyn Device>, GpioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    }

    Ok(Arc::new(rppal::Device::get(config.numbering())?))
}
