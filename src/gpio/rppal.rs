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
use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

use ::rppal::gpio::{Gpio, InputPin};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{GpioError, Level, Numbering, Pin};

/// GPIO lines on a Raspberry Pi through /dev/gpiomem.
pub struct Device {
    gpio: Gpio,
    numbering: Numbering,
    /// Claimed lines. Dropping an InputPin resets the line to its prior state.
    pins: Mutex<HashMap<Pin, InputPin>>,
    released: AtomicBool,
}

impl Device {
    pub fn get(numbering: Numbering) -> Result<Device, GpioError> {
        let gpio = Gpio::new()?;
        info!(numbering = %numbering, "Opened GPIO device.");
        Ok(Device {
            gpio,
            numbering,
            pins: Mutex::new(HashMap::new()),
            released: AtomicBool::new(false),
        })
    }
}

impl super::Device for Device {
    fn configure_input(&self, pin: Pin) -> Result<(), GpioError> {
        if self.released.load(Ordering::Acquire) {
            return Err(GpioError::Released);
        }

        let mut pins = self.pins.lock();
        if pins.contains_key(&pin) {
            return Ok(());
        }

        let line = self
            .numbering
            .to_bcm(pin)
            .ok_or(GpioError::UnmappedPin {
                pin,
                numbering: self.numbering,
            })?;
        let input = self.gpio.get(line)?.into_input_pulldown();
        debug!(pin = pin.number(), line, "Configured input with pull-down.");
        pins.insert(pin, input);
        Ok(())
    }

    fn read(&self, pin: Pin) -> Result<Level, GpioError> {
        if self.released.load(Ordering::Acquire) {
            return Err(GpioError::Released);
        }

        let pins = self.pins.lock();
        let input = pins.get(&pin).ok_or(GpioError::NotConfigured(pin))?;
        Ok(match input.read() {
            ::rppal::gpio::Level::High => Level::High,
            ::rppal::gpio::Level::Low => Level::Low,
        })
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut pins = self.pins.lock();
        let count = pins.len();
        pins.clear();
        info!(lines = count, "Released GPIO lines.");
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rppal ({} numbering)", self.numbering)
    }
}
