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
    error::Error,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::info;

use crate::{audio, config, gpio};

/// The process-wide handle on the sensor lines and the audio engine.
///
/// Acquired once at startup and released once on the way out, whether the
/// loop stopped on an interrupt or a fault. Dropping it releases it too.
pub struct Hardware {
    gpio: Arc<dyn gpio::Device>,
    audio: Arc<dyn audio::Device>,
    released: AtomicBool,
}

impl Hardware {
    /// Opens the devices named in the configuration.
    pub fn acquire(config: &config::Player) -> Result<Hardware, Box<dyn Error>> {
        let gpio = gpio::get_device(config.gpio())?;
        let audio = audio::get_device(config.audio())?;
        info!(gpio = %gpio, audio = %audio, "Acquired hardware.");
        Ok(Hardware::new(gpio, audio))
    }

    pub fn new(gpio: Arc<dyn gpio::Device>, audio: Arc<dyn audio::Device>) -> Hardware {
        Hardware {
            gpio,
            audio,
            released: AtomicBool::new(false),
        }
    }

    pub fn gpio(&self) -> Arc<dyn gpio::Device> {
        self.gpio.clone()
    }

    pub fn audio(&self) -> Arc<dyn audio::Device> {
        self.audio.clone()
    }

    /// Stops playback and releases the pins. Only the first call does anything;
    /// returns whether this call was it.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!("Cleaning up and exiting.");
        self.audio.stop();
        self.gpio.release();
        true
    }
}

impl Drop for Hardware {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_release_once() {
        let gpio = Arc::new(gpio::mock::Device::get("mock-gpio"));
        let audio = Arc::new(audio::mock::Device::get("mock-audio"));
        let hardware = Hardware::new(gpio.clone(), audio.clone());

        assert!(hardware.release());
        assert!(!hardware.release());
        drop(hardware);

        assert_eq!(1, gpio.releases());
        assert_eq!(1, audio.stops());
    }

    #[test]
    fn test_drop_releases() {
        let gpio = Arc::new(gpio::mock::Device::get("mock-gpio"));
        let audio = Arc::new(audio::mock::Device::get("mock-audio"));
        drop(Hardware::new(gpio.clone(), audio));
        assert_eq!(1, gpio.releases());
    }

    #[test]
    fn test_acquire_mocks() -> Result<(), Box<dyn Error>> {
        let player = config::Player::parse(
            "gpio:\n  device: mock-gpio\naudio:\n  device: mock-audio\n",
        )?;
        let hardware = Hardware::acquire(&player)?;
        assert_eq!("mock-gpio (Mock)", hardware.gpio().to_string());
        assert_eq!("mock-audio (Mock)", hardware.audio().to_string());
        Ok(())
    }
}
