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
use std::sync::Arc;

use tracing::{info, span, Level as TraceLevel};

use crate::{
    gpio::{self, GpioError, Level, Pin},
    playsync::CancelHandle,
};

/// The result of one pass over the pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The first pin in scan order that read HIGH.
    Triggered(Pin),
    /// Every pin read LOW.
    NoTrigger,
    /// Shutdown was requested before the pass finished.
    Interrupted,
}

/// Reads the sensor pins in a fixed priority order.
pub struct Scanner {
    gpio: Arc<dyn gpio::Device>,
    pins: Vec<Pin>,
}

impl Scanner {
    pub fn new(gpio: Arc<dyn gpio::Device>, pins: &[Pin]) -> Scanner {
        Scanner {
            gpio,
            pins: pins.to_vec(),
        }
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Configures every pin, then reads them in order until one is HIGH. Pins
    /// after the triggered one are not read. Nothing is remembered between passes.
    pub fn scan(&self, cancel: &CancelHandle) -> Result<ScanOutcome, GpioError> {
        let span = span!(TraceLevel::INFO, "scan");
        let _enter = span.enter();

        for pin in &self.pins {
            if cancel.is_cancelled() {
                return Ok(ScanOutcome::Interrupted);
            }
            self.gpio.configure_input(*pin)?;
        }

        for pin in &self.pins {
            if cancel.is_cancelled() {
                return Ok(ScanOutcome::Interrupted);
            }
            let level = self.gpio.read(*pin)?;
            info!(pin = pin.number(), level = %level, "Pin {} is {}", pin, level);
            if level == Level::High {
                return Ok(ScanOutcome::Triggered(*pin));
            }
        }

        Ok(ScanOutcome::NoTrigger)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pins(numbers: &[u8]) -> Vec<Pin> {
        numbers.iter().copied().map(Pin::new).collect()
    }

    fn scanner(numbers: &[u8]) -> (Arc<gpio::mock::Device>, Scanner) {
        let gpio = Arc::new(gpio::mock::Device::get("mock-gpio"));
        let scanner = Scanner::new(gpio.clone(), &pins(numbers));
        (gpio, scanner)
    }

    #[test]
    fn test_no_trigger_reads_every_pin_once() -> Result<(), GpioError> {
        let (gpio, scanner) = scanner(&[11, 12, 13]);
        assert_eq!(ScanOutcome::NoTrigger, scanner.scan(&CancelHandle::new())?);
        assert_eq!(pins(&[11, 12, 13]), gpio.reads());
        assert_eq!(pins(&[11, 12, 13]), gpio.configure_log());
        Ok(())
    }

    #[test]
    fn test_single_high_stops_the_pass() -> Result<(), GpioError> {
        let (gpio, scanner) = scanner(&[11, 12, 13]);
        gpio.set_level(Pin::new(12), Level::High);
        assert_eq!(
            ScanOutcome::Triggered(Pin::new(12)),
            scanner.scan(&CancelHandle::new())?
        );
        assert_eq!(pins(&[11, 12]), gpio.reads());
        Ok(())
    }

    #[test]
    fn test_earliest_high_wins() -> Result<(), GpioError> {
        let (gpio, scanner) = scanner(&[13, 11, 12]);
        gpio.set_level(Pin::new(11), Level::High);
        gpio.set_level(Pin::new(12), Level::High);
        assert_eq!(
            ScanOutcome::Triggered(Pin::new(11)),
            scanner.scan(&CancelHandle::new())?
        );
        assert_eq!(pins(&[13, 11]), gpio.reads());
        Ok(())
    }

    #[test]
    fn test_held_pin_retriggers_and_reconfigures() -> Result<(), GpioError> {
        let (gpio, scanner) = scanner(&[11, 12]);
        gpio.set_level(Pin::new(11), Level::High);
        let cancel = CancelHandle::new();
        for _ in 0..3 {
            assert_eq!(ScanOutcome::Triggered(Pin::new(11)), scanner.scan(&cancel)?);
        }
        assert_eq!(6, gpio.configure_log().len());
        assert_eq!(pins(&[11, 11, 11]), gpio.reads());
        Ok(())
    }

    #[test]
    fn test_cancel_stops_reads() -> Result<(), GpioError> {
        let (gpio, scanner) = scanner(&[11, 12, 13]);
        let cancel = CancelHandle::new();
        {
            let cancel = cancel.clone();
            gpio.on_read(move |pin| {
                if pin == Pin::new(12) {
                    cancel.cancel();
                }
            });
        }
        assert_eq!(ScanOutcome::Interrupted, scanner.scan(&cancel)?);
        assert_eq!(pins(&[11, 12]), gpio.reads());

        assert_eq!(ScanOutcome::Interrupted, scanner.scan(&cancel)?);
        assert_eq!(pins(&[11, 12]), gpio.reads());
        Ok(())
    }

    #[test]
    fn test_read_fault() {
        let (gpio, scanner) = scanner(&[11, 12, 13]);
        gpio.fail_on_read(Pin::new(12));
        assert!(matches!(
            scanner.scan(&CancelHandle::new()),
            Err(GpioError::Read { .. })
        ));
    }
}
