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
    collections::{HashMap, HashSet, VecDeque},
    fmt,
};

use parking_lot::Mutex;
use tracing::info;

use super::{GpioError, Level, Pin};

type ReadHook = Box<dyn FnMut(Pin) + Send>;

/// A mock GPIO device. Every line reads LOW unless scripted otherwise.
pub struct Device {
    name: String,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Levels returned by upcoming reads, per pin.
    scripts: HashMap<Pin, VecDeque<Level>>,
    /// Level returned once a pin's script is exhausted.
    steady: HashMap<Pin, Level>,
    configured: HashSet<Pin>,
    configure_log: Vec<Pin>,
    reads: Vec<Pin>,
    fail_on_read: Option<Pin>,
    on_read: Option<ReadHook>,
    releases: usize,
    released: bool,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Queues levels for the next reads of the pin.
    #[cfg(test)]
    pub fn script(&self, pin: Pin, levels: &[Level]) {
        self.state
            .lock()
            .scripts
            .entry(pin)
            .or_default()
            .extend(levels.iter().copied());
    }

    /// Sets the level a pin reads once its script is exhausted.
    #[cfg(test)]
    pub fn set_level(&self, pin: Pin, level: Level) {
        self.state.lock().steady.insert(pin, level);
    }

    /// Makes reads of the pin fail.
    #[cfg(test)]
    pub fn fail_on_read(&self, pin: Pin) {
        self.state.lock().fail_on_read = Some(pin);
    }

    /// Calls the hook before each read is served.
    #[cfg(test)]
    pub fn on_read<F: FnMut(Pin) + Send + 'static>(&self, hook: F) {
        self.state.lock().on_read = Some(Box::new(hook));
    }

    /// Every pin read, in order.
    #[cfg(test)]
    pub fn reads(&self) -> Vec<Pin> {
        self.state.lock().reads.clone()
    }

    /// Every configure request, in order.
    #[cfg(test)]
    pub fn configure_log(&self) -> Vec<Pin> {
        self.state.lock().configure_log.clone()
    }

    /// The number of times release was called.
    #[cfg(test)]
    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }
}

impl super::Device for Device {
    fn configure_input(&self, pin: Pin) -> Result<(), GpioError> {
        let mut state = self.state.lock();
        if state.released {
            return Err(GpioError::Released);
        }
        state.configure_log.push(pin);
        state.configured.insert(pin);
        Ok(())
    }

    fn read(&self, pin: Pin) -> Result<Level, GpioError> {
        let mut state = self.state.lock();
        if let Some(hook) = state.on_read.as_mut() {
            hook(pin);
        }
        if state.released {
            return Err(GpioError::Released);
        }
        if !state.configured.contains(&pin) {
            return Err(GpioError::NotConfigured(pin));
        }
        state.reads.push(pin);
        if state.fail_on_read == Some(pin) {
            return Err(GpioError::Read {
                pin,
                message: "injected fault".to_string(),
            });
        }

        let scripted = state.scripts.get_mut(&pin).and_then(VecDeque::pop_front);
        Ok(scripted
            .or_else(|| state.steady.get(&pin).copied())
            .unwrap_or(Level::Low))
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.releases += 1;
        if !state.released {
            state.released = true;
            state.configured.clear();
            info!(device = self.name, "Released mock GPIO lines.");
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
