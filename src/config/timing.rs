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
use std::time::Duration;

use serde::Deserialize;

use super::{error::ConfigError, parse_duration};

const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_PASS_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Delays of the control loop.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Timing {
    /// Wait before the first scan.
    startup_delay: Option<String>,

    /// Wait after every pass, triggered or not.
    pass_delay: Option<String>,

    /// How often playback status is polled.
    poll_interval: Option<String>,
}

impl Timing {
    pub fn new(startup_delay: &str, pass_delay: &str, poll_interval: &str) -> Timing {
        Timing {
            startup_delay: Some(startup_delay.to_string()),
            pass_delay: Some(pass_delay.to_string()),
            poll_interval: Some(poll_interval.to_string()),
        }
    }

    pub fn startup_delay(&self) -> Result<Duration, ConfigError> {
        match &self.startup_delay {
            Some(delay) => parse_duration("timing.startup_delay", delay),
            None => Ok(DEFAULT_STARTUP_DELAY),
        }
    }

    pub fn pass_delay(&self) -> Result<Duration, ConfigError> {
        match &self.pass_delay {
            Some(delay) => parse_duration("timing.pass_delay", delay),
            None => Ok(DEFAULT_PASS_DELAY),
        }
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        match &self.poll_interval {
            Some(interval) => parse_duration("timing.poll_interval", interval),
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.startup_delay()?;
        self.pass_delay()?;
        if self.poll_interval()?.is_zero() {
            return Err(ConfigError::Invalid(
                "timing.poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
