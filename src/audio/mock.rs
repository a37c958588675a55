// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
    fmt, io,
    path::{Path, PathBuf},
    time::Instant,
};

use parking_lot::Mutex;
use tracing::info;

use super::{sample_source::SampleSourceError, AudioError};

/// A mock device. Doesn't actually play anything.
///
/// Playback lasts for a fixed number of status queries: `is_playing` reports true
/// `busy_polls` times after `play`, then false.
pub struct Device {
    name: String,
    busy_polls: usize,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    loaded: Option<PathBuf>,
    playing: Option<PathBuf>,
    polls_left: usize,
    played: Vec<PathBuf>,
    status_queries: usize,
    stops: usize,
    /// When each track started.
    started: Vec<Instant>,
    /// When each track was first reported as finished.
    finished: Vec<Instant>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device::with_busy_polls(name, 1)
    }

    /// Gets a mock device whose tracks last for the given number of status queries.
    pub fn with_busy_polls(name: &str, busy_polls: usize) -> Device {
        Device {
            name: name.to_string(),
            busy_polls,
            state: Mutex::new(State::default()),
        }
    }

    /// Every track that has been played, in order.
    #[cfg(test)]
    pub fn played(&self) -> Vec<PathBuf> {
        self.state.lock().played.clone()
    }

    /// The number of times `is_playing` has been called.
    #[cfg(test)]
    pub fn status_queries(&self) -> usize {
        self.state.lock().status_queries
    }

    /// The number of times `stop` has been called.
    #[cfg(test)]
    pub fn stops(&self) -> usize {
        self.state.lock().stops
    }

    /// When each track started and when it was reported finished, in order.
    #[cfg(test)]
    pub fn timeline(&self) -> (Vec<Instant>, Vec<Instant>) {
        let state = self.state.lock();
        (state.started.clone(), state.finished.clone())
    }

    /// True if a track is active. Does not count as a status query.
    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.state.lock().playing.is_some()
    }
}

impl super::Device for Device {
    /// Loading checks that the file exists, so missing tracks fail the same way as on hardware.
    fn load(&self, path: &Path) -> Result<(), AudioError> {
        if !path.is_file() {
            return Err(AudioError::Load {
                path: path.to_path_buf(),
                source: SampleSourceError::IoError(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{}: file not found", path.display()),
                )),
            });
        }
        self.state.lock().loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        let path = state.loaded.take().ok_or(AudioError::NothingLoaded)?;
        info!(device = self.name, track = %path.display(), "Playing track.");
        state.played.push(path.clone());
        state.started.push(Instant::now());
        state.playing = Some(path);
        state.polls_left = self.busy_polls;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        let mut state = self.state.lock();
        state.status_queries += 1;
        if state.playing.is_none() {
            return false;
        }
        if state.polls_left == 0 {
            state.playing = None;
            state.finished.push(Instant::now());
            return false;
        }
        state.polls_left -= 1;
        true
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.stops += 1;
        state.playing = None;
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
