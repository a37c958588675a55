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
use std::{error::Error, fmt, path::Path, path::PathBuf, sync::Arc};

use crate::config;

pub mod cpal;
pub mod format;
pub mod mock;
pub mod sample_source;
mod thread_priority;

pub use format::{SampleFormat, TargetFormat};
use sample_source::SampleSourceError;

/// Errors raised by an audio device.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// The track could not be opened or decoded. Carries the offending path.
    #[error("unable to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: SampleSourceError,
    },

    #[error("play requested with no track loaded")]
    NothingLoaded,

    #[error("audio device error: {0}")]
    Device(String),
}

/// An audio engine with a single playback slot.
///
/// A track is loaded, then played. Only one track is ever active; playing a new
/// track stops the previous one.
pub trait Device: fmt::Display + Send + Sync {
    /// Loads the track at the given path, replacing any loaded track that has not been played.
    fn load(&self, path: &Path) -> Result<(), AudioError>;

    /// Starts playing the loaded track and returns immediately.
    fn play(&self) -> Result<(), AudioError>;

    /// Returns true while the active track is still being rendered.
    fn is_playing(&self) -> bool;

    /// Stops the active track, if any.
    fn stop(&self);
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Opens the device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
