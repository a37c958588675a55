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
use std::path::Path;

pub mod audio;
pub mod channels;
pub mod error;
#[cfg(test)]
pub mod memory;
pub mod traits;
pub mod transcoder;

pub use audio::AudioSampleSource;
pub use channels::ChannelAdapter;
pub use error::SampleSourceError;
#[cfg(test)]
pub use memory::MemorySampleSource;
pub use traits::SampleSource;
pub use transcoder::AudioTranscoder;

/// Opens a track and converts it to the engine's channel count and sample rate.
pub fn open_track<P: AsRef<Path>>(
    path: P,
    target_rate: u32,
    target_channels: u16,
) -> Result<Box<dyn SampleSource>, SampleSourceError> {
    let decoded = AudioSampleSource::from_file(path)?;
    let adapted = ChannelAdapter::new(decoded, target_channels);
    Ok(Box::new(AudioTranscoder::new(adapted, target_rate)?))
}
