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
use std::{error::Error, str::FromStr, time::Duration};

use serde::Deserialize;

use super::{error::ConfigError, parse_duration};
use crate::audio::{SampleFormat, TargetFormat};

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_AUDIO_PLAYBACK_DELAY: Duration = Duration::ZERO;
const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_BITS_PER_SAMPLE: u16 = 16;
const DEFAULT_CHANNELS: u16 = 1;
const DEFAULT_BUFFER_SIZE: usize = 4096;

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device, or "default" for the host's default output.
    #[serde(default = "default_device")]
    device: String,

    /// Controls how long to wait before playback of an audio file starts.
    playback_delay: Option<String>,

    /// Target sample rate in Hz (default: 48000)
    sample_rate: Option<u32>,

    /// Target sample format (default: "int")
    sample_format: Option<String>,

    /// Target bits per sample (default: 16)
    bits_per_sample: Option<u16>,

    /// Output channels (default: 1)
    channels: Option<u16>,

    /// Frames decoded per chunk (default: 4096)
    buffer_size: Option<usize>,

    /// Fixed CPAL stream buffer size in frames. The backend default is used when unset.
    stream_buffer_size: Option<u32>,
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new(DEFAULT_DEVICE)
    }
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            playback_delay: None,
            sample_rate: None,
            sample_format: None,
            bits_per_sample: None,
            channels: None,
            buffer_size: None,
            stream_buffer_size: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the playback delay from the configuration.
    pub fn playback_delay(&self) -> Result<Duration, ConfigError> {
        match &self.playback_delay {
            Some(playback_delay) => parse_duration("audio.playback_delay", playback_delay),
            None => Ok(DEFAULT_AUDIO_PLAYBACK_DELAY),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn sample_format(&self) -> Result<SampleFormat, Box<dyn Error>> {
        match self.sample_format.as_deref() {
            Some(format) => SampleFormat::from_str(format),
            None => Ok(SampleFormat::Int),
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns the buffer size for decoded audio samples (default: 4096 frames)
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    pub fn stream_buffer_size(&self) -> Option<u32> {
        self.stream_buffer_size
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.channels() == 0 {
            return Err(ConfigError::Invalid(
                "audio.channels must be at least 1".to_string(),
            ));
        }
        if self.buffer_size() == 0 {
            return Err(ConfigError::Invalid(
                "audio.buffer_size must be at least 1".to_string(),
            ));
        }
        let sample_format = self
            .sample_format()
            .map_err(|e| ConfigError::Invalid(format!("audio.sample_format: {}", e)))?;
        TargetFormat::new(self.sample_rate(), sample_format, self.bits_per_sample())
            .map_err(|e| ConfigError::Invalid(format!("audio: {}", e)))?;
        self.playback_delay()?;
        Ok(())
    }
}
