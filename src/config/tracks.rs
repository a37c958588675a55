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
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use super::{error::ConfigError, parse_duration};

const DEFAULT_DIRECTORY: &str = "/home/pi/mursSonors/sonsMur";
const DEFAULT_TOTAL: u32 = 21;
const DEFAULT_EXTENSION: &str = "mp3";
const DEFAULT_INTRO_COUNT: u32 = 2;
const DEFAULT_INTRO_DELAY: Duration = Duration::from_secs(2);

fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DIRECTORY)
}

fn default_total() -> u32 {
    DEFAULT_TOTAL
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

/// The audio assets.
#[derive(Deserialize, Clone, Debug)]
pub struct Tracks {
    /// Directory holding track0NN and intro-K files.
    #[serde(default = "default_directory")]
    directory: PathBuf,

    /// Tracks are numbered 1 through total.
    #[serde(default = "default_total")]
    total: u32,

    /// File extension, without the dot.
    #[serde(default = "default_extension")]
    extension: String,

    /// Pre-roll played before each track. No pre-roll when absent.
    intro: Option<Intro>,
}

impl Default for Tracks {
    fn default() -> Self {
        Tracks {
            directory: default_directory(),
            total: DEFAULT_TOTAL,
            extension: default_extension(),
            intro: Some(Intro::default()),
        }
    }
}

impl Tracks {
    pub fn new(directory: &Path, total: u32, extension: &str, intro: Option<Intro>) -> Tracks {
        Tracks {
            directory: directory.to_path_buf(),
            total,
            extension: extension.to_string(),
            intro,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn intro(&self) -> Option<&Intro> {
        self.intro.as_ref()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.total == 0 {
            return Err(ConfigError::Invalid(
                "tracks.total must be at least 1".to_string(),
            ));
        }
        if let Some(intro) = &self.intro {
            if intro.count() == 0 {
                return Err(ConfigError::Invalid(
                    "tracks.intro.count must be at least 1".to_string(),
                ));
            }
            intro.delay()?;
        }
        Ok(())
    }
}

/// The intro clip played before the main track.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Intro {
    /// Intros are numbered 1 through count (default: 2)
    count: Option<u32>,

    /// Silence between the intro and the main track (default: 2s)
    delay: Option<String>,
}

impl Intro {
    pub fn new(count: u32, delay: &str) -> Intro {
        Intro {
            count: Some(count),
            delay: Some(delay.to_string()),
        }
    }

    pub fn count(&self) -> u32 {
        self.count.unwrap_or(DEFAULT_INTRO_COUNT)
    }

    pub fn delay(&self) -> Result<Duration, ConfigError> {
        match &self.delay {
            Some(delay) => parse_duration("tracks.intro.delay", delay),
            None => Ok(DEFAULT_INTRO_DELAY),
        }
    }
}
