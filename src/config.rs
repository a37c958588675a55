// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::{path::Path, time::Duration};

use config::{Config, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;
use tracing::info;

mod audio;
mod error;
mod gpio;
mod timing;
mod tracks;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::gpio::Gpio;
pub use self::timing::Timing;
pub use self::tracks::{Intro, Tracks};

/// The full configuration of the player. Every section falls back to the
/// compiled defaults when it is left out.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    #[serde(default)]
    gpio: Gpio,

    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    tracks: Tracks,

    #[serde(default)]
    timing: Timing,
}

impl Player {
    pub fn new(gpio: Gpio, audio: Audio, tracks: Tracks, timing: Timing) -> Player {
        Player {
            gpio,
            audio,
            tracks,
            timing,
        }
    }

    /// Loads the configuration from a YAML file, or the compiled defaults when
    /// no path is given. The result is validated either way.
    pub fn load(path: Option<&Path>) -> Result<Player, ConfigError> {
        let player = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration.");
                Config::builder()
                    .add_source(File::from(path).format(FileFormat::Yaml))
                    .build()?
                    .try_deserialize::<Player>()?
            }
            None => Player::default(),
        };
        player.validate()?;
        Ok(player)
    }

    /// Parses the configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Player, ConfigError> {
        let player = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Player>()?;
        player.validate()?;
        Ok(player)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gpio.validate()?;
        self.audio.validate()?;
        self.tracks.validate()?;
        self.timing.validate()
    }

    pub fn gpio(&self) -> &Gpio {
        &self.gpio
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn tracks(&self) -> &Tracks {
        &self.tracks
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }
}

/// Parses a human duration such as "2s" or "10ms".
fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Into::into)
        .map_err(|e| ConfigError::Duration {
            field,
            value: value.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod test {
    use std::{error::Error, path::PathBuf};

    use super::*;
    use crate::gpio::{Numbering, Pin};

    #[test]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let player = Player::load(None)?;

        assert_eq!("rppal", player.gpio().device());
        assert_eq!(Numbering::Board, player.gpio().numbering());
        assert_eq!(
            &[Pin::new(11), Pin::new(12), Pin::new(13)],
            player.gpio().pins()
        );

        assert_eq!("default", player.audio().device());
        assert_eq!(48000, player.audio().sample_rate());
        assert_eq!(16, player.audio().bits_per_sample());
        assert_eq!(1, player.audio().channels());
        assert_eq!(4096, player.audio().buffer_size());

        assert_eq!(
            Path::new("/home/pi/mursSonors/sonsMur"),
            player.tracks().directory()
        );
        assert_eq!(21, player.tracks().total());
        assert_eq!("mp3", player.tracks().extension());
        let intro = player.tracks().intro().ok_or("intro missing")?;
        assert_eq!(2, intro.count());
        assert_eq!(Duration::from_secs(2), intro.delay()?);

        assert_eq!(Duration::from_secs(2), player.timing().startup_delay()?);
        assert_eq!(Duration::from_secs(2), player.timing().pass_delay()?);
        assert_eq!(Duration::from_millis(10), player.timing().poll_interval()?);
        Ok(())
    }

    #[test]
    fn test_parse_full() -> Result<(), Box<dyn Error>> {
        let player = Player::parse(
            r#"
            gpio:
              device: mock-gpio
              numbering: bcm
              pins: [17, 27]
            audio:
              device: mock-audio
              sample_rate: 44100
              sample_format: float
              bits_per_sample: 32
              channels: 2
              buffer_size: 1024
              stream_buffer_size: 256
              playback_delay: 50ms
            tracks:
              directory: /srv/sounds
              total: 5
              extension: wav
              intro:
                count: 3
                delay: 500ms
            timing:
              startup_delay: 1s
              pass_delay: 250ms
              poll_interval: 5ms
            "#,
        )?;

        assert_eq!("mock-gpio", player.gpio().device());
        assert_eq!(Numbering::Bcm, player.gpio().numbering());
        assert_eq!(&[Pin::new(17), Pin::new(27)], player.gpio().pins());
        assert_eq!("mock-audio", player.audio().device());
        assert_eq!(44100, player.audio().sample_rate());
        assert_eq!(2, player.audio().channels());
        assert_eq!(Some(256), player.audio().stream_buffer_size());
        assert_eq!(Duration::from_millis(50), player.audio().playback_delay()?);
        assert_eq!(PathBuf::from("/srv/sounds"), player.tracks().directory());
        assert_eq!(5, player.tracks().total());
        assert_eq!("wav", player.tracks().extension());
        let intro = player.tracks().intro().ok_or("intro missing")?;
        assert_eq!(3, intro.count());
        assert_eq!(Duration::from_millis(500), intro.delay()?);
        assert_eq!(Duration::from_secs(1), player.timing().startup_delay()?);
        assert_eq!(Duration::from_millis(250), player.timing().pass_delay()?);
        assert_eq!(Duration::from_millis(5), player.timing().poll_interval()?);
        Ok(())
    }

    #[test]
    fn test_omitted_intro_disables_preroll() -> Result<(), Box<dyn Error>> {
        let player = Player::parse(
            r#"
            tracks:
              directory: /srv/sounds
            "#,
        )?;
        assert!(player.tracks().intro().is_none());
        assert_eq!(21, player.tracks().total());
        assert_eq!(3, player.gpio().pins().len());
        Ok(())
    }

    #[test]
    fn test_validation() {
        let invalid = [
            "gpio:\n  pins: [11, 12, 11]",
            "gpio:\n  pins: [1]",
            "gpio:\n  numbering: bcm\n  pins: [40]",
            "tracks:\n  total: 0",
            "tracks:\n  intro:\n    count: 0",
            "audio:\n  channels: 0",
            "audio:\n  sample_rate: 0",
            "audio:\n  bits_per_sample: 24",
            "timing:\n  poll_interval: 0s",
        ];
        for yaml in invalid {
            assert!(
                matches!(Player::parse(yaml), Err(ConfigError::Invalid(_))),
                "expected invalid: {}",
                yaml
            );
        }
    }

    #[test]
    fn test_bad_duration() {
        match Player::parse("timing:\n  pass_delay: soon") {
            Err(ConfigError::Duration { field, value, .. }) => {
                assert_eq!("timing.pass_delay", field);
                assert_eq!("soon", value);
            }
            other => panic!("expected a duration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_pin_set_rejected() {
        let gpio = Gpio::new("mock-gpio", Numbering::Board, vec![]);
        let player = Player::new(gpio, Audio::default(), Tracks::default(), Timing::default());
        assert!(matches!(player.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("pirplay.yaml");
        std::fs::write(&path, "gpio:\n  device: mock-gpio\n  pins: [13, 11]\n")?;

        let player = Player::load(Some(&path))?;
        assert_eq!(&[Pin::new(13), Pin::new(11)], player.gpio().pins());

        assert!(matches!(
            Player::load(Some(&tempdir.path().join("missing.yaml"))),
            Err(ConfigError::Load(_))
        ));
        Ok(())
    }
}
