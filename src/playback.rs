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
use std::{path::Path, sync::Arc, time::Duration};

use tracing::{info, span, Level};

use crate::{
    audio::{self, AudioError},
    gpio::Pin,
    playsync::CancelHandle,
    tracks::{Catalog, TrackSelector},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The engine reported that the track finished.
    Completed,
    /// Shutdown was requested; playback was stopped.
    Interrupted,
}

/// Plays a random track, blocking until it finishes.
pub struct PlaybackController {
    audio: Arc<dyn audio::Device>,
    catalog: Catalog,
    selector: TrackSelector,
    /// Silence after the intro. None when there is no pre-roll.
    intro_delay: Option<Duration>,
    poll_interval: Duration,
}

impl PlaybackController {
    pub fn new(
        audio: Arc<dyn audio::Device>,
        catalog: Catalog,
        selector: TrackSelector,
        intro_delay: Option<Duration>,
        poll_interval: Duration,
    ) -> PlaybackController {
        PlaybackController {
            audio,
            catalog,
            selector,
            intro_delay,
            poll_interval,
        }
    }

    /// Handles a trigger: the optional intro, its delay, then a random track.
    /// The pin is only logged.
    pub fn on_trigger(
        &mut self,
        pin: Pin,
        cancel: &CancelHandle,
    ) -> Result<PlaybackOutcome, AudioError> {
        let span = span!(Level::INFO, "playback", pin = pin.number());
        let _enter = span.enter();
        info!("Motion detected on pin {}.", pin);

        if let Some(intro) = self.selector.intro() {
            if self.play(&self.catalog.path(intro), cancel)? == PlaybackOutcome::Interrupted {
                return Ok(PlaybackOutcome::Interrupted);
            }
            if let Some(delay) = self.intro_delay {
                if cancel.wait_timeout(delay) {
                    return Ok(PlaybackOutcome::Interrupted);
                }
            }
        }

        let track = self.selector.track();
        self.play(&self.catalog.path(track), cancel)
    }

    /// Loads and starts the file, then polls the engine until it reports the
    /// track is done. Only a shutdown request ends the wait early, and it stops
    /// playback first.
    pub fn play(&self, path: &Path, cancel: &CancelHandle) -> Result<PlaybackOutcome, AudioError> {
        self.audio.load(path)?;
        self.audio.play()?;
        info!(track = %path.display(), "playing: {}", path.display());

        while self.audio.is_playing() {
            if cancel.wait_timeout(self.poll_interval) {
                info!(track = %path.display(), "Stopping playback.");
                self.audio.stop();
                return Ok(PlaybackOutcome::Interrupted);
            }
        }
        Ok(PlaybackOutcome::Completed)
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, path::PathBuf, thread};

    use super::*;
    use crate::{config, testutil::eventually};

    const POLL: Duration = Duration::from_millis(1);

    fn touch(dir: &Path, name: &str) -> Result<PathBuf, Box<dyn Error>> {
        let path = dir.join(name);
        std::fs::write(&path, b"")?;
        Ok(path)
    }

    fn controller(
        audio: Arc<audio::mock::Device>,
        dir: &Path,
        intro: Option<config::Intro>,
    ) -> Result<PlaybackController, Box<dyn Error>> {
        let intro_delay = intro.as_ref().map(|intro| intro.delay()).transpose()?;
        let catalog = Catalog::new(&config::Tracks::new(dir, 1, "mp3", intro));
        let selector = TrackSelector::with_seed(&catalog, 1);
        Ok(PlaybackController::new(
            audio,
            catalog,
            selector,
            intro_delay,
            POLL,
        ))
    }

    #[test]
    fn test_play_waits_for_completion() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let track = touch(tempdir.path(), "track001.mp3")?;
        let audio = Arc::new(audio::mock::Device::with_busy_polls("mock-audio", 5));
        let controller = controller(audio.clone(), tempdir.path(), None)?;

        assert_eq!(
            PlaybackOutcome::Completed,
            controller.play(&track, &CancelHandle::new())?
        );
        // Five busy answers, then the one that ended the wait.
        assert_eq!(6, audio.status_queries());
        assert!(!audio.is_active());
        Ok(())
    }

    #[test]
    fn test_trigger_plays_intro_then_track() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let intro = touch(tempdir.path(), "intro-1.mp3")?;
        let track = touch(tempdir.path(), "track001.mp3")?;
        let audio = Arc::new(audio::mock::Device::get("mock-audio"));
        let mut controller = controller(
            audio.clone(),
            tempdir.path(),
            Some(config::Intro::new(1, "1ms")),
        )?;

        assert_eq!(
            PlaybackOutcome::Completed,
            controller.on_trigger(Pin::new(12), &CancelHandle::new())?
        );
        assert_eq!(vec![intro, track], audio.played());
        Ok(())
    }

    #[test]
    fn test_intro_delay_elapses_before_track() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        touch(tempdir.path(), "intro-1.mp3")?;
        touch(tempdir.path(), "track001.mp3")?;
        let audio = Arc::new(audio::mock::Device::with_busy_polls("mock-audio", 1));
        let mut controller = controller(
            audio.clone(),
            tempdir.path(),
            Some(config::Intro::new(1, "50ms")),
        )?;

        controller.on_trigger(Pin::new(12), &CancelHandle::new())?;

        let (started, finished) = audio.timeline();
        assert_eq!(2, started.len());
        assert_eq!(2, finished.len());
        assert!(finished[0] >= started[0]);
        assert!(started[1] - finished[0] >= Duration::from_millis(50));
        Ok(())
    }

    #[test]
    fn test_missing_track_is_a_load_error() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let audio = Arc::new(audio::mock::Device::get("mock-audio"));
        let mut controller = controller(audio.clone(), tempdir.path(), None)?;

        match controller.on_trigger(Pin::new(11), &CancelHandle::new()) {
            Err(AudioError::Load { path, .. }) => {
                assert_eq!(tempdir.path().join("track001.mp3"), path)
            }
            other => panic!("expected a load error, got {:?}", other),
        }
        assert!(audio.played().is_empty());
        Ok(())
    }

    #[test]
    fn test_cancel_stops_playback() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let track = touch(tempdir.path(), "track001.mp3")?;
        let audio = Arc::new(audio::mock::Device::with_busy_polls("mock-audio", usize::MAX));
        let controller = controller(audio.clone(), tempdir.path(), None)?;
        let cancel = CancelHandle::new();

        let join = {
            let audio = audio.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                eventually(|| audio.is_active(), "Track never started");
                cancel.cancel();
            })
        };

        assert_eq!(PlaybackOutcome::Interrupted, controller.play(&track, &cancel)?);
        assert!(join.join().is_ok());
        assert_eq!(1, audio.stops());
        assert!(!audio.is_active());
        Ok(())
    }
}
