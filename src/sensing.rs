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
use std::{future::Future, io, time::Duration};

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, span, warn, Level};

use crate::{
    audio::AudioError,
    config::{self, ConfigError},
    gpio::{GpioError, Pin},
    hardware::Hardware,
    playback::{PlaybackController, PlaybackOutcome},
    playsync::CancelHandle,
    scanner::{ScanOutcome, Scanner},
    tracks::{Catalog, TrackSelector},
};

/// A failure that stops the control loop.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("sensor error: {0}")]
    Gpio(#[from] GpioError),

    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("control loop panicked: {0}")]
    Panicked(String),
}

/// Why the control loop stopped.
#[derive(Debug)]
pub enum Shutdown {
    Interrupt,
    Fault(LoopError),
}

enum State {
    IdleScan,
    Playing(Pin),
    ShuttingDown(Shutdown),
}

/// Alternates between scanning the sensors and playing a track. Sensing and
/// playback never overlap: a trigger is handled to completion before the next
/// pass starts from the first pin.
pub struct ControlLoop {
    scanner: Scanner,
    playback: PlaybackController,
    startup_delay: Duration,
    pass_delay: Duration,
}

impl ControlLoop {
    /// Builds the loop on top of the acquired hardware.
    pub fn new(config: &config::Player, hardware: &Hardware) -> Result<ControlLoop, ConfigError> {
        let catalog = Catalog::new(config.tracks());
        let selector = TrackSelector::new(&catalog);
        ControlLoop::with_selector(config, hardware, catalog, selector)
    }

    fn with_selector(
        config: &config::Player,
        hardware: &Hardware,
        catalog: Catalog,
        selector: TrackSelector,
    ) -> Result<ControlLoop, ConfigError> {
        let timing = config.timing();
        let intro_delay = config
            .tracks()
            .intro()
            .map(|intro| intro.delay())
            .transpose()?;

        Ok(ControlLoop {
            scanner: Scanner::new(hardware.gpio(), config.gpio().pins()),
            playback: PlaybackController::new(
                hardware.audio(),
                catalog,
                selector,
                intro_delay,
                timing.poll_interval()?,
            ),
            startup_delay: timing.startup_delay()?,
            pass_delay: timing.pass_delay()?,
        })
    }

    /// Runs until shutdown is requested or something fails.
    pub fn run(&mut self, cancel: &CancelHandle) -> Shutdown {
        let span = span!(Level::INFO, "control loop");
        let _enter = span.enter();

        info!(pins = ?self.scanner.pins(), "Waiting for sensors to settle.");
        if cancel.wait_timeout(self.startup_delay) {
            return Shutdown::Interrupt;
        }
        info!("Sensing.");

        let mut state = State::IdleScan;
        loop {
            state = match state {
                State::IdleScan => match self.scanner.scan(cancel) {
                    Ok(ScanOutcome::Triggered(pin)) => State::Playing(pin),
                    Ok(ScanOutcome::NoTrigger) => self.pace(cancel),
                    Ok(ScanOutcome::Interrupted) => State::ShuttingDown(Shutdown::Interrupt),
                    Err(e) => State::ShuttingDown(Shutdown::Fault(e.into())),
                },
                State::Playing(pin) => match self.playback.on_trigger(pin, cancel) {
                    Ok(PlaybackOutcome::Completed) => self.pace(cancel),
                    Ok(PlaybackOutcome::Interrupted) => State::ShuttingDown(Shutdown::Interrupt),
                    Err(e @ AudioError::Load { .. }) => {
                        warn!(err = %e, "Skipping unplayable file.");
                        self.pace(cancel)
                    }
                    Err(e) => State::ShuttingDown(Shutdown::Fault(e.into())),
                },
                State::ShuttingDown(shutdown) => return shutdown,
            };
        }
    }

    /// Ends a pass: separator, then the pacing delay.
    fn pace(&self, cancel: &CancelHandle) -> State {
        info!("-----");
        if cancel.wait_timeout(self.pass_delay) {
            State::ShuttingDown(Shutdown::Interrupt)
        } else {
            State::IdleScan
        }
    }
}

/// Listens for SIGINT and SIGTERM. The returned future resolves on the first
/// of either. The SIGTERM handler is installed before this returns, so a stop
/// from the service manager is never lost.
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(err = %e, "Unable to listen for interrupts.");
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = interrupt => info!("SIGINT received."),
            _ = terminate.recv() => info!("SIGTERM received."),
        }
    })
}

/// Runs the control loop on a blocking thread until it stops on its own or the
/// interrupt future resolves, then releases the hardware. Interrupts end in Ok.
pub async fn supervise<F>(
    mut control: ControlLoop,
    hardware: &Hardware,
    cancel: CancelHandle,
    interrupt: F,
) -> Result<(), LoopError>
where
    F: Future<Output = ()>,
{
    let mut handle = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || control.run(&cancel)
    });

    let result = tokio::select! {
        result = &mut handle => result,
        _ = interrupt => {
            info!("Interrupt received.");
            cancel.cancel();
            handle.await
        }
    };

    hardware.release();

    match result {
        Ok(Shutdown::Interrupt) => Ok(()),
        Ok(Shutdown::Fault(e)) => {
            error!(err = %e, "Control loop failed.");
            Err(e)
        }
        Err(e) => Err(LoopError::Panicked(e.to_string())),
    }
}
