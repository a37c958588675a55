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
use std::error::Error;
use std::path::Path;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pirplay::config::Player;
use pirplay::hardware::Hardware;
use pirplay::playsync::CancelHandle;
use pirplay::sensing::{self, ControlLoop};
use pirplay::{audio, gpio, tracks};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=motion-triggered audio player
After=sound.target

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/pirplay
ExecStart=/usr/local/bin/pirplay start "$PIRPLAY_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=pirplay.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A motion-triggered audio player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will wait for motion and play tracks until interrupted.
    Start {
        /// The path to the player config. Compiled defaults are used when omitted.
        config: Option<String>,
    },
    /// Verifies that every track and intro exists and decodes.
    Tracks {
        /// The path to the player config.
        config: Option<String>,
    },
    /// Reads every sensor pin once.
    Pins {
        /// The path to the player config.
        config: Option<String>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => {
            let player = Player::load(config.as_deref().map(Path::new))?;
            info!(version = crate_version!(), "Starting pirplay.");

            let hardware = Hardware::acquire(&player)?;
            let control = ControlLoop::new(&player, &hardware)?;
            let shutdown = sensing::shutdown_signal()?;
            sensing::supervise(control, &hardware, CancelHandle::new(), shutdown).await?;
        }
        Commands::Tracks { config } => {
            let player = Player::load(config.as_deref().map(Path::new))?;
            let catalog = tracks::Catalog::new(player.tracks());

            println!("Tracks in {}:", catalog.directory().display());
            let failures = tracks::print_report(&tracks::verify(&catalog));
            if failures > 0 {
                return Err(format!("{} file(s) missing or unreadable", failures).into());
            }
        }
        Commands::Pins { config } => {
            let player = Player::load(config.as_deref().map(Path::new))?;
            let device = gpio::get_device(player.gpio())?;

            println!("Pins ({} numbering) on {}:", player.gpio().numbering(), device);
            for pin in player.gpio().pins() {
                device.configure_input(*pin)?;
            }
            for pin in player.gpio().pins() {
                println!("- {}: {}", pin, device.read(*pin)?);
            }
            device.release();
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
