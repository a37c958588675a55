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
    error::Error,
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use super::sample_source::{self, SampleSource};
use super::thread_priority;
use crate::{
    audio::{AudioError, Device as AudioDevice, SampleFormat, TargetFormat},
    config,
};

/// Lock-free single producer, single consumer ring of interleaved samples.
/// Samples are stored as f32 bit patterns so both sides can share it without locking.
struct CircularBuffer {
    buffer: Box<[AtomicU32]>,
    /// Capacity (power of 2)
    capacity: usize,
    /// Reads only ever consume whole frames.
    channels: usize,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
    /// Set when the queued samples should be dropped. The reader honors it, so only
    /// the reader ever moves `read_pos`.
    flush: AtomicBool,
}

impl CircularBuffer {
    fn new(capacity: usize, channels: u16) -> Self {
        let capacity = capacity.next_power_of_two();
        Self {
            buffer: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            capacity,
            channels: channels.max(1) as usize,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
            flush: AtomicBool::new(false),
        }
    }

    #[inline]
    fn available(&self) -> usize {
        if self.flush.load(Ordering::Acquire) {
            return 0;
        }
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read) & (self.capacity - 1)
    }

    #[inline]
    fn space(&self) -> usize {
        self.capacity - self.available() - 1
    }

    fn is_empty(&self) -> bool {
        self.available() < self.channels
    }

    /// Drops everything queued. Writes are refused until the reader has caught up.
    fn clear(&self) {
        self.flush.store(true, Ordering::Release);
    }

    /// Writes as many samples as fit. Returns the number written.
    fn write(&self, samples: &[f32]) -> usize {
        if self.flush.load(Ordering::Acquire) {
            return 0;
        }
        let to_write = self.space().min(samples.len());
        let write = self.write_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;
        for (i, sample) in samples[..to_write].iter().enumerate() {
            self.buffer[(write + i) & mask].store(sample.to_bits(), Ordering::Relaxed);
        }
        self.write_pos
            .store((write + to_write) & mask, Ordering::Release);
        to_write
    }

    /// Reads whole frames into the output. Returns the number of samples read.
    fn read(&self, output: &mut [f32]) -> usize {
        if self.flush.load(Ordering::Acquire) {
            self.read_pos
                .store(self.write_pos.load(Ordering::Acquire), Ordering::Release);
            self.flush.store(false, Ordering::Release);
        }
        let available = self.available();
        let to_read = available.min(output.len());
        let to_read = to_read - to_read % self.channels;
        let read = self.read_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;
        for (i, out) in output[..to_read].iter_mut().enumerate() {
            *out = f32::from_bits(self.buffer[(read + i) & mask].load(Ordering::Relaxed));
        }
        self.read_pos
            .store((read + to_read) & mask, Ordering::Release);
        to_read
    }
}

/// Owns the cpal output stream. The stream is created and kept alive on its own
/// thread since cpal streams cannot move between threads.
struct OutputManager {
    ring: Arc<CircularBuffer>,
    running: Arc<AtomicBool>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl OutputManager {
    fn start(
        device: ::cpal::Device,
        target_format: &TargetFormat,
        channels: u16,
        buffer_size: usize,
        stream_buffer_size: Option<u32>,
    ) -> Result<OutputManager, AudioError> {
        // At least ~100ms of audio, and never less than two decode buffers.
        let capacity = (target_format.sample_rate as usize * channels as usize / 10)
            .max(buffer_size * channels as usize * 2);
        let ring = Arc::new(CircularBuffer::new(capacity, channels));
        let running = Arc::new(AtomicBool::new(true));

        let config = ::cpal::StreamConfig {
            channels,
            sample_rate: ::cpal::SampleRate(target_format.sample_rate),
            buffer_size: match stream_buffer_size {
                Some(frames) => ::cpal::BufferSize::Fixed(frames),
                None => ::cpal::BufferSize::Default,
            },
        };

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let output_thread = {
            let ring = ring.clone();
            let running = running.clone();
            let target_format = target_format.clone();
            thread::spawn(move || {
                let stream = match (target_format.sample_format, target_format.bits_per_sample) {
                    (SampleFormat::Float, _) => build_stream::<f32>(&device, &config, ring),
                    (SampleFormat::Int, 16) => build_stream::<i16>(&device, &config, ring),
                    (SampleFormat::Int, 32) => build_stream::<i32>(&device, &config, ring),
                    (format, bits) => Err(format!("unsupported output format {}-bit {}", bits, format)),
                };
                let stream = match stream.and_then(|stream| {
                    stream.play().map_err(|e| e.to_string())?;
                    Ok(stream)
                }) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                info!("Output stream started.");

                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(100));
                }
                drop(stream);
            })
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(OutputManager {
                ring,
                running,
                output_thread: Some(output_thread),
            }),
            Ok(Err(e)) => {
                let _ = output_thread.join();
                Err(AudioError::Device(format!("unable to start output stream: {}", e)))
            }
            Err(_) => Err(AudioError::Device(
                "output thread exited before the stream started".to_string(),
            )),
        }
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Builds an output stream that drains the ring, zero-filling any shortfall.
fn build_stream<T>(
    device: &::cpal::Device,
    config: &::cpal::StreamConfig,
    ring: Arc<CircularBuffer>,
) -> Result<::cpal::Stream, String>
where
    T: ::cpal::SizedSample + ::cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &::cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                let read = ring.read(&mut scratch);
                scratch[read..].fill(0.0);
                for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(src);
                }
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(|e| e.to_string())
}

/// The single active playback. The producer thread decodes the track into the ring.
struct Session {
    path: PathBuf,
    ring: Arc<CircularBuffer>,
    active: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    producer: Option<thread::JoinHandle<()>>,
}

impl Session {
    fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(producer) = self.producer.take() {
            if producer.join().is_err() {
                error!(track = %self.path.display(), "Producer thread panicked.");
            }
        }
        // Whatever is still queued belongs to this track.
        self.ring.clear();
        self.active.store(false, Ordering::Release);
    }
}

/// Pushes the whole source into the ring, interleaving as it goes.
fn produce(
    mut source: Box<dyn SampleSource>,
    ring: &CircularBuffer,
    stop: &AtomicBool,
    buffer_size: usize,
) -> Result<(), sample_source::SampleSourceError> {
    let channels = source.channel_count() as usize;
    let mut planar = vec![Vec::with_capacity(buffer_size); channels];
    let mut interleaved = Vec::with_capacity(buffer_size * channels);

    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
        let frames = source.next_chunk(&mut planar, buffer_size)?;
        if frames == 0 {
            return Ok(());
        }

        interleaved.clear();
        for i in 0..frames {
            interleaved.extend(planar.iter().map(|ch| ch[i]));
        }

        let mut written = 0;
        while written < interleaved.len() {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            let n = ring.write(&interleaved[written..]);
            written += n;
            if n == 0 {
                thread::sleep(Duration::from_micros(500));
            }
        }
    }
}

/// A small wrapper around a cpal::Device with a single playback slot.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: ::cpal::HostId,
    /// The underlying cpal device.
    device: ::cpal::Device,
    /// The format rendered to the device.
    target_format: TargetFormat,
    /// The number of output channels rendered.
    channels: u16,
    /// How long to wait before playback of a track starts.
    playback_delay: Duration,
    /// Frames decoded per chunk.
    buffer_size: usize,
    /// The running output stream. None for devices that were only listed.
    output: Option<OutputManager>,
    /// The track loaded and waiting for play.
    loaded: Mutex<Option<(PathBuf, Box<dyn SampleSource>)>>,
    /// The active playback.
    session: Mutex<Option<Session>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    fn new(name: String, max_channels: u16, host_id: ::cpal::HostId, device: ::cpal::Device) -> Self {
        Device {
            name,
            max_channels,
            host_id,
            device,
            target_format: TargetFormat::default(),
            channels: 1,
            playback_delay: Duration::ZERO,
            buffer_size: 0,
            output: None,
            loaded: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices with at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in ::cpal::available_hosts() {
            let host_devices = match ::cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device::new(device.name()?, max_channels, host_id, device));
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Opens the configured device and starts its output stream. The device name
    /// "default" selects the default output device of the default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let mut device = if name == "default" {
            let host = ::cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            let max_channels = device
                .supported_output_configs()?
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);
            Device::new(device.name()?, max_channels, host.id(), device)
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| format!("no device found with name {}", name))?
        };

        let channels = config.channels();
        if device.max_channels < channels {
            return Err(format!(
                "{} channels requested, audio device {} only has {}",
                channels, device.name, device.max_channels
            )
            .into());
        }

        device.target_format = TargetFormat::new(
            config.sample_rate(),
            config.sample_format()?,
            config.bits_per_sample(),
        )?;
        device.channels = channels;
        device.playback_delay = config.playback_delay()?;
        device.buffer_size = config.buffer_size();
        device.output = Some(OutputManager::start(
            device.device.clone(),
            &device.target_format,
            channels,
            device.buffer_size,
            config.stream_buffer_size(),
        )?);

        info!(
            device = device.name,
            sample_rate = device.target_format.sample_rate,
            format = %device.target_format.sample_format,
            bits = device.target_format.bits_per_sample,
            channels,
            "Opened audio device."
        );
        Ok(device)
    }
}

impl AudioDevice for Device {
    fn load(&self, path: &Path) -> Result<(), AudioError> {
        let source = sample_source::open_track(path, self.target_format.sample_rate, self.channels)
            .map_err(|source| AudioError::Load {
                path: path.to_path_buf(),
                source,
            })?;
        *self.loaded.lock() = Some((path.to_path_buf(), source));
        Ok(())
    }

    fn play(&self) -> Result<(), AudioError> {
        let span = span!(Level::INFO, "play track (cpal)");
        let _enter = span.enter();

        let output = self
            .output
            .as_ref()
            .ok_or_else(|| AudioError::Device(format!("device {} is not open", self.name)))?;
        let (path, source) = self.loaded.lock().take().ok_or(AudioError::NothingLoaded)?;

        // Single slot: whatever was playing is replaced.
        self.stop();

        info!(
            device = self.name,
            track = %path.display(),
            duration = source
                .duration()
                .map(crate::tracks::minutes_seconds)
                .unwrap_or_else(|| "unknown".to_string()),
            "Playing track."
        );

        let active = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(AtomicBool::new(false));
        let producer = {
            let active = active.clone();
            let stop = stop.clone();
            let ring = output.ring.clone();
            let buffer_size = self.buffer_size;
            let playback_delay = self.playback_delay;
            let path = path.clone();
            thread::spawn(move || {
                thread_priority::configure_current_thread();
                spin_sleep::sleep(playback_delay);

                if let Err(e) = produce(source, &ring, &stop, buffer_size) {
                    error!(track = %path.display(), err = %e, "Error while decoding track.");
                }
                // Let the tail of the track drain out of the ring before reporting completion.
                while !stop.load(Ordering::Relaxed) && !ring.is_empty() {
                    thread::sleep(Duration::from_millis(1));
                }
                active.store(false, Ordering::Release);
            })
        };

        *self.session.lock() = Some(Session {
            path,
            ring: output.ring.clone(),
            active,
            stop,
            producer: Some(producer),
        });
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| session.active.load(Ordering::Acquire))
    }

    fn stop(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.stop();
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.stop();
    }
}
