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
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::warn;

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// A sample source that decodes audio files (MP3, WAV, FLAC, etc.) with symphonia.
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
    /// Interleaved samples from the last decoded packet not yet handed out.
    pending: Vec<f32>,
    pending_pos: usize,
    is_finished: bool,
}

impl AudioSampleSource {
    /// Opens and probes the given file. Fails if the file is missing, is not a
    /// recognizable audio container, or has no decodable audio track.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SampleSourceError> {
        let path = path.as_ref();
        let file_path = path.display().to_string();
        let file = File::open(path).map_err(|e| {
            SampleSourceError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", file_path, e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| {
                SampleSourceError::SampleConversionFailed(format!("'{}': {}", file_path, e))
            })?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SampleSourceError::NoAudioTrack(file_path.clone()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.ok_or_else(|| {
            SampleSourceError::SampleConversionFailed(format!(
                "'{}': sample rate not specified",
                file_path
            ))
        })?;
        let duration = params
            .n_frames
            .map(|n_frames| Duration::from_secs_f64(n_frames as f64 / sample_rate as f64));

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs().make(&params, &decoder_opts).map_err(|e| {
            SampleSourceError::SampleConversionFailed(format!("'{}': {}", file_path, e))
        })?;

        // MP3 streams frequently omit the channel layout until the first frame is decoded.
        let (channels, pending) = match params.channels {
            Some(channels) if channels.count() > 0 => (channels.count() as u16, Vec::new()),
            _ => match decode_next_packet(format_reader.as_mut(), decoder.as_mut(), track_id)? {
                Some((samples, channels)) => (channels as u16, samples),
                None => {
                    return Err(SampleSourceError::SampleConversionFailed(format!(
                        "'{}': channels not specified",
                        file_path
                    )))
                }
            },
        };

        Ok(AudioSampleSource {
            format_reader,
            decoder,
            track_id,
            channels,
            sample_rate,
            duration,
            pending,
            pending_pos: 0,
            is_finished: false,
        })
    }

    /// Decodes the next packet into the pending buffer. Returns false at end of stream.
    fn refill(&mut self) -> Result<bool, SampleSourceError> {
        self.pending.clear();
        self.pending_pos = 0;

        match decode_next_packet(
            self.format_reader.as_mut(),
            self.decoder.as_mut(),
            self.track_id,
        )? {
            Some((samples, channels)) => {
                if channels != self.channels as usize {
                    return Err(SampleSourceError::SampleConversionFailed(format!(
                        "channel count changed mid-stream: {} -> {}",
                        self.channels, channels
                    )));
                }
                self.pending = samples;
                Ok(true)
            }
            None => {
                self.is_finished = true;
                Ok(false)
            }
        }
    }
}

/// Reads packets until one for the given track decodes to audio. Returns the
/// interleaved samples and their channel count, or None at end of stream.
fn decode_next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Option<(Vec<f32>, usize)>, SampleSourceError> {
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(SampleSourceError::AudioError(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(err)) => {
                // A corrupt frame in an otherwise valid MP3 is skipped, not fatal.
                warn!(err, "Skipping undecodable packet.");
                continue;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(SampleSourceError::AudioError(e)),
        };
        if decoded.frames() == 0 {
            continue;
        }

        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        return Ok(Some((buffer.samples().to_vec(), spec.channels.count())));
    }
}

impl SampleSource for AudioSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channels)?;

        let channels = self.channels as usize;
        let mut frames = 0;
        while frames < max_frames {
            let available = (self.pending.len() - self.pending_pos) / channels;
            if available == 0 {
                if self.is_finished || !self.refill()? {
                    break;
                }
                continue;
            }

            let to_take = available.min(max_frames - frames);
            let pending = &self.pending[self.pending_pos..self.pending_pos + to_take * channels];
            for frame in pending.chunks_exact(channels) {
                for (out_ch, sample) in output.iter_mut().zip(frame) {
                    out_ch.push(*sample);
                }
            }
            self.pending_pos += to_take * channels;
            frames += to_take;
        }

        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::testutil::write_wav;

    use super::*;

    #[test]
    fn test_decode_wav() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("track001.wav");
        let left: Vec<i16> = (0..1000).map(|i| (i % 100) as i16 * 100).collect();
        let right: Vec<i16> = left.iter().map(|s| -s).collect();
        write_wav(&path, &[left, right], 44100)?;

        let mut source = AudioSampleSource::from_file(&path)?;
        assert_eq!(2, source.channel_count());
        assert_eq!(44100, source.sample_rate());
        let duration = source.duration().expect("wav should report a duration");
        assert_eq!(1000, (duration.as_secs_f64() * 44100.0).round() as usize);

        let mut output = vec![Vec::new(), Vec::new()];
        let mut total = 0;
        loop {
            let frames = source.next_chunk(&mut output, 256)?;
            if frames == 0 {
                break;
            }
            assert_eq!(frames, output[0].len());
            assert_eq!(frames, output[1].len());
            for (l, r) in output[0].iter().zip(output[1].iter()) {
                assert!((l + r).abs() < 1e-6);
            }
            total += frames;
        }
        assert_eq!(1000, total);

        // Exhausted sources keep reporting end of stream.
        assert_eq!(0, source.next_chunk(&mut output, 256)?);
        Ok(())
    }

    #[test]
    fn test_missing_file_names_path() {
        let result = AudioSampleSource::from_file("/nonexistent/track099.mp3");
        match result {
            Err(SampleSourceError::IoError(e)) => {
                assert_eq!(std::io::ErrorKind::NotFound, e.kind());
                assert!(e.to_string().contains("track099.mp3"));
            }
            _ => panic!("expected an IO error"),
        }
    }

    #[test]
    fn test_garbage_file_is_rejected() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("track001.mp3");
        std::fs::write(&path, b"this is not an mp3 file")?;

        assert!(AudioSampleSource::from_file(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_wrong_output_channel_count() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("mono.wav");
        write_wav(&path, &[vec![0i16; 10]], 48000)?;

        let mut source = AudioSampleSource::from_file(&path)?;
        let mut output = vec![Vec::new(), Vec::new()];
        assert!(source.next_chunk(&mut output, 10).is_err());
        Ok(())
    }
}
