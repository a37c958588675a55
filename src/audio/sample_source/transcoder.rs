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
use std::time::Duration;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Sample rate converter built on rubato. Sources already at the target rate pass
/// straight through.
pub struct AudioTranscoder<S: SampleSource> {
    source: S,
    resampler: Option<SincFixedIn<f32>>,
    source_rate: u32,
    target_rate: u32,
    channels: u16,

    /// Sliding window of input frames (planar).
    input: Vec<Vec<f32>>,
    source_finished: bool,
    /// Resampled frames waiting to be handed out (planar).
    output_fifo: Vec<Vec<f32>>,
    fifo_pos: usize,
    output_scratch: Vec<Vec<f32>>,
    read_scratch: Vec<Vec<f32>>,
}

impl<S: SampleSource> AudioTranscoder<S> {
    /// Creates a transcoder converting the source to the target sample rate.
    pub fn new(source: S, target_rate: u32) -> Result<Self, SampleSourceError> {
        let source_rate = source.sample_rate();
        let channels = source.channel_count();

        let (resampler, output_scratch) = if source_rate != target_rate {
            let sinc_params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                oversampling_factor: 128,
                interpolation: SincInterpolationType::Linear,
                window: WindowFunction::BlackmanHarris2,
            };
            let resampler = SincFixedIn::<f32>::new(
                target_rate as f64 / source_rate as f64,
                1.0,
                sinc_params,
                INPUT_BLOCK_SIZE,
                channels as usize,
            )
            .map_err(|_e| SampleSourceError::ResamplingFailed(source_rate, target_rate))?;
            let scratch = resampler.output_buffer_allocate(true);
            (Some(resampler), scratch)
        } else {
            (None, Vec::new())
        };

        Ok(AudioTranscoder {
            source,
            resampler,
            source_rate,
            target_rate,
            channels,
            input: vec![Vec::with_capacity(INPUT_BLOCK_SIZE * 2); channels as usize],
            source_finished: false,
            output_fifo: vec![Vec::new(); channels as usize],
            fifo_pos: 0,
            output_scratch,
            read_scratch: vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels as usize],
        })
    }

    fn fifo_available(&self) -> usize {
        self.output_fifo
            .first()
            .map(|ch| ch.len() - self.fifo_pos)
            .unwrap_or(0)
    }

    /// Pulls input and runs one resampler step. Returns false once nothing more
    /// can be produced.
    fn fill_output_fifo(&mut self) -> Result<bool, SampleSourceError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(false);
        };

        let needed = resampler.input_frames_next();
        while !self.source_finished && self.input[0].len() < needed {
            let want = needed - self.input[0].len();
            let frames = self.source.next_chunk(&mut self.read_scratch, want)?;
            if frames == 0 {
                self.source_finished = true;
                break;
            }
            for (input, read) in self.input.iter_mut().zip(self.read_scratch.iter()) {
                input.extend_from_slice(&read[..frames]);
            }
        }

        let (consumed, produced) = if self.input[0].len() >= needed {
            resampler
                .process_into_buffer(&self.input[..], &mut self.output_scratch[..], None)
                .map_err(|_e| SampleSourceError::ResamplingFailed(self.source_rate, self.target_rate))?
        } else if self.source_finished && !self.input[0].is_empty() {
            let (_consumed, produced) = resampler
                .process_partial_into_buffer(
                    Some(&self.input[..]),
                    &mut self.output_scratch[..],
                    None,
                )
                .map_err(|_e| SampleSourceError::ResamplingFailed(self.source_rate, self.target_rate))?;
            (self.input[0].len(), produced)
        } else {
            return Ok(false);
        };

        for input in self.input.iter_mut() {
            input.drain(..consumed.min(input.len()));
        }

        // Compact before appending so the fifo does not grow without bound.
        if self.fifo_pos > 0 {
            for ch in self.output_fifo.iter_mut() {
                ch.drain(..self.fifo_pos);
            }
            self.fifo_pos = 0;
        }
        for (fifo, out) in self.output_fifo.iter_mut().zip(self.output_scratch.iter()) {
            fifo.extend_from_slice(&out[..produced]);
        }

        Ok(produced > 0 || consumed > 0)
    }
}

impl<S: SampleSource> SampleSource for AudioTranscoder<S> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        if self.resampler.is_none() {
            return self.source.next_chunk(output, max_frames);
        }

        prepare_output(output, self.channels)?;
        let mut total = 0;
        while total < max_frames {
            let available = self.fifo_available();
            if available == 0 {
                if !self.fill_output_fifo()? {
                    break;
                }
                continue;
            }

            let to_copy = available.min(max_frames - total);
            for (out_ch, fifo) in output.iter_mut().zip(self.output_fifo.iter()) {
                out_ch.extend_from_slice(&fifo[self.fifo_pos..self.fifo_pos + to_copy]);
            }
            self.fifo_pos += to_copy;
            total += to_copy;
        }

        Ok(total)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.target_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.source.duration()
    }
}

#[cfg(test)]
mod test {
    use crate::audio::sample_source::MemorySampleSource;

    use super::*;

    fn drain<S: SampleSource>(source: &mut S) -> Vec<Vec<f32>> {
        let channels = source.channel_count() as usize;
        let mut all = vec![Vec::new(); channels];
        let mut chunk = vec![Vec::new(); channels];
        while source.next_chunk(&mut chunk, 512).unwrap() > 0 {
            for (all_ch, chunk_ch) in all.iter_mut().zip(chunk.iter()) {
                all_ch.extend_from_slice(chunk_ch);
            }
        }
        all
    }

    #[test]
    fn test_same_rate_passthrough() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let source = MemorySampleSource::new(samples.clone(), 1, 48000);
        let mut transcoder = AudioTranscoder::new(source, 48000).unwrap();
        assert_eq!(48000, transcoder.sample_rate());

        let output = drain(&mut transcoder);
        assert_eq!(samples, output[0]);
    }

    #[test]
    fn test_upsample_44100_to_48000() {
        let frames = 44100;
        let samples: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * 0.5;
                [s, s]
            })
            .collect();
        let source = MemorySampleSource::new(samples, 2, 44100);
        let mut transcoder = AudioTranscoder::new(source, 48000).unwrap();
        assert_eq!(48000, transcoder.sample_rate());
        assert_eq!(2, transcoder.channel_count());

        let output = drain(&mut transcoder);
        assert_eq!(output[0].len(), output[1].len());
        // One second in, roughly one second out. The sinc filter adds some delay padding.
        let produced = output[0].len() as i64;
        assert!((produced - 48000).abs() < 2048, "produced {} frames", produced);
        assert!(output[0].iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_empty_source() {
        let source = MemorySampleSource::new(Vec::new(), 1, 44100);
        let mut transcoder = AudioTranscoder::new(source, 48000).unwrap();
        let mut output = vec![Vec::new()];
        assert_eq!(0, transcoder.next_chunk(&mut output, 512).unwrap());
    }
}
