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

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// Adapts a source to the engine's channel count.
///
/// Anything down-mixed to mono is averaged, mono is copied to every output channel,
/// and other layouts map channel for channel with missing outputs left silent.
pub struct ChannelAdapter<S: SampleSource> {
    source: S,
    target_channels: u16,
    scratch: Vec<Vec<f32>>,
}

impl<S: SampleSource> ChannelAdapter<S> {
    pub fn new(source: S, target_channels: u16) -> Self {
        let scratch = vec![Vec::new(); source.channel_count() as usize];
        ChannelAdapter {
            source,
            target_channels,
            scratch,
        }
    }
}

impl<S: SampleSource> SampleSource for ChannelAdapter<S> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        let source_channels = self.source.channel_count();
        if source_channels == self.target_channels {
            return self.source.next_chunk(output, max_frames);
        }

        prepare_output(output, self.target_channels)?;
        let frames = self.source.next_chunk(&mut self.scratch, max_frames)?;
        if frames == 0 {
            return Ok(0);
        }

        if self.target_channels == 1 {
            let scale = 1.0 / source_channels as f32;
            output[0].extend((0..frames).map(|i| {
                self.scratch.iter().map(|ch| ch[i]).sum::<f32>() * scale
            }));
        } else if source_channels == 1 {
            for out_ch in output.iter_mut() {
                out_ch.extend_from_slice(&self.scratch[0][..frames]);
            }
        } else {
            for (idx, out_ch) in output.iter_mut().enumerate() {
                match self.scratch.get(idx) {
                    Some(in_ch) => out_ch.extend_from_slice(&in_ch[..frames]),
                    None => out_ch.resize(frames, 0.0),
                }
            }
        }

        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.target_channels
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        self.source.duration()
    }
}
