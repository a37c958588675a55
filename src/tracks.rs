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
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    audio::sample_source::{AudioSampleSource, SampleSource},
    config,
};

/// An audio asset, identified by its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRef {
    /// A main track, numbered from 1.
    Main(u32),
    /// An intro clip, numbered from 1.
    Intro(u32),
}

impl TrackRef {
    /// The file name of the asset. Main tracks carry a literal leading zero ahead
    /// of the index padded to two digits: 5 is track005, 15 is track015.
    pub fn file_name(&self, extension: &str) -> String {
        match self {
            TrackRef::Main(index) => format!("track0{:02}.{}", index, extension),
            TrackRef::Intro(index) => format!("intro-{}.{}", index, extension),
        }
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackRef::Main(index) => write!(f, "track {}", index),
            TrackRef::Intro(index) => write!(f, "intro {}", index),
        }
    }
}

/// Where the assets live and how many there are.
#[derive(Debug, Clone)]
pub struct Catalog {
    directory: PathBuf,
    extension: String,
    total: u32,
    intro_count: Option<u32>,
}

impl Catalog {
    pub fn new(config: &config::Tracks) -> Catalog {
        Catalog {
            directory: config.directory().to_path_buf(),
            extension: config.extension().to_string(),
            total: config.total(),
            intro_count: config.intro().map(|intro| intro.count()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path(&self, track: TrackRef) -> PathBuf {
        self.directory.join(track.file_name(&self.extension))
    }

    /// Every asset the player may pick: main tracks first, then intros.
    pub fn all(&self) -> Vec<TrackRef> {
        (1..=self.total)
            .map(TrackRef::Main)
            .chain((1..=self.intro_count.unwrap_or(0)).map(TrackRef::Intro))
            .collect()
    }
}

/// Picks tracks uniformly at random.
pub struct TrackSelector {
    rng: StdRng,
    total: u32,
    intro_count: Option<u32>,
}

impl TrackSelector {
    pub fn new(catalog: &Catalog) -> TrackSelector {
        TrackSelector::with_rng(catalog, StdRng::from_entropy())
    }

    /// A selector with a reproducible sequence.
    pub fn with_seed(catalog: &Catalog, seed: u64) -> TrackSelector {
        TrackSelector::with_rng(catalog, StdRng::seed_from_u64(seed))
    }

    fn with_rng(catalog: &Catalog, rng: StdRng) -> TrackSelector {
        TrackSelector {
            rng,
            total: catalog.total.max(1),
            intro_count: catalog.intro_count.map(|count| count.max(1)),
        }
    }

    /// A main track in [1, total].
    pub fn track(&mut self) -> TrackRef {
        TrackRef::Main(self.rng.gen_range(1..=self.total))
    }

    /// An intro in [1, count], or None when there is no pre-roll.
    pub fn intro(&mut self) -> Option<TrackRef> {
        let count = self.intro_count?;
        Some(TrackRef::Intro(self.rng.gen_range(1..=count)))
    }
}

/// Formats a track length as m:ss.
pub fn minutes_seconds(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// The outcome of checking one asset.
#[derive(Debug)]
pub struct Verified {
    pub track: TrackRef,
    pub path: PathBuf,
    /// The duration if the file decoded, or why it didn't.
    pub result: Result<Option<Duration>, String>,
}

/// Opens every asset in the catalog and reports its duration.
pub fn verify(catalog: &Catalog) -> Vec<Verified> {
    catalog
        .all()
        .into_iter()
        .map(|track| {
            let path = catalog.path(track);
            let result = AudioSampleSource::from_file(&path)
                .map(|source| source.duration())
                .map_err(|e| e.to_string());
            Verified {
                track,
                path,
                result,
            }
        })
        .collect()
}

/// Prints a verification report. Returns the number of unusable assets.
pub fn print_report(report: &[Verified]) -> usize {
    let mut failures = 0;
    for verified in report {
        match &verified.result {
            Ok(duration) => println!(
                "\u{2705} {} ({})",
                verified.path.display(),
                duration
                    .map(minutes_seconds)
                    .unwrap_or_else(|| "unknown length".to_string())
            ),
            Err(e) => {
                failures += 1;
                println!("\u{274c} {}: {}", verified.path.display(), e);
            }
        }
    }
    if failures == 0 {
        println!("All {} file(s) passed verification.", report.len());
    }
    failures
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::testutil::write_wav;

    fn catalog(directory: &Path, total: u32, intro: Option<config::Intro>) -> Catalog {
        Catalog::new(&config::Tracks::new(directory, total, "mp3", intro))
    }

    #[test]
    fn test_file_names() {
        assert_eq!("track005.mp3", TrackRef::Main(5).file_name("mp3"));
        assert_eq!("track009.mp3", TrackRef::Main(9).file_name("mp3"));
        assert_eq!("track010.mp3", TrackRef::Main(10).file_name("mp3"));
        assert_eq!("track015.mp3", TrackRef::Main(15).file_name("mp3"));
        assert_eq!("track021.wav", TrackRef::Main(21).file_name("wav"));
        assert_eq!("intro-2.mp3", TrackRef::Intro(2).file_name("mp3"));
    }

    #[test]
    fn test_minutes_seconds() {
        assert_eq!("0:00", minutes_seconds(Duration::ZERO));
        assert_eq!("0:59", minutes_seconds(Duration::from_millis(59_900)));
        assert_eq!("3:05", minutes_seconds(Duration::from_secs(185)));
        assert_eq!("61:00", minutes_seconds(Duration::from_secs(3660)));
    }

    #[test]
    fn test_paths() {
        let catalog = catalog(Path::new("/home/pi/mursSonors/sonsMur"), 21, None);
        assert_eq!(
            PathBuf::from("/home/pi/mursSonors/sonsMur/track007.mp3"),
            catalog.path(TrackRef::Main(7))
        );
        assert_eq!(21, catalog.all().len());
    }

    #[test]
    fn test_selection_is_uniform() {
        let catalog = catalog(Path::new("/tmp"), 21, None);
        let mut selector = TrackSelector::with_seed(&catalog, 7);
        let mut counts = [0usize; 22];
        for _ in 0..42_000 {
            match selector.track() {
                TrackRef::Main(index) => counts[index as usize] += 1,
                other => panic!("unexpected {}", other),
            }
        }
        assert_eq!(0, counts[0]);
        // Expect 2000 each.
        for (index, count) in counts.iter().enumerate().skip(1) {
            assert!(
                (1700..2300).contains(count),
                "track {} picked {} times",
                index,
                count
            );
        }
        assert_eq!(None, selector.intro());
    }

    #[test]
    fn test_intro_selection() {
        let catalog = catalog(Path::new("/tmp"), 21, Some(config::Intro::default()));
        let mut selector = TrackSelector::with_seed(&catalog, 11);
        let mut seen = [false; 3];
        for _ in 0..200 {
            match selector.intro() {
                Some(TrackRef::Intro(k)) if (1..=2).contains(&k) => seen[k as usize] = true,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(seen[1] && seen[2]);
    }

    #[test]
    fn test_verify() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let tracks = config::Tracks::new(
            tempdir.path(),
            2,
            "wav",
            Some(config::Intro::new(1, "2s")),
        );
        let catalog = Catalog::new(&tracks);
        write_wav(&catalog.path(TrackRef::Main(1)), &[vec![0i16; 48000]], 48000)?;
        write_wav(&catalog.path(TrackRef::Intro(1)), &[vec![0i16; 4800]], 48000)?;

        let report = verify(&catalog);
        assert_eq!(3, report.len());
        assert_eq!(TrackRef::Main(1), report[0].track);
        assert!(report[0].result.is_ok());
        assert_eq!(TrackRef::Main(2), report[1].track);
        assert!(report[1].result.is_err());
        assert_eq!(TrackRef::Intro(1), report[2].track);
        assert!(report[2].result.is_ok());
        assert_eq!(1, print_report(&report));
        Ok(())
    }
}
