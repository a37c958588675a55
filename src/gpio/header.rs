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

/// The highest GPIO line exposed on the 40-pin header.
pub const MAX_BCM_LINE: u8 = 27;

/// Maps a physical header position to its BCM GPIO line. Power, ground and
/// out-of-range positions have no line.
pub fn board_to_bcm(position: u8) -> Option<u8> {
    let line = match position {
        3 => 2,
        5 => 3,
        7 => 4,
        8 => 14,
        10 => 15,
        11 => 17,
        12 => 18,
        13 => 27,
        15 => 22,
        16 => 23,
        18 => 24,
        19 => 10,
        21 => 9,
        22 => 25,
        23 => 11,
        24 => 8,
        26 => 7,
        27 => 0,
        28 => 1,
        29 => 5,
        31 => 6,
        32 => 12,
        33 => 13,
        35 => 19,
        36 => 16,
        37 => 26,
        38 => 20,
        40 => 21,
        _ => return None,
    };
    Some(line)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_power_and_ground_have_no_line() {
        for position in [1, 2, 4, 6, 9, 14, 17, 20, 25, 30, 34, 39] {
            assert_eq!(None, board_to_bcm(position), "position {}", position);
        }
        assert_eq!(None, board_to_bcm(0));
        assert_eq!(None, board_to_bcm(41));
    }

    #[test]
    fn test_every_line_mapped_once() {
        let lines: HashSet<u8> = (1..=40).filter_map(board_to_bcm).collect();
        assert_eq!(28, lines.len());
        assert!(lines.iter().all(|line| *line <= MAX_BCM_LINE));
    }
}
