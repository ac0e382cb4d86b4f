// src/naming.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Object names used on the provider, all within the target bucket:
//
//   <name>-part-<8 digits>             temporary chunk
//   <name>.tar.gz                      final, single object
//   <name>-part-<N digits>.tar.gz      final, multi-part
//   <target>-temp-<round>-<batch>      composition round (temporary)

use crate::constants::{ARCHIVE_EXTENSION, CHUNK_INDEX_DIGITS};

/// Temporary object holding chunk `index` of the compressed stream.
pub fn chunk_name(name: &str, index: usize) -> String {
    format!("{name}-part-{index:0width$}", width = CHUNK_INDEX_DIGITS)
}

/// The single deliverable object.
pub fn final_name(name: &str) -> String {
    format!("{name}{ARCHIVE_EXTENSION}")
}

/// Deliverable part `index`, zero-padded to `width` digits.
pub fn part_name(name: &str, index: usize, width: usize) -> String {
    format!("{name}-part-{index:0width$}{ARCHIVE_EXTENSION}")
}

/// Intermediate object produced by batch `batch` of composition round `round`.
/// Scoped by the compose target so concurrent targets never collide.
pub fn round_name(target: &str, round: usize, batch: usize) -> String {
    format!("{target}-temp-{round}-{batch}")
}

/// Number of base-10 digits of `max(n, 1)`.
pub fn digit_count(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    n.ilog10() as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_count() {
        let cases = [
            (0, 1),
            (5, 1),
            (9, 1),
            (10, 2),
            (99, 2),
            (100, 3),
            (999, 3),
            (1000, 4),
            (999_999, 6),
        ];
        for (n, want) in cases {
            assert_eq!(digit_count(n), want, "digit_count({n})");
        }
    }

    #[test]
    fn test_chunk_name_is_eight_digits() {
        assert_eq!(chunk_name("snap", 0), "snap-part-00000000");
        assert_eq!(chunk_name("snap", 123), "snap-part-00000123");
    }

    #[test]
    fn test_final_and_part_names() {
        assert_eq!(final_name("data/snap"), "data/snap.tar.gz");
        assert_eq!(part_name("snap", 3, 1), "snap-part-3.tar.gz");
        assert_eq!(part_name("snap", 3, 3), "snap-part-003.tar.gz");
    }

    #[test]
    fn test_round_name() {
        assert_eq!(round_name("snap.tar.gz", 1, 4), "snap.tar.gz-temp-1-4");
    }
}
