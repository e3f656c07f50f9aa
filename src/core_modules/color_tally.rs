// THEORY:
// The `color_tally` module answers one question about a decoded image: which three
// exact colors occur most often, and how often. It works in two passes.
//
// Key architectural principles:
// 1.  **One Full Scan**: Every coordinate in the grid's bounding rectangle is visited
//     exactly once, in row-major order, and folded into a `Histogram`. Nothing is
//     sampled or skipped.
// 2.  **Insertion-Ordered Histogram**: Besides the key -> slot index, the histogram
//     keeps its entries in the order colors were first seen. Iterating it is therefore
//     deterministic, which is what makes tie-breaking deterministic.
// 3.  **Linear Top-3**: Leaders are maintained in a fixed array of three slots during a
//     single pass over the histogram. A candidate takes the first rank whose count it
//     strictly exceeds and pushes the lower ranks down. Equal counts never displace an
//     existing leader, so among tied colors the one seen first in the scan ranks higher.
//     The histogram is never sorted.
// 4.  **Absent, not Zero**: Ranks without a color are `None`. An image with two distinct
//     colors has an empty third slot, never a color with a count of zero.

use crate::core_modules::pixel::pixel::ColorKey;
use crate::core_modules::pixel_grid::PixelGrid;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

pub type Count = u64;

/// Number of ranked slots reported per image.
pub const TOP_RANKS: usize = 3;

/// A color together with the number of pixels that carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedColor {
    pub key: ColorKey,
    pub count: Count,
}

/// The three most frequent colors of one image, ranked by descending count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TopColors {
    ranks: [Option<RankedColor>; TOP_RANKS],
}

impl TopColors {
    pub fn new(ranks: [Option<RankedColor>; TOP_RANKS]) -> Self {
        Self { ranks }
    }

    /// The slot at `rank` (0-based). Out of range ranks are absent.
    pub fn get(&self, rank: usize) -> Option<RankedColor> {
        self.ranks.get(rank).copied().flatten()
    }

    pub fn ranks(&self) -> &[Option<RankedColor>; TOP_RANKS] {
        &self.ranks
    }

    /// Populated slots only, highest rank first.
    pub fn present(&self) -> impl Iterator<Item = RankedColor> + '_ {
        self.ranks.iter().flatten().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks[0].is_none()
    }
}

/// Occurrence count per exact color, in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct Histogram {
    index: HashMap<ColorKey, usize>,
    entries: Vec<(ColorKey, Count)>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the histogram from one row-major scan over the grid's bounds.
    pub fn from_grid<G: PixelGrid + ?Sized>(grid: &G) -> Self {
        let bounds = grid.bounds();
        let mut histogram = Self::new();
        for y in bounds.min_y..bounds.max_y {
            for x in bounds.min_x..bounds.max_x {
                histogram.record(grid.color_key(x, y));
            }
        }
        histogram
    }

    pub fn record(&mut self, key: ColorKey) {
        match self.index.entry(key) {
            Entry::Occupied(slot) => self.entries[*slot.get()].1 += 1,
            Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push((key, 1));
            }
        }
    }

    /// Number of distinct colors recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order their colors were first recorded.
    pub fn iter(&self) -> impl Iterator<Item = (ColorKey, Count)> + '_ {
        self.entries.iter().copied()
    }

    pub fn top_colors(&self) -> TopColors {
        let mut leaders: [Option<RankedColor>; TOP_RANKS] = [None; TOP_RANKS];
        for (key, count) in self.iter() {
            let rank = leaders
                .iter()
                .position(|leader| leader.is_none_or(|leader| count > leader.count));
            if let Some(rank) = rank {
                leaders[rank..].rotate_right(1);
                leaders[rank] = Some(RankedColor { key, count });
            }
        }
        TopColors::new(leaders)
    }
}

/// Scans `grid` and returns its three most frequent colors.
pub fn tally<G: PixelGrid + ?Sized>(grid: &G) -> TopColors {
    Histogram::from_grid(grid).top_colors()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn key(packed: u32) -> ColorKey {
        ColorKey::from_rgb((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
    }

    fn grid_from_rows(width: u32, colors: &[u32]) -> RgbaImage {
        let height = colors.len() as u32 / width;
        RgbaImage::from_fn(width, height, |x, y| {
            let c = key(colors[(y * width + x) as usize]);
            Rgba([c.red(), c.green(), c.blue(), 255])
        })
    }

    #[test]
    fn single_color_fills_first_rank_only() {
        let grid = RgbaImage::from_pixel(7, 5, Rgba([10, 20, 30, 255]));
        let top = tally(&grid);

        assert_eq!(
            top.get(0),
            Some(RankedColor { key: ColorKey::from_rgb(10, 20, 30), count: 35 })
        );
        assert_eq!(top.get(1), None);
        assert_eq!(top.get(2), None);
    }

    #[test]
    fn zero_area_image_has_no_ranks() {
        let grid = RgbaImage::new(0, 0);
        let top = tally(&grid);
        assert!(top.is_empty());
        assert_eq!(top.present().count(), 0);
    }

    #[test]
    fn two_by_two_with_one_odd_pixel() {
        let (a, b) = (0xaa0000, 0x00bb00);
        let top = tally(&grid_from_rows(2, &[a, a, a, b]));

        assert_eq!(top.get(0), Some(RankedColor { key: key(a), count: 3 }));
        assert_eq!(top.get(1), Some(RankedColor { key: key(b), count: 1 }));
        assert_eq!(top.get(2), None);
    }

    #[test]
    fn two_colors_leave_third_rank_absent() {
        let (a, b) = (0x010101, 0x020202);
        let top = tally(&grid_from_rows(3, &[b, a, a, b, b, a]));

        let first = top.get(0).unwrap();
        let second = top.get(1).unwrap();
        assert!(first.count >= second.count);
        assert_eq!(top.get(2), None);
    }

    #[test]
    fn all_distinct_colors_rank_in_scan_order() {
        let colors: Vec<u32> = (1..=12).map(|i| i * 0x010203).collect();
        let top = tally(&grid_from_rows(4, &colors));

        assert_eq!(top.get(0), Some(RankedColor { key: key(colors[0]), count: 1 }));
        assert_eq!(top.get(1), Some(RankedColor { key: key(colors[1]), count: 1 }));
        assert_eq!(top.get(2), Some(RankedColor { key: key(colors[2]), count: 1 }));
    }

    #[test]
    fn scan_is_row_major() {
        // Column-major would meet 0x222222 second; row-major meets 0x111111 second.
        let grid = grid_from_rows(2, &[0x000000, 0x111111, 0x222222, 0x333333]);
        let ranked: Vec<ColorKey> = tally(&grid).present().map(|r| r.key).collect();
        assert_eq!(ranked, vec![key(0x000000), key(0x111111), key(0x222222)]);
    }

    #[test]
    fn later_larger_counts_push_leaders_down() {
        let mut histogram = Histogram::new();
        for (packed, n) in [(0x01, 2), (0x02, 5), (0x03, 3), (0x04, 9), (0x05, 1)] {
            for _ in 0..n {
                histogram.record(key(packed));
            }
        }
        let ranked: Vec<(ColorKey, Count)> =
            histogram.top_colors().present().map(|r| (r.key, r.count)).collect();

        assert_eq!(ranked, vec![(key(0x04), 9), (key(0x02), 5), (key(0x03), 3)]);
    }

    #[test]
    fn equal_counts_do_not_displace_earlier_leaders() {
        let mut histogram = Histogram::new();
        for packed in [0x0a, 0x0b, 0x0a, 0x0b, 0x0c, 0x0c, 0x0d] {
            histogram.record(key(packed));
        }
        let ranked: Vec<ColorKey> = histogram.top_colors().present().map(|r| r.key).collect();
        assert_eq!(ranked, vec![key(0x0a), key(0x0b), key(0x0c)]);
    }

    #[test]
    fn histogram_tracks_counts_in_first_seen_order() {
        let mut histogram = Histogram::new();
        for packed in [0x30, 0x10, 0x30, 0x20] {
            histogram.record(key(packed));
        }
        assert_eq!(histogram.len(), 3);
        let entries: Vec<(ColorKey, Count)> = histogram.iter().collect();
        assert_eq!(entries, vec![(key(0x30), 2), (key(0x10), 1), (key(0x20), 1)]);
    }

    #[test]
    fn tally_is_idempotent() {
        let colors: Vec<u32> = (0..64).map(|i| (i % 5) * 0x111111 + (i % 3)).collect();
        let grid = grid_from_rows(8, &colors);
        assert_eq!(tally(&grid), tally(&grid));
    }
}
