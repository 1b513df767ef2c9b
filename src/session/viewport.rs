use std::ops::Range;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowOffsets {
    tops: Vec<f32>,
    total: f32,
}

impl RowOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_heights(heights: &[f32]) -> Self {
        let mut offsets = Self::new();
        for h in heights {
            offsets.push(*h);
        }
        offsets
    }

    /// Append one row. Negative heights count as zero.
    pub fn push(&mut self, height: f32) {
        self.tops.push(self.total);
        self.total += height.max(0.0);
    }

    pub fn clear(&mut self) {
        self.tops.clear();
        self.total = 0.0;
    }

    pub fn len(&self) -> usize {
        self.tops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tops.is_empty()
    }

    pub fn total_height(&self) -> f32 {
        self.total
    }

    pub fn top_of(&self, index: usize) -> Option<f32> {
        self.tops.get(index).copied()
    }

    /// Row containing vertical position `y`, clamped to the first/last row.
    pub fn index_at(&self, y: f32) -> Option<usize> {
        if self.tops.is_empty() {
            return None;
        }
        let after = self.tops.partition_point(|top| *top <= y);
        Some(after.saturating_sub(1).min(self.tops.len() - 1))
    }

    /// Rows intersecting `[scroll_top, scroll_top + viewport_height)`, padded by
    /// `overscan` rows on each side.
    pub fn visible_range(
        &self,
        scroll_top: f32,
        viewport_height: f32,
        overscan: usize,
    ) -> Range<usize> {
        let (Some(first), Some(last)) = (
            self.index_at(scroll_top.max(0.0)),
            self.index_at((scroll_top + viewport_height.max(0.0)).max(0.0)),
        ) else {
            return 0..0;
        };
        let start = first.saturating_sub(overscan);
        let end = (last + 1 + overscan).min(self.tops.len());
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_at_variable_heights() {
        // header 24 + 2 matches of 20, then header 24 + 1 match
        let rows = RowOffsets::from_heights(&[64.0, 44.0, 64.0]);
        assert_eq!(rows.top_of(1), Some(64.0));
        assert_eq!(rows.total_height(), 172.0);
        assert_eq!(rows.index_at(0.0), Some(0));
        assert_eq!(rows.index_at(63.9), Some(0));
        assert_eq!(rows.index_at(64.0), Some(1));
        assert_eq!(rows.index_at(120.0), Some(2));
        assert_eq!(rows.index_at(10_000.0), Some(2));
        assert_eq!(rows.index_at(-5.0), Some(0));
    }

    #[test]
    fn test_visible_range_with_overscan() {
        let rows = RowOffsets::from_heights(&[20.0; 1000]);
        assert_eq!(rows.visible_range(0.0, 100.0, 0), 0..6);
        assert_eq!(rows.visible_range(2000.0, 100.0, 3), 97..109);
        assert_eq!(rows.visible_range(19_990.0, 100.0, 5), 994..1000);
    }

    #[test]
    fn test_empty_rows() {
        let rows = RowOffsets::new();
        assert_eq!(rows.index_at(10.0), None);
        assert_eq!(rows.visible_range(0.0, 100.0, 2), 0..0);
    }

    #[test]
    fn test_incremental_push_matches_bulk() {
        let mut rows = RowOffsets::new();
        rows.push(10.0);
        rows.push(30.0);
        rows.push(-4.0);
        assert_eq!(rows, RowOffsets::from_heights(&[10.0, 30.0, 0.0]));
        assert_eq!(rows.len(), 3);
        rows.clear();
        assert!(rows.is_empty());
    }
}
