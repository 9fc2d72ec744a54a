/// Physical wiring of a matrix zone.
///
/// `orientation` bits: 0 = first pixel on the right, 1 = first pixel at the
/// bottom, 2 = columns are wired before rows, 3 = serpentine (every other
/// line runs backwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixLayout {
    rows: u16,
    cols: u16,
    orientation: u8,
}

impl MatrixLayout {
    pub const RIGHT: u8 = 1 << 0;
    pub const BOTTOM: u8 = 1 << 1;
    pub const COLUMNS: u8 = 1 << 2;
    pub const SERPENTINE: u8 = 1 << 3;

    pub fn new(rows: u16, cols: u16, orientation: u8) -> Self {
        Self {
            rows,
            cols,
            orientation,
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn len(&self) -> usize {
        usize::from(self.rows) * usize::from(self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has(&self, flag: u8) -> bool {
        self.orientation & flag != 0
    }

    /// Buffer index of the pixel at column `x`, row `y` (origin top-left).
    pub fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        let x = if self.has(Self::RIGHT) { self.cols - 1 - x } else { x };
        let y = if self.has(Self::BOTTOM) { self.rows - 1 - y } else { y };

        let (major, mut minor, minor_len) = if self.has(Self::COLUMNS) {
            (x, y, self.rows)
        } else {
            (y, x, self.cols)
        };
        if self.has(Self::SERPENTINE) && major % 2 == 1 {
            minor = minor_len - 1 - minor;
        }
        Some(usize::from(major) * usize::from(minor_len) + usize::from(minor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(layout: &MatrixLayout) -> Vec<Vec<usize>> {
        (0..layout.rows())
            .map(|y| {
                (0..layout.cols())
                    .map(|x| layout.index(x, y).unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn row_major_top_left() {
        let layout = MatrixLayout::new(2, 3, 0);
        assert_eq!(grid(&layout), vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(layout.index(3, 0), None);
    }

    #[test]
    fn serpentine_rows() {
        let layout = MatrixLayout::new(3, 3, MatrixLayout::SERPENTINE);
        assert_eq!(
            grid(&layout),
            vec![vec![0, 1, 2], vec![5, 4, 3], vec![6, 7, 8]]
        );
    }

    #[test]
    fn column_major_from_bottom_right() {
        let layout = MatrixLayout::new(
            2,
            3,
            MatrixLayout::COLUMNS | MatrixLayout::RIGHT | MatrixLayout::BOTTOM,
        );
        assert_eq!(grid(&layout), vec![vec![5, 3, 1], vec![4, 2, 0]]);
    }

    #[test]
    fn every_index_is_used_once() {
        for orientation in 0..16 {
            let layout = MatrixLayout::new(4, 5, orientation);
            let mut seen: Vec<usize> = grid(&layout).into_iter().flatten().collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..20).collect::<Vec<_>>(), "orientation {orientation}");
        }
    }
}
