use bitflags::bitflags;

bitflags! {
    /// Per-cell decoration flags.
    ///
    /// The bit layout is shared with the glyph pixel shader and must
    /// be kept in lockstep with the constants declared there; there is
    /// no automatic sync.
    ///
    /// ```text
    /// bit 5   0x0020  border left
    /// bit 6   0x0040  border top
    /// bit 7   0x0080  border right
    /// bit 8   0x0100  border bottom
    /// bit 9   0x0200  underline
    /// bit 10  0x0400  dotted underline
    /// bit 11  0x0800  double underline
    /// bit 12  0x1000  strikethrough
    /// ```
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct CellFlags: u32 {
        const BORDER_LEFT      = 0x0000_0020;
        const BORDER_TOP       = 0x0000_0040;
        const BORDER_RIGHT     = 0x0000_0080;
        const BORDER_BOTTOM    = 0x0000_0100;
        const UNDERLINE        = 0x0000_0200;
        const UNDERLINE_DOTTED = 0x0000_0400;
        const UNDERLINE_DOUBLE = 0x0000_0800;
        const STRIKETHROUGH    = 0x0000_1000;
    }
}

/// Metadata for one grid cell. Lives for a single frame: the producer
/// rebuilds the grid whenever the visible buffer changes and the
/// compositor reads it back untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cell {
    /// Background color, RGBA with `r` in the low byte. Sampled by
    /// the background layer's per-cell color lookup.
    pub bg: u32,
    /// Foreground color used for decoration quads.
    pub fg: u32,
    pub flags: CellFlags,
}

/// Row-major grid of per-cell metadata.
#[derive(Clone, Debug, Default)]
pub struct CellGrid {
    cols: u16,
    rows: u16,
    cells: Vec<Cell>,
}

impl CellGrid {
    pub fn new(cols: u16, rows: u16) -> Self {
        let mut grid = Self::default();
        grid.resize(cols, rows);
        grid
    }

    /// Resizes the grid, clearing all cells. Capacity is retained
    /// when shrinking.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        self.cells.clear();
        self.cells
            .resize(cols as usize * rows as usize, Cell::default());
    }

    #[inline]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    #[inline]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        self.cells.get(y as usize * self.cols as usize + x as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, x: u16, y: u16) -> Option<&mut Cell> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        self.cells
            .get_mut(y as usize * self.cols as usize + x as usize)
    }

    /// One row of cells, in column order.
    #[inline]
    pub fn row(&self, y: u16) -> &[Cell] {
        let start = y as usize * self.cols as usize;
        &self.cells[start..start + self.cols as usize]
    }

    pub fn fill(&mut self, cell: Cell) {
        self.cells.fill(cell);
    }

    /// Background colors flattened row-major, the source for the
    /// per-cell color lookup texture.
    pub fn background_bitmap(&self) -> impl Iterator<Item = u32> + '_ {
        self.cells.iter().map(|c| c.bg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_indexing_is_row_major() {
        let mut grid = CellGrid::new(3, 2);
        grid.get_mut(2, 1).unwrap().bg = 0xff;
        assert_eq!(grid.row(1)[2].bg, 0xff);
        assert_eq!(grid.row(0)[2].bg, 0);
        assert!(grid.get(3, 0).is_none());
        assert!(grid.get(0, 2).is_none());
    }

    #[test]
    fn resize_clears_cells() {
        let mut grid = CellGrid::new(2, 2);
        grid.get_mut(0, 0).unwrap().flags = CellFlags::UNDERLINE;
        grid.resize(2, 2);
        assert_eq!(grid.get(0, 0).unwrap().flags, CellFlags::empty());
    }
}
