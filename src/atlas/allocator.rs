/// Shelf-based online rectangle packer for the glyph atlas.
///
/// Rectangles are placed left-to-right on horizontal shelves; a new
/// shelf opens below the last one when no existing shelf fits. There
/// is no deallocation: the atlas is cleared wholesale on font changes
/// or overflow, which sidesteps fragmentation bookkeeping entirely.
pub struct ShelfPacker {
    width: u16,
    height: u16,
    shelves: Vec<Shelf>,
    // Maximum acceptable wasted height fraction when reusing a shelf.
    waste_limit: f32,
}

#[derive(Debug, Clone)]
struct Shelf {
    // Next free x position on this shelf.
    x: u16,
    y: u16,
    height: u16,
}

impl ShelfPacker {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            shelves: Vec::new(),
            waste_limit: 0.25,
        }
    }

    /// Reserves a `width`×`height` rectangle, returning its origin,
    /// or `None` when the atlas cannot fit it.
    pub fn pack(&mut self, width: u16, height: u16) -> Option<(u16, u16)> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }

        if let Some(idx) = self.best_shelf(width, height) {
            let shelf = &mut self.shelves[idx];
            let origin = (shelf.x, shelf.y);
            shelf.x += width;
            return Some(origin);
        }

        self.open_shelf(width, height)
    }

    /// Picks the fitting shelf wasting the least vertical space,
    /// preferring exact height matches.
    fn best_shelf(&self, width: u16, height: u16) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, shelf) in self.shelves.iter().enumerate() {
            if shelf.height < height || self.width - shelf.x < width {
                continue;
            }
            let waste = (shelf.height - height) as f32 / shelf.height as f32;
            if waste > self.waste_limit && shelf.height != height {
                continue;
            }
            let score = if shelf.height == height { waste - 1.0 } else { waste };
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn open_shelf(&mut self, width: u16, height: u16) -> Option<(u16, u16)> {
        let y = self.next_y();
        if self.height - y < height {
            return None;
        }
        self.shelves.push(Shelf {
            x: width,
            y,
            height,
        });
        Some((0, y))
    }

    fn next_y(&self) -> u16 {
        self.shelves
            .last()
            .map(|shelf| shelf.y + shelf.height)
            .unwrap_or(0)
    }

    /// Discards every allocation. Part of the full atlas reset path.
    pub fn reset(&mut self) {
        self.shelves.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.shelves.is_empty()
    }
}
