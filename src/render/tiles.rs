//! Tiled rendering of large pages
//!
//! A [`TileGrid`] partitions the device rectangle of a full-page render into
//! row-major tiles of a nominal size; the last row and column take the
//! remainder. A [`TileCache`] attaches a lazily rendered buffer to each tile
//! so peak memory is one tile rather than the whole page.
//!
//! ```text
//!   x0                                   x1
//! y0 ┌───────────┬───────────┬──────┐
//!    │  (0, 0)   │  (0, 1)   │(0, 2)│
//!    ├───────────┼───────────┼──────┤
//!    │  (1, 0)   │  (1, 1)   │(1, 2)│
//!    ├───────────┼───────────┼──────┤
//! y1 │  (2, 0)   │  (2, 1)   │(2, 2)│
//!    └───────────┴───────────┴──────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::document::{DocumentSession, RenderError};

use super::geometry::{IRect, Matrix};
use super::pixels::PixelBuffer;
use super::types::{ColorMode, RenderSpec, Rotation};

/// Position and size of one tile, relative to the rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub row: u32,
    pub column: u32,
    /// Pixel offset from the page's left edge
    pub x: u32,
    /// Pixel offset from the page's top edge
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Row-major partition of a device rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    area: IRect,
    tile_width: u32,
    tile_height: u32,
    rows: u32,
    columns: u32,
}

impl TileGrid {
    pub fn new(area: IRect, tile_width: u32, tile_height: u32) -> Result<Self, RenderError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(RenderError::InvalidTileSize);
        }
        if area.is_empty() {
            return Err(RenderError::EmptyArea);
        }
        Ok(Self {
            area,
            tile_width,
            tile_height,
            rows: area.height().div_ceil(tile_height),
            columns: area.width().div_ceil(tile_width),
        })
    }

    /// Device rectangle of the full page
    pub fn area(&self) -> IRect {
        self.area
    }

    pub fn full_width(&self) -> u32 {
        self.area.width()
    }

    pub fn full_height(&self) -> u32 {
        self.area.height()
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tile_rect(&self, row: u32, column: u32) -> Option<TileRect> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        let x = column * self.tile_width;
        let y = row * self.tile_height;
        Some(TileRect {
            row,
            column,
            x,
            y,
            width: self.tile_width.min(self.full_width() - x),
            height: self.tile_height.min(self.full_height() - y),
        })
    }

    /// Device rectangle covered by a tile
    pub fn device_area(&self, rect: &TileRect) -> IRect {
        let x0 = self.area.x0 + rect.x as i32;
        let y0 = self.area.y0 + rect.y as i32;
        IRect::new(x0, y0, x0 + rect.width as i32, y0 + rect.height as i32)
    }

    /// Tiles in row-major order; each call starts over
    pub fn tiles(&self) -> TileIter<'_> {
        TileIter {
            grid: self,
            next: 0,
        }
    }
}

/// Lazy row-major walk over a [`TileGrid`]
#[derive(Debug, Clone)]
pub struct TileIter<'a> {
    grid: &'a TileGrid,
    next: usize,
}

impl Iterator for TileIter<'_> {
    type Item = TileRect;

    fn next(&mut self) -> Option<TileRect> {
        if self.next >= self.grid.len() {
            return None;
        }
        let columns = self.grid.columns as usize;
        let row = (self.next / columns) as u32;
        let column = (self.next % columns) as u32;
        self.next += 1;
        self.grid.tile_rect(row, column)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileIter<'_> {}

/// One tile of a page, rendered on demand
pub struct Tile<'a> {
    session: &'a DocumentSession,
    page: u32,
    ctm: Matrix,
    spec: RenderSpec,
    rect: TileRect,
    area: IRect,
    buffer: Option<PixelBuffer>,
}

impl<'a> Tile<'a> {
    pub fn rect(&self) -> &TileRect {
        &self.rect
    }

    /// Device rectangle this tile rasterizes
    pub fn device_area(&self) -> IRect {
        self.area
    }

    /// Rasterize only this tile's rectangle
    pub fn render(&mut self) -> Result<&PixelBuffer, RenderError> {
        let buffer = self
            .session
            .rasterize(self.page, self.ctm, self.area, &self.spec)?;
        Ok(self.buffer.insert(buffer))
    }

    pub fn is_rendered(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&PixelBuffer> {
        self.buffer.as_ref()
    }

    pub fn take_buffer(&mut self) -> Option<PixelBuffer> {
        self.buffer.take()
    }

    /// Release this tile's buffer only
    pub fn dispose(&mut self) {
        self.buffer = None;
    }
}

/// Tiles of one page at one zoom, rotation and color mode
pub struct TileCache<'a> {
    grid: TileGrid,
    tiles: Vec<Tile<'a>>,
}

impl<'a> TileCache<'a> {
    /// Lay out tiles over the full page without rasterizing anything
    pub fn build(
        session: &'a DocumentSession,
        page: u32,
        color: ColorMode,
        rotation: Rotation,
        zoom: f32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, RenderError> {
        let geometry = session.resolve_page(page)?;
        let spec = RenderSpec::new(zoom, rotation, color);
        let (ctm, area) = geometry.device_area(&geometry.bounds, zoom, rotation)?;
        let grid = TileGrid::new(area, tile_width, tile_height)?;

        tracing::debug!(
            "Tiling page {} ({}x{} px) into {} rows x {} columns",
            page,
            grid.full_width(),
            grid.full_height(),
            grid.rows(),
            grid.columns()
        );

        let tiles = grid
            .tiles()
            .map(|rect| Tile {
                session,
                page,
                ctm,
                spec,
                rect,
                area: grid.device_area(&rect),
                buffer: None,
            })
            .collect();

        Ok(Self { grid, tiles })
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Tiles in row-major order
    pub fn tiles(&self) -> &[Tile<'a>] {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut [Tile<'a>] {
        &mut self.tiles
    }

    pub fn tile_mut(&mut self, row: u32, column: u32) -> Option<&mut Tile<'a>> {
        if row >= self.grid.rows() || column >= self.grid.columns() {
            return None;
        }
        let index = row as usize * self.grid.columns() as usize + column as usize;
        self.tiles.get_mut(index)
    }

    /// Tiles currently holding a buffer
    pub fn rendered_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_rendered()).count()
    }

    /// Dispose every tile and drop the grid's tiles
    pub fn dispose(&mut self) {
        for tile in &mut self.tiles {
            tile.dispose();
        }
        self.tiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_page_at_double_zoom() {
        let grid = TileGrid::new(IRect::new(0, 0, 1224, 1584), 512, 512).unwrap();
        assert_eq!(grid.columns(), 3);
        assert_eq!(grid.rows(), 4);

        let last = grid.tile_rect(3, 2).unwrap();
        assert_eq!(last.width, 200);
        assert_eq!(last.height, 48);
        assert_eq!((last.x, last.y), (1024, 1536));
    }

    #[test]
    fn test_tiles_partition_area() {
        let area = IRect::new(-30, 7, 1000, 650);
        let grid = TileGrid::new(area, 256, 200).unwrap();

        let total: u64 = grid.tiles().map(|t| t.pixel_count()).sum();
        assert_eq!(total, area.area());

        let rects: Vec<IRect> = grid.tiles().map(|t| grid.device_area(&t)).collect();
        for (i, a) in rects.iter().enumerate() {
            assert_eq!(a.intersect(&area), *a);
            for b in &rects[i + 1..] {
                assert!(a.intersect(b).is_empty());
            }
        }
    }

    #[test]
    fn test_iteration_is_row_major_and_restartable() {
        let grid = TileGrid::new(IRect::new(0, 0, 30, 20), 10, 10).unwrap();
        let first: Vec<(u32, u32)> = grid.tiles().map(|t| (t.row, t.column)).collect();
        let second: Vec<(u32, u32)> = grid.tiles().map(|t| (t.row, t.column)).collect();
        assert_eq!(first, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert_eq!(first, second);

        let mut iter = grid.tiles();
        assert_eq!(iter.len(), 6);
        iter.next();
        assert_eq!(iter.len(), 5);
    }

    #[test]
    fn test_invalid_sizes() {
        assert_eq!(
            TileGrid::new(IRect::new(0, 0, 10, 10), 0, 10),
            Err(RenderError::InvalidTileSize)
        );
        assert_eq!(
            TileGrid::new(IRect::new(0, 0, 0, 10), 10, 10),
            Err(RenderError::EmptyArea)
        );
    }

    #[test]
    fn test_exact_fit_has_no_remainder() {
        let grid = TileGrid::new(IRect::new(0, 0, 1024, 512), 512, 512).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.tile_rect(0, 1).unwrap().width, 512);
        assert!(grid.tile_rect(1, 0).is_none());
    }
}
