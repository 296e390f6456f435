//! Page rendering
//!
//! - [`geometry`]: page/device rectangles and transforms
//! - [`PageRenderer`]: whole page (or crop) into one [`PixelBuffer`]
//! - [`TileCache`]: the same page split into independently rendered tiles

pub mod geometry;
mod pixels;
mod renderer;
mod tiles;
mod types;

pub use geometry::{IRect, Matrix, Rect};
pub use pixels::PixelBuffer;
pub use renderer::PageRenderer;
pub use tiles::{Tile, TileCache, TileGrid, TileIter, TileRect};
pub use types::{ColorMode, RenderSpec, Rotation};
