//! Hex layout math
//!
//! Converts grid coordinates to pixel centers for the two supported layouts
//! and sizes the drawing surface. Pure functions only; front ends map pixels
//! onto their own surface (terminal cells, canvas, ...).

use serde::{Deserialize, Serialize};

use crate::world::HexCoord;

/// How alternate lines of hexes are staggered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HexLayout {
    /// Odd rows are pushed right by half the horizontal spacing ("brick" layout).
    RowOffset,
    /// Odd columns are pushed down by half the vertical spacing.
    #[default]
    ColumnOffset,
}

impl HexLayout {
    pub fn name(&self) -> &'static str {
        match self {
            HexLayout::RowOffset => "row-offset",
            HexLayout::ColumnOffset => "column-offset",
        }
    }
}

/// Pixel position of a hex center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

/// Pixel dimensions of the container holding a whole map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelSize {
    pub width: f64,
    pub height: f64,
}

/// Layout parameters for a hex map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HexGeometry {
    pub layout: HexLayout,
    /// Bounding box edge of a single hex in pixels
    pub hex_size: f64,
    /// Distance between neighbouring centers along x
    pub h_spacing: f64,
    /// Distance between neighbouring centers along y
    pub v_spacing: f64,
    /// Extra room added to the container on the far edges
    pub margin: f64,
}

impl Default for HexGeometry {
    fn default() -> Self {
        Self {
            layout: HexLayout::ColumnOffset,
            hex_size: 60.0,
            h_spacing: 60.0,
            v_spacing: 52.0,
            margin: 20.0,
        }
    }
}

impl HexGeometry {
    pub fn with_layout(layout: HexLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    /// Pixel center of the hex at `coord`.
    pub fn position(&self, coord: HexCoord) -> PixelPos {
        let x = coord.x as f64;
        let y = coord.y as f64;
        let half = self.hex_size / 2.0;
        match self.layout {
            HexLayout::RowOffset => {
                let shift = (coord.y % 2) as f64 * self.h_spacing / 2.0;
                PixelPos {
                    x: x * self.h_spacing + shift + half,
                    y: y * self.v_spacing * 0.75 + half,
                }
            }
            HexLayout::ColumnOffset => {
                let shift = (coord.x % 2) as f64 * self.v_spacing / 2.0;
                PixelPos {
                    x: x * self.h_spacing * 0.75 + half,
                    y: y * self.v_spacing + shift + half,
                }
            }
        }
    }

    /// Container size that holds every hex bounding box of a
    /// `width` x `height` grid, plus the margin.
    pub fn container_size(&self, width: u32, height: u32) -> PixelSize {
        if width == 0 || height == 0 {
            return PixelSize {
                width: self.margin,
                height: self.margin,
            };
        }

        let max_x = (width - 1) as f64;
        let max_y = (height - 1) as f64;
        let (span_x, span_y) = match self.layout {
            HexLayout::RowOffset => {
                // Only staggered when there is an odd row to push right
                let shift = if height > 1 { self.h_spacing / 2.0 } else { 0.0 };
                (max_x * self.h_spacing + shift, max_y * self.v_spacing * 0.75)
            }
            HexLayout::ColumnOffset => {
                let shift = if width > 1 { self.v_spacing / 2.0 } else { 0.0 };
                (max_x * self.h_spacing * 0.75, max_y * self.v_spacing + shift)
            }
        };

        PixelSize {
            width: span_x + self.hex_size + self.margin,
            height: span_y + self.hex_size + self.margin,
        }
    }

    /// Nearest hex whose center lies within half a hex of the point.
    ///
    /// Used for pointer hit testing. Returns `None` outside the grid.
    pub fn cell_at(&self, px: f64, py: f64, width: u32, height: u32) -> Option<HexCoord> {
        if width == 0 || height == 0 {
            return None;
        }

        // Invert the unstaggered formula, then check the neighbourhood
        let half = self.hex_size / 2.0;
        let (step_x, step_y) = match self.layout {
            HexLayout::RowOffset => (self.h_spacing, self.v_spacing * 0.75),
            HexLayout::ColumnOffset => (self.h_spacing * 0.75, self.v_spacing),
        };
        if step_x <= 0.0 || step_y <= 0.0 {
            return None;
        }
        let guess_x = ((px - half) / step_x).round() as i64;
        let guess_y = ((py - half) / step_y).round() as i64;

        let mut best: Option<(HexCoord, f64)> = None;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let cx = guess_x + dx;
                let cy = guess_y + dy;
                if cx < 0 || cy < 0 || cx >= width as i64 || cy >= height as i64 {
                    continue;
                }
                let coord = HexCoord::new(cx as u32, cy as u32);
                let center = self.position(coord);
                let dist = (center.x - px).hypot(center.y - py);
                if best.map_or(true, |(_, d)| dist < d) {
                    best = Some((coord, dist));
                }
            }
        }

        best.filter(|(_, dist)| *dist <= half).map(|(coord, _)| coord)
    }
}
