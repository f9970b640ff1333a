/// Viewport Resolver
///
/// Picks the aggregation resolution for a map zoom level and enumerates the cells
/// covering the visible rectangle at that resolution.

use crate::constants::{
    FINE_RESOLUTION, MAX_LATITUDE, MAX_LONGITUDE, MAX_ZOOM, MIN_LATITUDE, MIN_LONGITUDE,
    MIN_ZOOM, ZOOM_RESOLUTION_TABLE,
};
use crate::error::{Error, Result};
use crate::hex_indexer::{Coordinate, all_cells, cells_covering_polygon};
use h3o::CellIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

// Covering strips never cross a multiple of this longitude, so no strip is wide
// enough to be read as crossing the antimeridian.
const STRIP_WIDTH_DEG: f64 = 90.0;
const FULL_TURN_DEG: f64 = 360.0;

/// Lat/lng rectangle reported by the map widget
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self { north, south, east, west }
    }

    /// Build from the widget's south-west and north-east corners
    pub fn from_corners(south_west: Coordinate, north_east: Coordinate) -> Self {
        Self {
            north: north_east.lat,
            south: south_west.lat,
            east: north_east.lng,
            west: south_west.lng,
        }
    }

    /// Clamp latitudes into the valid range. Longitudes are left alone: maps
    /// that show the world more than once report them past ±180, and
    /// [`longitude_strips`] wraps them instead.
    pub fn clamped(&self) -> Self {
        Self {
            north: self.north.clamp(MIN_LATITUDE, MAX_LATITUDE),
            south: self.south.clamp(MIN_LATITUDE, MAX_LATITUDE),
            ..*self
        }
    }

    pub fn longitude_span(&self) -> f64 {
        self.east - self.west
    }
}

/// Split the rectangle into strips that each lie inside [-180, 180] and never
/// cross a multiple of 90° longitude. Zero-width pieces are dropped, and a span
/// of a full turn or more yields one turn's worth of strips.
pub fn longitude_strips(bounds: &Bounds) -> Vec<Bounds> {
    let mut strips = Vec::new();
    let mut west = bounds.west;
    let limit = bounds.east.min(bounds.west + FULL_TURN_DEG);

    while west < limit {
        let boundary = ((west / STRIP_WIDTH_DEG).floor() + 1.0) * STRIP_WIDTH_DEG;
        let east = boundary.min(limit);

        // shift whole turns so the strip starts inside [-180, 180)
        let shift = ((west - MIN_LONGITUDE) / FULL_TURN_DEG).floor() * FULL_TURN_DEG;
        strips.push(Bounds {
            west: west - shift,
            east: (east - shift).min(MAX_LONGITUDE),
            ..*bounds
        });
        west = east;
    }
    strips
}

/// Visible region plus integer zoom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bounds: Bounds,
    pub zoom: i32,
}

impl Viewport {
    pub fn new(bounds: Bounds, zoom: i32) -> Self {
        Self { bounds, zoom }
    }

    /// Map widgets report fractional zoom; truncate toward zero.
    pub fn from_map_zoom(bounds: Bounds, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() { zoom.trunc() as i32 } else { MIN_ZOOM };
        Self { bounds, zoom }
    }

    pub fn resolution(&self) -> u8 {
        resolution_for_zoom(self.zoom)
    }
}

/// Aggregation resolution for an integer zoom level. Zooms outside the table
/// clamp to its first or last entry.
pub fn resolution_for_zoom(zoom: i32) -> u8 {
    let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    usize::try_from(zoom - MIN_ZOOM)
        .ok()
        .and_then(|i| ZOOM_RESOLUTION_TABLE.get(i))
        .or(ZOOM_RESOLUTION_TABLE.last())
        .copied()
        .unwrap_or(FINE_RESOLUTION)
}

/// Closed ring `[NW, SW, SE, NE, NW]` around the rectangle
pub fn ring_from_rectangle(bounds: &Bounds) -> Vec<Coordinate> {
    let nw = Coordinate::new(bounds.north, bounds.west);
    let sw = Coordinate::new(bounds.south, bounds.west);
    let se = Coordinate::new(bounds.south, bounds.east);
    let ne = Coordinate::new(bounds.north, bounds.east);
    vec![nw, sw, se, ne, nw]
}

/// Cells covering the viewport at the zoom's resolution.
///
/// Never fails: a viewport that cannot be covered (degenerate or mid-animation
/// bounds) yields no cells.
pub fn cells_for_viewport(viewport: &Viewport) -> Vec<CellIndex> {
    let resolution = viewport.resolution();

    match cells_for_bounds(&viewport.bounds.clamped(), resolution) {
        Ok(cells) => {
            debug!(zoom = viewport.zoom, resolution, cells = cells.len(), "viewport resolved");
            cells
        }
        Err(e) => {
            warn!(zoom = viewport.zoom, resolution, error = %e, "viewport covering failed");
            Vec::new()
        }
    }
}

fn cells_for_bounds(bounds: &Bounds, resolution: u8) -> Result<Vec<CellIndex>> {
    let finite = [bounds.north, bounds.south, bounds.east, bounds.west]
        .iter()
        .all(|v| v.is_finite());
    if !finite {
        return Err(Error::InvalidGeometry(format!("non-finite bounds {:?}", bounds)));
    }
    if bounds.north <= bounds.south || bounds.east <= bounds.west {
        return Err(Error::InvalidGeometry(format!("empty bounds {:?}", bounds)));
    }

    if bounds.longitude_span() >= FULL_TURN_DEG
        && bounds.north >= MAX_LATITUDE
        && bounds.south <= MIN_LATITUDE
    {
        return all_cells(resolution);
    }

    let mut seen = HashSet::new();
    let mut cells = Vec::new();
    for strip in longitude_strips(bounds) {
        for cell in cells_covering_polygon(&ring_from_rectangle(&strip), resolution)? {
            if seen.insert(cell) {
                cells.push(cell);
            }
        }
    }
    cells.sort_unstable_by_key(|c| u64::from(*c));
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex_indexer::point_to_cell;
    use more_asserts::assert_le;

    #[test]
    fn test_zoom_table() {
        let expected = [
            (1, 1), (2, 2), (3, 3), (4, 4), (5, 4), (6, 5), (7, 6), (8, 7), (9, 7),
            (10, 8), (11, 8), (12, 9), (13, 9), (14, 10), (18, 10), (22, 10),
        ];
        for (zoom, res) in expected {
            assert_eq!(resolution_for_zoom(zoom), res, "zoom {}", zoom);
        }
    }

    #[test]
    fn test_zoom_clamping() {
        assert_eq!(resolution_for_zoom(0), 1);
        assert_eq!(resolution_for_zoom(-5), 1);
        assert_eq!(resolution_for_zoom(23), 10);
        assert_eq!(resolution_for_zoom(i32::MAX), 10);
        assert_eq!(resolution_for_zoom(i32::MIN), 1);
    }

    #[test]
    fn test_zoom_monotonic() {
        for zoom in -2..30 {
            assert_le!(resolution_for_zoom(zoom), resolution_for_zoom(zoom + 1));
        }
    }

    #[test]
    fn test_fractional_zoom_truncates() {
        let bounds = Bounds::new(41.0, 39.0, -94.0, -96.0);
        assert_eq!(Viewport::from_map_zoom(bounds, 4.97).zoom, 4);
        assert_eq!(Viewport::from_map_zoom(bounds, f64::NAN).zoom, 1);
    }

    #[test]
    fn test_ring_winding() {
        let ring = ring_from_rectangle(&Bounds::new(10.0, -10.0, 20.0, -20.0));
        assert_eq!(
            ring,
            vec![
                Coordinate::new(10.0, -20.0),
                Coordinate::new(-10.0, -20.0),
                Coordinate::new(-10.0, 20.0),
                Coordinate::new(10.0, 20.0),
                Coordinate::new(10.0, -20.0),
            ]
        );
    }

    #[test]
    fn test_viewport_covers_center() {
        let viewport = Viewport::new(Bounds::new(41.0, 39.0, -94.0, -96.0), 6);
        let cells = cells_for_viewport(&viewport);
        let center = point_to_cell(40.0, -95.0, 5).unwrap();
        assert!(cells.contains(&center));
        assert!(cells.iter().all(|c| u8::from(c.resolution()) == 5));
    }

    #[test]
    fn test_strips_wrap_and_stay_narrow() {
        let strips = longitude_strips(&Bounds::new(75.0, -10.0, 10.0, -200.0));
        let spans: Vec<(f64, f64)> = strips.iter().map(|s| (s.west, s.east)).collect();
        assert_eq!(
            spans,
            vec![(160.0, 180.0), (-180.0, -90.0), (-90.0, 0.0), (0.0, 10.0)]
        );
        for s in &strips {
            assert_le!(s.longitude_span(), STRIP_WIDTH_DEG);
            assert_eq!((s.north, s.south), (75.0, -10.0));
        }

        let many_turns = longitude_strips(&Bounds::new(10.0, 0.0, 1.0e9, -1.0e9));
        assert_eq!(many_turns.len(), 5);
    }

    #[test]
    fn test_world_viewport_is_every_cell() {
        let cells = cells_for_viewport(&Viewport::new(Bounds::new(90.0, -90.0, 180.0, -180.0), 0));
        assert_eq!(cells.len(), 842);
        let repeated = cells_for_viewport(&Viewport::new(Bounds::new(120.0, -120.0, 540.0, -540.0), 1));
        assert_eq!(repeated, cells);
    }

    #[test]
    fn test_near_world_viewport_covers_every_continent() {
        let cells = cells_for_viewport(&Viewport::new(Bounds::new(85.0, -85.0, 180.0, -180.0), 2));
        for (lat, lng) in [(40.0, -95.0), (-33.86, 151.2), (51.5, -0.1), (-1.3, 36.8), (64.1, -179.5)] {
            assert!(cells.contains(&point_to_cell(lat, lng, 2).unwrap()), "({}, {})", lat, lng);
        }
        let mut sorted = cells.clone();
        sorted.sort_unstable_by_key(|c| u64::from(*c));
        sorted.dedup();
        assert_eq!(sorted, cells);
    }

    #[test]
    fn test_wrapped_viewport_covers_both_sides() {
        let cells = cells_for_viewport(&Viewport::new(Bounds::new(75.0, -10.0, 10.0, -200.0), 2));
        assert!(cells.contains(&point_to_cell(40.0, -95.0, 2).unwrap()));
        assert!(cells.contains(&point_to_cell(40.0, 170.0, 2).unwrap()));
        assert!(!cells.contains(&point_to_cell(40.0, 100.0, 2).unwrap()));
    }

    #[test]
    fn test_degenerate_viewport_tolerated() {
        let viewport = Viewport::new(Bounds::new(f64::NAN, 0.0, 1.0, 0.0), 3);
        assert!(cells_for_viewport(&viewport).is_empty());
        let flat = Viewport::new(Bounds::new(10.0, 10.0, 5.0, 0.0), 3);
        assert!(cells_for_viewport(&flat).is_empty());
    }
}
