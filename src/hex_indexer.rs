/// Hex Indexer
///
/// Pure functions mapping geographic points onto the H3 grid: fine cell lookup,
/// ancestor derivation, cell boundaries for rendering and polygon covering.

use crate::constants::{
    FINE_RESOLUTION, MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE,
};
use crate::error::{Error, Result};
use geo::{LineString, Polygon};
use h3o::geom::{ContainmentMode, TilerBuilder};
use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A vertex in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// GeoJSON position order
    pub fn to_position(self) -> Vec<f64> {
        vec![self.lng, self.lat]
    }
}

impl From<LatLng> for Coordinate {
    fn from(ll: LatLng) -> Self {
        Self { lat: ll.lat(), lng: ll.lng() }
    }
}

/// Convert a numeric resolution into the grid's resolution type,
/// limited to what the kernel works with (0..=FINE_RESOLUTION).
pub fn resolution(level: u8) -> Result<Resolution> {
    if level > FINE_RESOLUTION {
        return Err(Error::InvalidResolution(level as i64));
    }
    Resolution::try_from(level).map_err(|_| Error::InvalidResolution(level as i64))
}

pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (MIN_LATITUDE..=MAX_LATITUDE).contains(&lat)
        && (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&lng)
}

/// Index a point at an arbitrary kernel resolution.
pub fn point_to_cell(lat: f64, lng: f64, level: u8) -> Result<CellIndex> {
    if !is_valid_coordinate(lat, lng) {
        return Err(Error::InvalidCoordinate { lat, lng });
    }
    let res = resolution(level)?;
    let ll = LatLng::new(lat, lng).map_err(|_| Error::InvalidCoordinate { lat, lng })?;
    Ok(ll.to_cell(res))
}

/// Index a point at the fixed fine resolution.
pub fn point_to_fine_cell(lat: f64, lng: f64) -> Result<CellIndex> {
    point_to_cell(lat, lng, FINE_RESOLUTION)
}

/// Ancestor of `cell` at `target`. A target equal to the cell's own
/// resolution returns the cell itself.
pub fn parent_cell(cell: CellIndex, target: u8) -> Result<CellIndex> {
    let res = resolution(target)?;
    cell.parent(res)
        .ok_or(Error::InvalidResolution(target as i64))
}

/// Closed boundary ring of a cell (first vertex repeated last).
pub fn cell_to_boundary_polygon(cell: CellIndex) -> Vec<Coordinate> {
    let mut ring: Vec<Coordinate> = cell.boundary().iter().map(|ll| Coordinate::from(*ll)).collect();

    if let Some(first) = ring.first().copied() {
        if ring.last() != Some(&first) {
            ring.push(first);
        }
    }
    ring
}

/// All cells at `level` intersecting the polygon described by `ring`.
///
/// Over-covers at the boundary. The result has no duplicates and is sorted by
/// index so identical inputs always produce identical output.
pub fn cells_covering_polygon(ring: &[Coordinate], level: u8) -> Result<Vec<CellIndex>> {
    let res = resolution(level)?;
    if ring.len() < 4 {
        return Err(Error::InvalidGeometry(format!(
            "ring needs at least 4 points, got {}",
            ring.len()
        )));
    }
    if let Some(bad) = ring.iter().find(|c| !c.lat.is_finite() || !c.lng.is_finite()) {
        return Err(Error::InvalidCoordinate { lat: bad.lat, lng: bad.lng });
    }

    let exterior: LineString<f64> = ring.iter().map(|c| (c.lng, c.lat)).collect::<Vec<_>>().into();
    let polygon = Polygon::new(exterior, vec![]);

    let mut tiler = TilerBuilder::new(res)
        .containment_mode(ContainmentMode::Covers)
        .build();
    tiler
        .add(polygon)
        .map_err(|e| Error::InvalidGeometry(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut cells: Vec<CellIndex> = tiler.into_coverage().filter(|c| seen.insert(*c)).collect();
    cells.sort_unstable_by_key(|c| u64::from(*c));
    Ok(cells)
}

/// Every cell at `level`, sorted by index
pub fn all_cells(level: u8) -> Result<Vec<CellIndex>> {
    let res = resolution(level)?;
    let mut cells: Vec<CellIndex> = CellIndex::base_cells().flat_map(|base| base.children(res)).collect();
    cells.sort_unstable_by_key(|c| u64::from(*c));
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fine_cell_resolution() {
        let cell = point_to_fine_cell(40.0, -95.0).unwrap();
        assert_eq!(u8::from(cell.resolution()), FINE_RESOLUTION);
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(matches!(point_to_fine_cell(90.5, 0.0), Err(Error::InvalidCoordinate { .. })));
        assert!(matches!(point_to_fine_cell(0.0, -180.1), Err(Error::InvalidCoordinate { .. })));
        assert!(matches!(point_to_fine_cell(f64::NAN, 0.0), Err(Error::InvalidCoordinate { .. })));
        // edges are inclusive
        assert!(point_to_fine_cell(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_parent_resolution_bounds() {
        let cell = point_to_fine_cell(40.0, -95.0).unwrap();
        assert!(matches!(parent_cell(cell, 11), Err(Error::InvalidResolution(11))));

        let coarse = parent_cell(cell, 3).unwrap();
        assert!(matches!(parent_cell(coarse, 5), Err(Error::InvalidResolution(5))));
        assert_eq!(parent_cell(coarse, 3).unwrap(), coarse);
        assert_eq!(u8::from(parent_cell(cell, 0).unwrap().resolution()), 0);
    }

    #[test]
    fn test_parent_transitivity() {
        let points = [(40.0, -95.0), (-33.86, 151.2), (64.1, -21.9), (0.0, 0.0)];
        for (lat, lng) in points {
            let fine = point_to_fine_cell(lat, lng).unwrap();
            for r1 in 1..=9u8 {
                let mid = parent_cell(fine, r1).unwrap();
                for r2 in 0..r1 {
                    assert_eq!(parent_cell(mid, r2).unwrap(), parent_cell(fine, r2).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_boundary_is_closed() {
        let cell = point_to_cell(40.0, -95.0, 5).unwrap();
        let ring = cell_to_boundary_polygon(cell);
        assert!(ring.len() >= 7); // hexagon: 6 vertices + closing vertex
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_covering_contains_own_cell() {
        for level in [2u8, 5, 8] {
            let cell = point_to_cell(40.0, -95.0, level).unwrap();
            let ring = cell_to_boundary_polygon(cell);
            let covering = cells_covering_polygon(&ring, level).unwrap();
            assert!(covering.contains(&cell), "resolution {} covering misses cell", level);
        }
    }

    #[test]
    fn test_all_cells_counts() {
        assert_eq!(all_cells(0).unwrap().len(), 122);
        assert_eq!(all_cells(1).unwrap().len(), 842);
        assert!(matches!(all_cells(11), Err(Error::InvalidResolution(11))));
    }

    #[test]
    fn test_covering_rejects_short_ring() {
        let ring = [Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)];
        assert!(matches!(cells_covering_polygon(&ring, 3), Err(Error::InvalidGeometry(_))));
    }
}
