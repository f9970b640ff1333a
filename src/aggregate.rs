/// Multi-resolution point aggregation
///
/// Every point is indexed once at the fine resolution and its weight is added to
/// each ancestor cell from resolution 1 through 9. The result is a sparse mapping:
/// cells that never received a point are absent and read as zero.

use crate::constants::{MAX_AGGREGATE_RESOLUTION, MIN_AGGREGATE_RESOLUTION};
use crate::error::Result;
use crate::hex_indexer::{parent_cell, point_to_fine_cell};
use h3o::CellIndex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Input point; `weight` of `None` counts as one occurrence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub weight: Option<u64>,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, weight: None }
    }

    pub fn weighted(latitude: f64, longitude: f64, weight: u64) -> Self {
        Self { latitude, longitude, weight: Some(weight) }
    }

    pub fn weight(&self) -> u64 {
        self.weight.unwrap_or(1)
    }
}

/// What to do with a point that cannot be indexed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRowPolicy {
    /// Abort the whole aggregation on the first bad point
    #[default]
    FailFast,
    /// Drop bad points and keep going
    Skip,
}

/// Sparse cell counts for one resolution
pub type CellCounts = HashMap<CellIndex, u64>;

/// Per-resolution cell counts for resolutions 1..=9.
///
/// Every level is always present. Absent cells have a count of zero; read them
/// through [`AggregateMapping::count`] rather than probing the maps directly.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMapping {
    levels: BTreeMap<u8, CellCounts>,
    points_aggregated: usize,
    skipped_points: usize,
}

impl Default for AggregateMapping {
    fn default() -> Self {
        Self::empty()
    }
}

impl AggregateMapping {
    pub fn empty() -> Self {
        let levels = (MIN_AGGREGATE_RESOLUTION..=MAX_AGGREGATE_RESOLUTION)
            .map(|r| (r, CellCounts::new()))
            .collect();
        Self { levels, points_aggregated: 0, skipped_points: 0 }
    }

    /// Count for `cell` at `resolution`, zero when absent or the resolution is
    /// not aggregated.
    pub fn count(&self, resolution: u8, cell: CellIndex) -> u64 {
        self.levels
            .get(&resolution)
            .and_then(|level| level.get(&cell))
            .copied()
            .unwrap_or(0)
    }

    pub fn level(&self, resolution: u8) -> Option<&CellCounts> {
        self.levels.get(&resolution)
    }

    pub fn resolutions(&self) -> impl Iterator<Item = u8> + '_ {
        self.levels.keys().copied()
    }

    /// Sum of all counts at a resolution
    pub fn total(&self, resolution: u8) -> u64 {
        self.levels
            .get(&resolution)
            .map(|level| level.values().fold(0u64, |acc, c| acc.saturating_add(*c)))
            .unwrap_or(0)
    }

    /// Cells with a count above zero, sorted by index
    pub fn non_zero_cells(&self, resolution: u8) -> Vec<(CellIndex, u64)> {
        let mut cells: Vec<(CellIndex, u64)> = self
            .levels
            .get(&resolution)
            .map(|level| level.iter().filter(|(_, c)| **c > 0).map(|(k, c)| (*k, *c)).collect())
            .unwrap_or_default();
        cells.sort_unstable_by_key(|(cell, _)| u64::from(*cell));
        cells
    }

    pub fn points_aggregated(&self) -> usize {
        self.points_aggregated
    }

    pub fn skipped_points(&self) -> usize {
        self.skipped_points
    }

    pub fn is_empty(&self) -> bool {
        self.levels.values().all(|level| level.is_empty())
    }

    /// `{"<resolution>": {"<cell hex id>": count}}`, keys sorted
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (res, level) in &self.levels {
            let cells: BTreeMap<String, u64> =
                level.iter().map(|(cell, count)| (cell.to_string(), *count)).collect();
            let cells: Map<String, Value> =
                cells.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
            out.insert(res.to_string(), Value::Object(cells));
        }
        Value::Object(out)
    }

    /// Rows dropped before they reached the aggregator
    pub(crate) fn record_skipped(&mut self, rows: usize) {
        self.skipped_points += rows;
    }

    fn add(&mut self, resolution: u8, cell: CellIndex, weight: u64) {
        let entry = self
            .levels
            .entry(resolution)
            .or_default()
            .entry(cell)
            .or_insert(0);
        *entry = entry.saturating_add(weight);
    }
}

/// Builds an [`AggregateMapping`] from a batch of points
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    pub policy: InvalidRowPolicy,
}

impl Aggregator {
    pub fn new(policy: InvalidRowPolicy) -> Self {
        Self { policy }
    }

    pub fn aggregate<I>(&self, points: I) -> Result<AggregateMapping>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut mapping = AggregateMapping::empty();

        for (row, point) in points.into_iter().enumerate() {
            let fine = match point_to_fine_cell(point.latitude, point.longitude) {
                Ok(cell) => cell,
                Err(e) if self.policy == InvalidRowPolicy::Skip => {
                    warn!(row, error = %e, "skipping point");
                    mapping.skipped_points += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let weight = point.weight();
            for res in MIN_AGGREGATE_RESOLUTION..=MAX_AGGREGATE_RESOLUTION {
                let ancestor = parent_cell(fine, res)?;
                mapping.add(res, ancestor, weight);
            }
            mapping.points_aggregated += 1;
        }

        debug!(
            points = mapping.points_aggregated,
            skipped = mapping.skipped_points,
            "aggregation complete"
        );
        Ok(mapping)
    }
}

/// Aggregate with the default fail-fast policy
pub fn aggregate<I>(points: I) -> Result<AggregateMapping>
where
    I: IntoIterator<Item = Point>,
{
    Aggregator::default().aggregate(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hex_indexer::point_to_cell;

    #[test]
    fn test_empty_input() {
        let mapping = aggregate(Vec::new()).unwrap();
        assert_eq!(mapping.resolutions().collect::<Vec<_>>(), (1..=9).collect::<Vec<u8>>());
        assert!(mapping.is_empty());
        assert_eq!(mapping.points_aggregated(), 0);
    }

    #[test]
    fn test_single_point_counts_every_level() {
        let mapping = aggregate(vec![Point::new(40.0, -95.0)]).unwrap();
        for res in 1..=9u8 {
            let cell = point_to_cell(40.0, -95.0, res).unwrap();
            assert_eq!(mapping.count(res, cell), 1);
            assert_eq!(mapping.level(res).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_absent_cells_read_zero() {
        let mapping = aggregate(vec![Point::new(40.0, -95.0)]).unwrap();
        let elsewhere = point_to_cell(-10.0, 20.0, 4).unwrap();
        assert_eq!(mapping.count(4, elsewhere), 0);
        // resolution 10 is indexed but not aggregated
        let fine = point_to_cell(40.0, -95.0, 10).unwrap();
        assert_eq!(mapping.count(10, fine), 0);
    }

    #[test]
    fn test_weights() {
        let mapping = aggregate(vec![
            Point::weighted(40.0, -95.0, 120),
            Point::new(40.0, -95.0),
            Point::weighted(40.0, -95.0, 0),
        ])
        .unwrap();
        let cell = point_to_cell(40.0, -95.0, 6).unwrap();
        assert_eq!(mapping.count(6, cell), 121);
        assert_eq!(mapping.total(6), 121);
    }

    #[test]
    fn test_zero_weight_is_observed() {
        let mapping = aggregate(vec![Point::weighted(10.0, 10.0, 0)]).unwrap();
        assert_eq!(mapping.level(3).unwrap().len(), 1);
        assert!(mapping.non_zero_cells(3).is_empty());
    }

    #[test]
    fn test_fail_fast() {
        let result = aggregate(vec![Point::new(40.0, -95.0), Point::new(95.0, 0.0)]);
        assert!(matches!(result, Err(Error::InvalidCoordinate { .. })));
    }

    #[test]
    fn test_skip_policy() {
        let mapping = Aggregator::new(InvalidRowPolicy::Skip)
            .aggregate(vec![Point::new(40.0, -95.0), Point::new(95.0, 0.0), Point::new(0.0, 200.0)])
            .unwrap();
        assert_eq!(mapping.points_aggregated(), 1);
        assert_eq!(mapping.skipped_points(), 2);
        assert_eq!(mapping.total(1), 1);
    }

    #[test]
    fn test_to_json_shape() {
        let mapping = aggregate(vec![Point::new(40.0, -95.0)]).unwrap();
        let json = mapping.to_json();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 9);
        let cell = point_to_cell(40.0, -95.0, 2).unwrap();
        assert_eq!(json["2"][cell.to_string()], 1);
    }
}
