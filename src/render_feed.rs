/// Render Feed
///
/// Joins visible cells against the aggregate counts and pushes the result, as a
/// GeoJSON FeatureCollection, to the map widget's data source.

use crate::aggregate::AggregateMapping;
use crate::constants::{CELL_PROPERTY, COUNT_PROPERTY};
use crate::hex_indexer::cell_to_boundary_polygon;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value as GeoValue};
use h3o::CellIndex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One feature per distinct cell, in input order. Cells missing from the
/// mapping get a count of zero.
pub fn build_feature_collection(
    cells: &[CellIndex],
    mapping: &AggregateMapping,
    resolution: u8,
) -> FeatureCollection {
    let mut seen = HashSet::with_capacity(cells.len());
    let features = cells
        .iter()
        .filter(|cell| seen.insert(**cell))
        .map(|cell| cell_feature(*cell, mapping.count(resolution, *cell)))
        .collect();

    FeatureCollection { bbox: None, features, foreign_members: None }
}

fn cell_feature(cell: CellIndex, count: u64) -> Feature {
    let ring: Vec<Vec<f64>> = cell_to_boundary_polygon(cell)
        .into_iter()
        .map(|c| c.to_position())
        .collect();

    let mut properties = JsonObject::new();
    properties.insert(CELL_PROPERTY.to_string(), Value::from(cell.to_string()));
    properties.insert(COUNT_PROPERTY.to_string(), Value::from(count));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::Polygon(vec![ring]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Fill layer drawn from the cell source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillLayer {
    pub id: String,
    pub source: String,
    pub fill_color: Value,
    pub fill_opacity: f64,
}

/// The map widget's source/layer API
pub trait RenderSink {
    fn has_source(&self, id: &str) -> bool;

    fn add_source(&mut self, id: &str, data: FeatureCollection);

    /// Replace the contents of an existing source
    fn set_source_data(&mut self, id: &str, data: FeatureCollection);

    fn has_layer(&self, id: &str) -> bool;

    fn add_layer(&mut self, layer: FillLayer);

    fn set_paint_property(&mut self, layer_id: &str, property: &str, value: Value);
}

/// Push a collection into `source_id`, creating the source and layer only on
/// first use. Later calls just swap the source contents.
pub fn publish<S: RenderSink + ?Sized>(
    sink: &mut S,
    source_id: &str,
    layer: impl FnOnce() -> FillLayer,
    collection: FeatureCollection,
) {
    if sink.has_source(source_id) {
        sink.set_source_data(source_id, collection);
    } else {
        sink.add_source(source_id, collection);
    }

    let layer = layer();
    if !sink.has_layer(&layer.id) {
        sink.add_layer(layer);
    }
}

/// In-memory sink; records what a map widget would hold
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub sources: HashMap<String, FeatureCollection>,
    pub layers: HashMap<String, FillLayer>,
    pub sources_created: usize,
    pub layers_created: usize,
    pub updates: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&FillLayer> {
        self.layers.get(id)
    }
}

impl RenderSink for MemorySink {
    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: FeatureCollection) {
        self.sources.insert(id.to_string(), data);
        self.sources_created += 1;
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) {
        if let Some(existing) = self.sources.get_mut(id) {
            *existing = data;
            self.updates += 1;
        }
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    fn add_layer(&mut self, layer: FillLayer) {
        self.layers.insert(layer.id.clone(), layer);
        self.layers_created += 1;
    }

    fn set_paint_property(&mut self, layer_id: &str, property: &str, value: Value) {
        if let Some(layer) = self.layers.get_mut(layer_id) {
            match property {
                "fill-color" => layer.fill_color = value,
                "fill-opacity" => {
                    if let Some(opacity) = value.as_f64() {
                        layer.fill_opacity = opacity;
                    }
                }
                _ => {}
            }
        }
    }
}
