/// Map session
///
/// Owns the published aggregate and the render sink, and serialises the two event
/// streams the map produces: data loads and viewport changes. A load runs as one
/// unit; viewport events arriving while it is pending are held and replayed against
/// the freshly published mapping.

use crate::aggregate::{AggregateMapping, Aggregator, InvalidRowPolicy, Point};
use crate::config::MapConfig;
use crate::constants::MAX_AGGREGATE_RESOLUTION;
use crate::error::{Error, Result};
use crate::hex_indexer::point_to_cell;
use crate::render_feed::{FillLayer, RenderSink, build_feature_collection, publish};
use crate::row_source::{Row, RowSource, point_from_row};
use crate::styling::StylingThresholds;
use crate::viewport::{Viewport, cells_for_viewport, resolution_for_zoom};
use geojson::FeatureCollection;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Proof of a started load; hand it back to finish or fail that load
#[derive(Debug, PartialEq, Eq)]
pub struct LoadTicket {
    id: u64,
}

impl LoadTicket {
    pub fn id(&self) -> u64 {
        self.id
    }
}

pub struct MapSession<S: RenderSink> {
    config: MapConfig,
    sink: S,
    mapping: Option<Arc<AggregateMapping>>,
    pending_load: Option<u64>,
    next_load_id: u64,
    queued_viewport: Option<Viewport>,
    last_viewport: Option<Viewport>,
    rendered: bool,
}

impl<S: RenderSink> MapSession<S> {
    pub fn new(config: MapConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            mapping: None,
            pending_load: None,
            next_load_id: 1,
            queued_viewport: None,
            last_viewport: None,
            rendered: false,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Snapshot of the published mapping. Stays valid after later loads.
    pub fn mapping(&self) -> Option<Arc<AggregateMapping>> {
        self.mapping.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    pub fn last_viewport(&self) -> Option<Viewport> {
        self.last_viewport
    }

    /// Reserve the load slot. Only one load may be pending at a time.
    pub fn begin_load(&mut self) -> Result<LoadTicket> {
        if self.pending_load.is_some() {
            return Err(Error::LoadInProgress);
        }
        let id = self.next_load_id;
        self.next_load_id += 1;
        self.pending_load = Some(id);
        info!(load = id, "load started");
        Ok(LoadTicket { id })
    }

    /// Aggregate `rows`, publish the result and replay any queued viewport.
    ///
    /// On error the previously published mapping is left in place and a queued
    /// viewport is still rendered against it. Either way the load slot is
    /// released.
    pub fn complete_load(&mut self, ticket: LoadTicket, rows: Vec<Row>) -> Result<Option<FeatureCollection>> {
        self.check_ticket(&ticket)?;
        let built = self.build_mapping(rows);
        self.pending_load = None;

        let mapping = match built {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(load = ticket.id, error = %e, "load rejected");
                self.replay_queued();
                return Err(e);
            }
        };

        info!(
            load = ticket.id,
            points = mapping.points_aggregated(),
            skipped = mapping.skipped_points(),
            cells = mapping.level(MAX_AGGREGATE_RESOLUTION).map_or(0, |l| l.len()),
            "mapping published"
        );
        self.mapping = Some(Arc::new(mapping));

        // refresh whatever the map is showing against the new counts
        let replay = self.queued_viewport.take().or(self.last_viewport);
        Ok(replay.map(|viewport| self.render_viewport(viewport)))
    }

    /// The row source reported a failure. Releases the slot, renders any queued
    /// viewport against the current mapping and returns the error to surface to
    /// whoever started the load.
    pub fn fail_load(&mut self, ticket: LoadTicket, reason: impl Into<String>) -> Error {
        if let Err(e) = self.check_ticket(&ticket) {
            return e;
        }
        let reason = reason.into();
        self.pending_load = None;
        warn!(load = ticket.id, reason = %reason, "load failed");
        self.replay_queued();
        Error::LoadFailure(reason)
    }

    /// Read everything from `source` and load it.
    pub fn load_from<R: RowSource + ?Sized>(&mut self, source: &mut R) -> Result<Option<FeatureCollection>> {
        let ticket = self.begin_load()?;
        match source.read_rows() {
            Ok(rows) => self.complete_load(ticket, rows),
            Err(Error::LoadFailure(reason)) => Err(self.fail_load(ticket, reason)),
            Err(e) => Err(self.fail_load(ticket, e.to_string())),
        }
    }

    /// First render of the map counts as a viewport change; later renders are
    /// ignored.
    pub fn on_render(&mut self, viewport: Viewport) -> Option<FeatureCollection> {
        if self.rendered {
            return None;
        }
        self.rendered = true;
        self.on_viewport_changed(viewport)
    }

    /// Recompute and publish the visible cells. Held until the pending load
    /// finishes if one is running; only the latest held viewport is kept.
    pub fn on_viewport_changed(&mut self, viewport: Viewport) -> Option<FeatureCollection> {
        if self.pending_load.is_some() {
            debug!(zoom = viewport.zoom, "viewport queued behind load");
            self.queued_viewport = Some(viewport);
            return None;
        }
        Some(self.render_viewport(viewport))
    }

    /// Replace the colour scale and push it to the layer if it exists.
    pub fn update_style(&mut self, styling: StylingThresholds) {
        self.config.styling = styling;
        if self.sink.has_layer(&self.config.layer_id) {
            self.sink.set_paint_property(
                &self.config.layer_id,
                "fill-color",
                self.config.styling.color_ramp_expression(),
            );
        }
    }

    /// Count of the cell containing a point at the zoom's resolution, e.g. for
    /// a click on the map.
    pub fn count_at(&self, lat: f64, lng: f64, zoom: i32) -> Result<u64> {
        let resolution = resolution_for_zoom(zoom);
        let cell = point_to_cell(lat, lng, resolution)?;
        Ok(self.mapping.as_ref().map_or(0, |m| m.count(resolution, cell)))
    }

    fn check_ticket(&self, ticket: &LoadTicket) -> Result<()> {
        if self.pending_load != Some(ticket.id) {
            return Err(Error::StaleLoad);
        }
        Ok(())
    }

    fn build_mapping(&self, rows: Vec<Row>) -> Result<AggregateMapping> {
        let policy = self.config.invalid_rows;
        let mut points: Vec<Point> = Vec::with_capacity(rows.len());
        let mut skipped = 0;

        for (i, row) in rows.iter().enumerate() {
            match point_from_row(row, &self.config.columns) {
                Ok(point) => points.push(point),
                Err(e) if policy == InvalidRowPolicy::Skip => {
                    warn!(row = i, error = %e, "skipping row");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let mut mapping = Aggregator::new(policy).aggregate(points)?;
        mapping.record_skipped(skipped);
        Ok(mapping)
    }

    fn replay_queued(&mut self) {
        if let Some(viewport) = self.queued_viewport.take() {
            debug!(zoom = viewport.zoom, "replaying queued viewport after failed load");
            self.render_viewport(viewport);
        }
    }

    fn render_viewport(&mut self, viewport: Viewport) -> FeatureCollection {
        self.last_viewport = Some(viewport);
        let resolution = viewport.resolution();
        let cells = cells_for_viewport(&viewport);

        let empty = AggregateMapping::empty();
        let mapping = self.mapping.as_deref().unwrap_or(&empty);
        let collection = build_feature_collection(&cells, mapping, resolution);

        let layer = || FillLayer {
            id: self.config.layer_id.clone(),
            source: self.config.source_id.clone(),
            fill_color: self.config.styling.color_ramp_expression(),
            fill_opacity: self.config.fill_opacity,
        };
        publish(&mut self.sink, &self.config.source_id, layer, collection.clone());
        collection
    }
}
