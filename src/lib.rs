pub mod constants;
pub mod error;
pub mod hex_indexer;
pub mod aggregate;
pub mod viewport;
pub mod render_feed;
pub mod styling;
pub mod row_source;
pub mod config;
pub mod session;

pub use aggregate::{AggregateMapping, Aggregator, InvalidRowPolicy, Point, aggregate};
pub use config::MapConfig;
pub use error::{Error, Result};
pub use render_feed::{MemorySink, RenderSink, build_feature_collection};
pub use session::{LoadTicket, MapSession};
pub use viewport::{Bounds, Viewport, cells_for_viewport, resolution_for_zoom};
