// Grid resolutions
pub const FINE_RESOLUTION: u8 = 10; // every point is indexed here first
pub const MIN_AGGREGATE_RESOLUTION: u8 = 1;
pub const MAX_AGGREGATE_RESOLUTION: u8 = 9;

// Valid coordinate range, degrees
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

// Zoom → resolution tuning table, index 0 is zoom 1
pub const MIN_ZOOM: i32 = 1;
pub const MAX_ZOOM: i32 = 22;
pub const ZOOM_RESOLUTION_TABLE: [u8; 22] = [
    1, 2, 3, 4, 4, 5, 6, 7, 7, 8, 8, 9, 9, // zoom 1..=13
    10, 10, 10, 10, 10, 10, 10, 10, 10, // zoom 14..=22
];

// Render collaborator defaults
pub const DEFAULT_SOURCE_ID: &str = "h3_index";
pub const DEFAULT_LAYER_ID: &str = "h3_index";
pub const DEFAULT_FILL_OPACITY: f64 = 0.5;
pub const DEFAULT_CENTER: [f64; 2] = [-95.0, 40.0]; // [lng, lat]
pub const DEFAULT_ZOOM: f64 = 4.0;

// Default colour ramp: (max count, colour)
pub const DEFAULT_STYLING_STOPS: &[(f64, &str)] = &[
    (1.0, "#F2F12D"),
    (2.0, "#EED322"),
    (5.0, "#E6B71E"),
    (10.0, "#DA9C20"),
    (15.0, "#CA8323"),
    (20.0, "#B86B25"),
    (25.0, "#A25626"),
    (100.0, "#8B4225"),
];
pub const DEFAULT_OVERFLOW_COLOR: &str = "#723122";

// Feature property keys
pub const CELL_PROPERTY: &str = "h3";
pub const COUNT_PROPERTY: &str = "count";
