// The fill-color expression handed to the map widget

use hexmap_agg::styling::StylingThresholds;
use serde_json::json;

#[test]
fn test_default_ramp_matches_published_scale() {
    let expr = StylingThresholds::default().color_ramp_expression();
    assert_eq!(
        expr,
        json!([
            "interpolate", ["linear"], ["get", "count"],
            0,
            "#F2F12D", 1.0,
            "#EED322", 2.0,
            "#E6B71E", 5.0,
            "#DA9C20", 10.0,
            "#CA8323", 15.0,
            "#B86B25", 20.0,
            "#A25626", 25.0,
            "#8B4225", 100.0,
            "#723122"
        ])
    );
}
