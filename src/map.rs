//! OpenStreetMap embed URL construction.
//!
//! The map panel is a pure rendering sink: an embedded frame centered on
//! the current fix. No response is consumed.

/// Half-width of the embed bounding box, degrees.
const EMBED_SPAN_DEG: f64 = 0.01;

/// Tile layer requested from the embed endpoint.
const EMBED_LAYER: &str = "mapnik";

const EMBED_BASE: &str = "https://www.openstreetmap.org/export/embed.html";

/// Bounding box around a fix: `(west, south, east, north)`.
#[must_use]
pub fn bounding_box(latitude: f64, longitude: f64) -> (f64, f64, f64, f64) {
    (
        longitude - EMBED_SPAN_DEG,
        latitude - EMBED_SPAN_DEG,
        longitude + EMBED_SPAN_DEG,
        latitude + EMBED_SPAN_DEG,
    )
}

/// Embed URL with the fixed-span bounding box and a marker at the exact
/// position.
#[must_use]
pub fn embed_url(latitude: f64, longitude: f64) -> String {
    let (west, south, east, north) = bounding_box(latitude, longitude);
    format!(
        "{EMBED_BASE}?bbox={west},{south},{east},{north}&layer={EMBED_LAYER}&marker={latitude},{longitude}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_is_fixed_span() {
        let (west, south, east, north) = bounding_box(45.5, -73.5);
        assert!((west - (-73.51)).abs() < 1e-12);
        assert!((south - 45.49).abs() < 1e-12);
        assert!((east - (-73.49)).abs() < 1e-12);
        assert!((north - 45.51).abs() < 1e-12);
    }

    #[test]
    fn embed_url_carries_layer_and_marker() {
        let url = embed_url(45.5, -73.5);
        assert!(url.starts_with("https://www.openstreetmap.org/export/embed.html?bbox="));
        assert!(url.contains("bbox=-73.51,45.49,-73.49,45.51"));
        assert!(url.contains("layer=mapnik"));
        assert!(url.ends_with("marker=45.5,-73.5"));
    }
}
