//! Region classification for stop coordinates.
//!
//! Consumed only at static-load time: the loader asks "what named region,
//! if any, contains this lat/lon" once per stop and stores the answer on
//! the stop record. Nothing on the request path depends on this crate.

use geo::{Contains, LineString, Point, Polygon};

/// A named region a stop can fall inside (e.g. a borough).
pub trait RegionLookup: Send + Sync {
    /// Returns the name of the region containing `(lat, lon)`, or `None`
    /// if the point falls outside every known region.
    fn region_for(&self, lat: f64, lon: f64) -> Option<String>;
}

struct Region {
    name: &'static str,
    polygon: Polygon<f64>,
}

/// A small set of coarse NYC borough outlines, good enough to bucket a
/// station's coordinates into a region without a full GIS dependency.
pub struct BoroughLookup {
    regions: Vec<Region>,
}

impl BoroughLookup {
    pub fn new() -> Self {
        Self {
            regions: vec![
                Region {
                    name: "Manhattan",
                    polygon: polygon(&[
                        (40.879, -73.933),
                        (40.879, -73.907),
                        (40.700, -73.966),
                        (40.700, -74.020),
                    ]),
                },
                Region {
                    name: "Brooklyn",
                    polygon: polygon(&[
                        (40.739, -73.833),
                        (40.739, -74.042),
                        (40.570, -74.042),
                        (40.570, -73.833),
                    ]),
                },
                Region {
                    name: "Queens",
                    polygon: polygon(&[
                        (40.800, -73.700),
                        (40.800, -73.962),
                        (40.541, -73.962),
                        (40.541, -73.700),
                    ]),
                },
                Region {
                    name: "Bronx",
                    polygon: polygon(&[
                        (40.915, -73.765),
                        (40.915, -73.933),
                        (40.785, -73.933),
                        (40.785, -73.765),
                    ]),
                },
                Region {
                    name: "Staten Island",
                    polygon: polygon(&[
                        (40.651, -74.034),
                        (40.651, -74.259),
                        (40.477, -74.259),
                        (40.477, -74.034),
                    ]),
                },
            ],
        }
    }
}

impl Default for BoroughLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionLookup for BoroughLookup {
    fn region_for(&self, lat: f64, lon: f64) -> Option<String> {
        let point = Point::new(lon, lat);
        self.regions
            .iter()
            .find(|region| region.polygon.contains(&point))
            .map(|region| region.name.to_owned())
    }
}

fn polygon(corners: &[(f64, f64)]) -> Polygon<f64> {
    let mut coords: Vec<(f64, f64)> =
        corners.iter().map(|(lat, lon)| (*lon, *lat)).collect();
    coords.push(coords[0]);
    Polygon::new(LineString::from(coords), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_a_manhattan_point() {
        let lookup = BoroughLookup::new();
        assert_eq!(
            lookup.region_for(40.7527, -73.9772),
            Some("Manhattan".to_owned())
        );
    }

    #[test]
    fn returns_none_outside_every_region() {
        let lookup = BoroughLookup::new();
        assert_eq!(lookup.region_for(0.0, 0.0), None);
    }
}
