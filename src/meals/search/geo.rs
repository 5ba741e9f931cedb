//! Geo Resolver: turns the location part of a search into the set of
//! address ids a meal must be listed at.
//!
//! Distances use a spherical Earth with the mean radius [`EARTH_RADIUS_M`].
//! Radius mode wins over the city/state/postal-code text mode when a request
//! carries both.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::error::SearchError;
use super::filters::LocationQuery;
use super::store::SearchStore;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Slack added to bounding boxes so points sitting exactly on the cap edge
/// survive the SQL prefilter.
const BOX_MARGIN_DEG: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle angle to `other` in radians (haversine).
    pub fn central_angle(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlng = (other.longitude - self.longitude).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }

    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        self.central_angle(other) * EARTH_RADIUS_M
    }
}

/// Spherical-cap containment, boundary inclusive.
pub fn within_radius(center: &GeoPoint, radius_m: f64, point: &GeoPoint) -> bool {
    center.distance_m(point) <= radius_m
}

/// Case-insensitive substring constraints on address fields; every supplied
/// component has to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoFilter {
    Unconstrained,
    Radius { center: GeoPoint, radius_m: f64 },
    Text(TextLocation),
}

impl GeoFilter {
    pub fn from_location(loc: &LocationQuery) -> Self {
        if let (Some(lat), Some(lng), Some(radius_m)) = (loc.lat, loc.lng, loc.radius_m) {
            return GeoFilter::Radius {
                center: GeoPoint::new(lat, lng),
                radius_m,
            };
        }
        if loc.city.is_some() || loc.state.is_some() || loc.postal_code.is_some() {
            return GeoFilter::Text(TextLocation {
                city: loc.city.clone(),
                state: loc.state.clone(),
                postal_code: loc.postal_code.clone(),
            });
        }
        GeoFilter::Unconstrained
    }

    /// `None` means no address constraint; `Some(ids)` restricts meals to
    /// those addresses, possibly to none at all.
    pub async fn resolve(&self, store: &dyn SearchStore) -> Result<Option<Vec<Uuid>>, SearchError> {
        match self {
            GeoFilter::Unconstrained => Ok(None),
            GeoFilter::Radius { center, radius_m } => {
                let ids = store.address_ids_within(*center, *radius_m).await?;
                debug!(
                    lat = center.latitude,
                    lng = center.longitude,
                    radius_m,
                    matched = ids.len(),
                    "radius address lookup"
                );
                Ok(Some(ids))
            }
            GeoFilter::Text(location) => {
                let ids = store.address_ids_matching(location).await?;
                debug!(?location, matched = ids.len(), "text address lookup");
                Ok(Some(ids))
            }
        }
    }
}

/// Latitude/longitude window (degrees) enclosing a spherical cap. Used as an
/// index-friendly prefilter before the exact distance test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    /// `None` when the cap covers a pole or crosses the antimeridian.
    pub longitude: Option<(f64, f64)>,
}

impl BoundingBox {
    pub fn around(center: GeoPoint, radius_m: f64) -> Self {
        let angle = radius_m / EARTH_RADIUS_M;
        let lat = center.latitude.to_radians();
        let min_lat = lat - angle;
        let max_lat = lat + angle;

        if min_lat <= -FRAC_PI_2 || max_lat >= FRAC_PI_2 {
            return Self {
                min_lat: (min_lat.to_degrees() - BOX_MARGIN_DEG).max(-90.0),
                max_lat: (max_lat.to_degrees() + BOX_MARGIN_DEG).min(90.0),
                longitude: None,
            };
        }

        let dlng = (angle.sin() / lat.cos()).asin();
        let lng = center.longitude.to_radians();
        let min_lng = lng - dlng;
        let max_lng = lng + dlng;
        let longitude = if min_lng < -PI || max_lng > PI {
            None
        } else {
            Some((
                min_lng.to_degrees() - BOX_MARGIN_DEG,
                max_lng.to_degrees() + BOX_MARGIN_DEG,
            ))
        };

        Self {
            min_lat: min_lat.to_degrees() - BOX_MARGIN_DEG,
            max_lat: max_lat.to_degrees() + BOX_MARGIN_DEG,
            longitude,
        }
    }

    #[cfg(test)]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let lat_ok = point.latitude >= self.min_lat && point.latitude <= self.max_lat;
        let lng_ok = match self.longitude {
            Some((min, max)) => point.longitude >= min && point.longitude <= max,
            None => true,
        };
        lat_ok && lng_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKYO: GeoPoint = GeoPoint {
        latitude: 35.6762,
        longitude: 139.6503,
    };

    /// Point `meters` due north of `from`.
    fn north_of(from: GeoPoint, meters: f64) -> GeoPoint {
        GeoPoint::new(from.latitude + (meters / EARTH_RADIUS_M).to_degrees(), from.longitude)
    }

    #[test]
    fn center_is_inside_any_radius() {
        for radius in [0.0, 1.0, 10_000.0, 5_000_000.0] {
            assert!(within_radius(&TOKYO, radius, &TOKYO), "radius {radius}");
        }
    }

    #[test]
    fn boundary_is_inclusive() {
        let p = north_of(TOKYO, 5_000.0);
        let d = TOKYO.distance_m(&p);
        assert!((d - 5_000.0).abs() < 1e-3);
        assert!(within_radius(&TOKYO, d, &p));
        assert!(!within_radius(&TOKYO, d - 0.01, &p));
    }

    #[test]
    fn paris_to_tokyo_is_roughly_9700_km() {
        let paris = GeoPoint::new(48.8566, 2.3522);
        let km = paris.distance_m(&TOKYO) / 1000.0;
        assert!((9_650.0..9_750.0).contains(&km), "{km}");
    }

    #[test]
    fn radius_takes_precedence_over_text() {
        let loc = LocationQuery {
            lat: Some(1.0),
            lng: Some(2.0),
            radius_m: Some(300.0),
            city: Some("Paris".into()),
            ..Default::default()
        };
        assert_eq!(
            GeoFilter::from_location(&loc),
            GeoFilter::Radius {
                center: GeoPoint::new(1.0, 2.0),
                radius_m: 300.0
            }
        );
    }

    #[test]
    fn missing_radius_falls_back_to_text_or_nothing() {
        let loc = LocationQuery {
            lat: Some(1.0),
            lng: Some(2.0),
            ..Default::default()
        };
        assert_eq!(GeoFilter::from_location(&loc), GeoFilter::Unconstrained);

        let loc = LocationQuery {
            lat: Some(1.0),
            lng: Some(2.0),
            postal_code: Some("750".into()),
            ..Default::default()
        };
        assert_eq!(
            GeoFilter::from_location(&loc),
            GeoFilter::Text(TextLocation {
                postal_code: Some("750".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn bounding_box_encloses_the_cap() {
        let radius = 10_000.0;
        let bbox = BoundingBox::around(TOKYO, radius);
        assert!(bbox.longitude.is_some());
        for bearing in 0..36 {
            let theta = (bearing as f64 * 10.0).to_radians();
            // Walk to the cap edge along `theta` (direct geodesic problem).
            let angle = radius / EARTH_RADIUS_M;
            let lat1 = TOKYO.latitude.to_radians();
            let lng1 = TOKYO.longitude.to_radians();
            let lat2 = (lat1.sin() * angle.cos() + lat1.cos() * angle.sin() * theta.cos()).asin();
            let lng2 = lng1
                + (theta.sin() * angle.sin() * lat1.cos())
                    .atan2(angle.cos() - lat1.sin() * lat2.sin());
            let edge = GeoPoint::new(lat2.to_degrees(), lng2.to_degrees());
            assert!(bbox.contains(&edge), "bearing {bearing}");
        }
        assert!(!bbox.contains(&north_of(TOKYO, 10_500.0)));
    }

    #[test]
    fn bounding_box_drops_longitude_near_poles_and_antimeridian() {
        let polar = BoundingBox::around(GeoPoint::new(89.95, 10.0), 20_000.0);
        assert_eq!(polar.longitude, None);
        assert_eq!(polar.max_lat, 90.0);

        let fiji = BoundingBox::around(GeoPoint::new(-17.7, 179.99), 5_000.0);
        assert_eq!(fiji.longitude, None);
    }
}
