//! Nearest-site search
//!
//! Matches a bare coordinate against a snapshot of registered sites. The
//! search is a pure function of its inputs: the "last matched site" shortcut
//! is passed in as a hint rather than kept between calls.

use serde::{Deserialize, Serialize};

use crate::db::models::Site;

/// Mean earth radius (IUGG), metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Geographic position in degrees, altitude in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<&Site> for GeoPosition {
    fn from(site: &Site) -> Self {
        Self {
            latitude: site.latitude,
            longitude: site.longitude,
            altitude: site.altitude,
        }
    }
}

/// Distance between two points on the earth's surface.
pub trait DistanceMetric {
    /// Distance in metres between two latitude/longitude pairs given in degrees.
    fn distance(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64;
}

/// Great-circle distance on a sphere of mean earth radius.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceMetric for Haversine {
    fn distance(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        let phi1 = lat1.to_radians();
        let phi2 = lat2.to_radians();
        let d_phi = (lat2 - lat1).to_radians();
        let d_lambda = (lon2 - lon1).to_radians();

        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        // Clamp guards against a > 1 from rounding on antipodal points.
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

/// A site found within the threshold, with its distance from the candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteMatch {
    pub site: Site,
    pub distance_m: f64,
}

/// Find the site nearest to `candidate`, if it lies within `threshold_m`.
///
/// Soft-deleted sites (`dont_display`) are skipped. When `hint` names a site in
/// the snapshot that is within the threshold it is returned without scanning
/// the rest. Otherwise the first site with the strictly smallest distance wins,
/// so among equidistant sites the one earliest in `sites` is returned.
pub fn find_nearest_site(
    candidate: &GeoPosition,
    sites: &[Site],
    metric: &dyn DistanceMetric,
    threshold_m: f64,
    hint: Option<i32>,
) -> Option<SiteMatch> {
    let distance_to = |site: &Site| {
        metric.distance(
            candidate.latitude,
            candidate.longitude,
            site.latitude,
            site.longitude,
        )
    };

    if let Some(hint_id) = hint {
        if let Some(site) = sites
            .iter()
            .find(|s| s.site_id == hint_id && !s.dont_display)
        {
            let distance_m = distance_to(site);
            if distance_m <= threshold_m {
                return Some(SiteMatch {
                    site: site.clone(),
                    distance_m,
                });
            }
        }
    }

    let mut best: Option<(&Site, f64)> = None;
    for site in sites.iter().filter(|s| !s.dont_display) {
        let distance_m = distance_to(site);
        match best {
            Some((_, best_distance)) if distance_m >= best_distance => {}
            _ => best = Some((site, distance_m)),
        }
    }

    best.filter(|(_, distance_m)| *distance_m <= threshold_m)
        .map(|(site, distance_m)| SiteMatch {
            site: site.clone(),
            distance_m,
        })
}
