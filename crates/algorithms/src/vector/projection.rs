//! Pure-Rust coordinate projection on the WGS84 ellipsoid (Snyder 1987).
//!
//! - Transverse Mercator / UTM, forward and inverse (EPSG 326xx, 327xx and
//!   SIRGAS 2000 UTM 31978–31985)
//! - Albers Equal-Area Conic, forward and inverse, for area-preserving work
//!
//! Geographic CRSs are treated as sharing the WGS84 datum (SIRGAS 2000 and
//! WGS84 differ by centimetres).

use geo::{BoundingRect, Coord, Geometry, MapCoords};
use hydrorisk_core::{Error, Result, CRS};
use tracing::{debug, warn};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

// ── UTM (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ──────────────────

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// WGS84 (longitude, latitude) in degrees to UTM (easting, northing) in metres
pub fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north { northing } else { northing + FALSE_NORTHING_SOUTH };
    (easting, northing)
}

/// UTM (easting, northing) in metres back to WGS84 (longitude, latitude) in degrees
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let y = if north { northing } else { northing - FALSE_NORTHING_SOUTH };
    let x = easting - FALSE_EASTING;

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    // Footpoint latitude (Snyder eq. 3-26, 7-19)
    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();
    let c1 = E_PRIME2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - E2 * sin1 * sin1;
    let n1 = A / w.sqrt();
    let r1 = A * (1.0 - E2) / w.powf(1.5);
    let d = x / (n1 * K0);
    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    // Snyder eq. 8-17, 8-18
    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2 - 3.0 * c1 * c1) * d6
                    / 720.0);
    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1) * d4 * d / 120.0)
            / cos1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians). Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Albers Equal-Area Conic (Snyder 1987, pp. 98-103) ────────────────────

/// Authalic `q` (Snyder eq. 3-12)
fn authalic_q(phi: f64) -> f64 {
    let e = E2.sqrt();
    let s = phi.sin();
    (1.0 - E2) * (s / (1.0 - E2 * s * s) - (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln())
}

/// Snyder eq. 14-15
fn albers_m(phi: f64) -> f64 {
    let s = phi.sin();
    phi.cos() / (1.0 - E2 * s * s).sqrt()
}

/// Albers Equal-Area Conic projection on the WGS84 ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlbersEqualArea {
    lon0: f64,
    n: f64,
    c: f64,
    rho0: f64,
}

impl AlbersEqualArea {
    /// Build from standard parallels, latitude of origin and central meridian (degrees)
    pub fn new(lat1: f64, lat2: f64, lat0: f64, lon0: f64) -> Self {
        let (phi1, phi2, phi0) = (lat1.to_radians(), lat2.to_radians(), lat0.to_radians());
        let (m1, m2) = (albers_m(phi1), albers_m(phi2));
        let (q1, q2, q0) = (authalic_q(phi1), authalic_q(phi2), authalic_q(phi0));

        let n = if (phi1 - phi2).abs() < 1e-10 {
            phi1.sin()
        } else {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        };
        let c = m1 * m1 + n * q1;
        let rho0 = A * (c - n * q0).max(0.0).sqrt() / n;

        Self {
            lon0: lon0.to_radians(),
            n,
            c,
            rho0,
        }
    }

    /// Projection fitted to a lon/lat extent: standard parallels at 1/6 and
    /// 5/6 of the latitude span, origin and central meridian at its centre.
    ///
    /// Extents centred on the equator would make the cone degenerate, so
    /// their parallels are moved two degrees away from it.
    pub fn for_extent(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        let span = max_lat - min_lat;
        let mut lat1 = min_lat + span / 6.0;
        let mut lat2 = max_lat - span / 6.0;
        let lat0 = (min_lat + max_lat) / 2.0;
        let lon0 = (min_lon + max_lon) / 2.0;

        if (lat1 + lat2).abs() < 4.0 {
            let shift = if lat1 + lat2 >= 0.0 { 2.0 } else { -2.0 };
            lat1 += shift;
            lat2 += shift;
        }
        Self::new(lat1, lat2, lat0, lon0)
    }

    /// (lon, lat) degrees to (x, y) metres
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let q = authalic_q(lat.to_radians());
        let rho = A * (self.c - self.n * q).max(0.0).sqrt() / self.n;
        let theta = self.n * wrap_pi(lon.to_radians() - self.lon0);
        (rho * theta.sin(), self.rho0 - rho * theta.cos())
    }

    /// (x, y) metres back to (lon, lat) degrees
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let dy = self.rho0 - y;
        let sign = self.n.signum();
        let rho = x.hypot(dy) * sign;
        let theta = (x * sign).atan2(dy * sign);
        let q = (self.c - (rho * self.n / A).powi(2)) / self.n;

        let phi = inverse_authalic(q);
        let lon = self.lon0 + theta / self.n;
        (lon.to_degrees(), phi.to_degrees())
    }
}

/// Latitude for an authalic `q` by fixed-point iteration (Snyder eq. 3-16)
fn inverse_authalic(q: f64) -> f64 {
    let e = E2.sqrt();
    let mut phi = (q / 2.0).clamp(-1.0, 1.0).asin();
    for _ in 0..20 {
        let s = phi.sin();
        let one_minus = 1.0 - E2 * s * s;
        let delta = one_minus * one_minus / (2.0 * phi.cos())
            * (q / (1.0 - E2) - s / one_minus + (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln());
        phi += delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }
    phi
}

fn wrap_pi(angle: f64) -> f64 {
    use std::f64::consts::PI;
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

// ── Geometry transforms ──────────────────────────────────────────────────

/// Planar frame a CRS lives in
#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    Geographic,
    Utm { zone: u32, north: bool },
}

impl Frame {
    fn of(crs: &CRS) -> Option<Self> {
        if crs.is_geographic() {
            Some(Frame::Geographic)
        } else {
            crs.utm_zone().map(|(zone, north)| Frame::Utm { zone, north })
        }
    }

    fn to_lonlat(self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Frame::Geographic => c,
            Frame::Utm { zone, north } => {
                let (x, y) = utm_to_wgs84(c.x, c.y, zone, north);
                Coord { x, y }
            }
        }
    }

    fn from_lonlat(self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Frame::Geographic => c,
            Frame::Utm { zone, north } => {
                let (x, y) = wgs84_to_utm(c.x, c.y, zone, north);
                Coord { x, y }
            }
        }
    }
}

/// Reproject a geometry between two supported CRSs.
///
/// Supported: identical CRSs, and any pair of geographic and UTM CRSs.
/// Anything else is a [`Error::CrsMismatch`].
pub fn transform_geometry(geom: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
    if from.is_equivalent(to) {
        return Ok(geom.clone());
    }
    let mismatch = || Error::CrsMismatch(from.identifier(), to.identifier());
    let src = Frame::of(from).ok_or_else(mismatch)?;
    let dst = Frame::of(to).ok_or_else(mismatch)?;
    if src == dst {
        return Ok(geom.clone());
    }
    Ok(geom.map_coords(|c| dst.from_lonlat(src.to_lonlat(c))))
}

/// Round trip between a layer's CRS and a fitted equal-area plane
#[derive(Debug, Clone)]
pub struct EqualAreaFrame {
    source: Option<Frame>,
    albers: Option<AlbersEqualArea>,
}

impl EqualAreaFrame {
    /// Fit an Albers projection to the lon/lat extent of `geometries`.
    ///
    /// Projected CRSs other than UTM are assumed to be metric already and
    /// pass through unchanged.
    pub fn for_layer<'a, I>(crs: &CRS, geometries: I) -> Self
    where
        I: IntoIterator<Item = &'a Geometry<f64>>,
    {
        let Some(source) = Frame::of(crs) else {
            warn!("{} is not a supported geographic or UTM CRS; measuring areas in its own units", crs);
            return Self { source: None, albers: None };
        };

        let mut extent: Option<(f64, f64, f64, f64)> = None;
        for geom in geometries {
            let Some(rect) = geom.map_coords(|c| source.to_lonlat(c)).bounding_rect() else {
                continue;
            };
            let (lo, hi) = (rect.min(), rect.max());
            extent = Some(match extent {
                None => (lo.x, lo.y, hi.x, hi.y),
                Some((a, b, c, d)) => (a.min(lo.x), b.min(lo.y), c.max(hi.x), d.max(hi.y)),
            });
        }

        let albers = extent.map(|(x0, y0, x1, y1)| AlbersEqualArea::for_extent(x0, y0, x1, y1));
        debug!("equal-area frame for {}: {:?}", crs, albers);
        Self {
            source: Some(source),
            albers,
        }
    }

    /// Layer CRS to the equal-area plane
    pub fn forward(&self, geom: &Geometry<f64>) -> Geometry<f64> {
        match (self.source, self.albers) {
            (Some(src), Some(albers)) => geom.map_coords(|c| {
                let ll = src.to_lonlat(c);
                let (x, y) = albers.forward(ll.x, ll.y);
                Coord { x, y }
            }),
            _ => geom.clone(),
        }
    }

    /// Equal-area plane back to the layer CRS
    pub fn inverse(&self, geom: &Geometry<f64>) -> Geometry<f64> {
        match (self.source, self.albers) {
            (Some(src), Some(albers)) => geom.map_coords(|c| {
                let (x, y) = albers.inverse(c.x, c.y);
                src.from_lonlat(Coord { x, y })
            }),
            _ => geom.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Area, Polygon};

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(diff < tol, "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}");
    }

    // Reference values from PROJ: (-3.7037, 40.4168) → (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    #[test]
    fn buenos_aires_wgs84_to_utm21s() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        assert_close(e, 373_317.50, 1.0, "easting");
        assert_close(n, 6_170_036.17, 1.0, "northing");
    }

    #[test]
    fn utm_inverse_round_trip() {
        for &(lon, lat, zone, north) in &[
            (-3.7037, 40.4168, 30, true),
            (-58.3816, -34.6037, 21, false),
            (-46.63, -23.55, 23, false),
        ] {
            let (e, n) = wgs84_to_utm(lon, lat, zone, north);
            let (lon2, lat2) = utm_to_wgs84(e, n, zone, north);
            assert_close(lon2, lon, 1e-6, "longitude");
            assert_close(lat2, lat, 1e-6, "latitude");
        }
    }

    #[test]
    fn albers_round_trip() {
        let albers = AlbersEqualArea::for_extent(-47.0, -24.0, -46.0, -23.0);
        let (x, y) = albers.forward(-46.3, -23.7);
        let (lon, lat) = albers.inverse(x, y);
        assert_close(lon, -46.3, 1e-9, "longitude");
        assert_close(lat, -23.7, 1e-9, "latitude");
    }

    #[test]
    fn albers_preserves_area() {
        // Ellipsoidal area of a lon/lat quad: a²·Δλ·(q2 − q1) / 2
        let (lon0, lat0, d): (f64, f64, f64) = (-46.5, -23.5, 0.01);
        let expected = A * A * d.to_radians() * (authalic_q((lat0 + d).to_radians()) - authalic_q(lat0.to_radians())) / 2.0;

        let albers = AlbersEqualArea::for_extent(lon0, lat0, lon0 + d, lat0 + d);
        let quad = Polygon::new(
            vec![(lon0, lat0), (lon0 + d, lat0), (lon0 + d, lat0 + d), (lon0, lat0 + d), (lon0, lat0)]
                .into_iter()
                .map(|(lon, lat)| albers.forward(lon, lat))
                .collect::<Vec<_>>()
                .into(),
            vec![],
        );
        assert_relative_eq!(quad.unsigned_area(), expected.abs(), max_relative = 1e-4);
    }

    #[test]
    fn equatorial_extent_is_not_degenerate() {
        let albers = AlbersEqualArea::for_extent(-50.0, -0.5, -49.0, 0.5);
        let (x, y) = albers.forward(-49.5, 0.1);
        assert!(x.is_finite() && y.is_finite());
        let (lon, lat) = albers.inverse(x, y);
        assert_close(lon, -49.5, 1e-9, "longitude");
        assert_close(lat, 0.1, 1e-9, "latitude");
    }

    #[test]
    fn transform_geographic_to_utm_and_back() {
        let wgs84 = CRS::wgs84();
        let utm = CRS::from_epsg(31983);
        let point = Geometry::Point((-46.63, -23.55).into());

        let projected = transform_geometry(&point, &wgs84, &utm).unwrap();
        let Geometry::Point(p) = &projected else {
            panic!("expected a point");
        };
        assert!(p.x() > 100_000.0 && p.y() > 7_000_000.0);

        let back = transform_geometry(&projected, &utm, &wgs84).unwrap();
        let Geometry::Point(q) = back else {
            panic!("expected a point");
        };
        assert_close(q.x(), -46.63, 1e-6, "longitude");
        assert_close(q.y(), -23.55, 1e-6, "latitude");
    }

    #[test]
    fn unsupported_pair_is_mismatch() {
        let point = Geometry::Point((0.0, 0.0).into());
        let err = transform_geometry(&point, &CRS::from_epsg(3857), &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(..)));
        assert!(transform_geometry(&point, &CRS::from_epsg(3857), &CRS::from_epsg(3857)).is_ok());
    }

    #[test]
    fn equal_area_frame_round_trip() {
        let square: Geometry<f64> = Polygon::new(
            vec![(-46.0, -23.0), (-45.99, -23.0), (-45.99, -22.99), (-46.0, -22.99), (-46.0, -23.0)].into(),
            vec![],
        )
        .into();
        let frame = EqualAreaFrame::for_layer(&CRS::wgs84(), [&square]);
        let projected = frame.forward(&square);
        // Roughly 1.02 km × 1.11 km
        let area = projected.unsigned_area();
        assert!(area > 1.0e6 && area < 1.3e6, "area {}", area);

        let back = frame.inverse(&projected);
        let (Geometry::Polygon(a), Geometry::Polygon(b)) = (&square, &back) else {
            panic!("expected polygons");
        };
        for (p, q) in a.exterior().0.iter().zip(&b.exterior().0) {
            assert_close(p.x, q.x, 1e-9, "x");
            assert_close(p.y, q.y, 1e-9, "y");
        }
    }
}
