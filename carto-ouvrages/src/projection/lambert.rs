//! Coniques conformes sécantes de Lambert sur l'ellipsoïde GRS80 (RGF93)

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use geo::Point;

const GRS80_A: f64 = 6378137.0;
const GRS80_F: f64 = 1.0 / 298.257222101;
const GRS80_E2: f64 = GRS80_F * (2.0 - GRS80_F);

/// Longitude du méridien central des projections RGF93 (degrés)
const RGF93_LON0: f64 = 3.0;

/// Conique conforme sécante, constantes calculées une fois pour toutes.
///
/// `(xs, ys)` est la position projetée du sommet du cône.
#[derive(Debug, Clone, Copy)]
pub struct LambertConic {
    lon0: f64,
    e: f64,
    n: f64,
    c: f64,
    xs: f64,
    ys: f64,
}

impl LambertConic {
    /// Conique à deux parallèles standards, angles en degrés
    pub fn secant(lon0: f64, lat0: f64, lat1: f64, lat2: f64, x0: f64, y0: f64) -> Self {
        let e = GRS80_E2.sqrt();
        let (lat0, lat1, lat2) = (lat0.to_radians(), lat1.to_radians(), lat2.to_radians());

        let m1 = normal_radius(lat1) * lat1.cos();
        let m2 = normal_radius(lat2) * lat2.cos();
        let (l1, l2) = (isometric_latitude(lat1, e), isometric_latitude(lat2, e));

        let n = (m1 / m2).ln() / (l2 - l1);
        let c = m1 / n * (n * l1).exp();
        let r0 = c * (-n * isometric_latitude(lat0, e)).exp();

        Self {
            lon0: lon0.to_radians(),
            e,
            n,
            c,
            xs: x0,
            ys: y0 + r0,
        }
    }

    /// Lambert 93 (2154) et zones CC42 à CC50 (3942 à 3950)
    pub fn rgf93(epsg: u32) -> Option<Self> {
        match epsg {
            2154 => Some(Self::secant(RGF93_LON0, 46.5, 44.0, 49.0, 700_000.0, 6_600_000.0)),
            3942..=3950 => {
                let lat0 = f64::from(epsg - 3900);
                Some(Self::secant(
                    RGF93_LON0,
                    lat0,
                    lat0 - 0.75,
                    lat0 + 0.75,
                    1_700_000.0,
                    (lat0 - 41.0) * 1_000_000.0 + 200_000.0,
                ))
            }
            _ => None,
        }
    }

    /// (x, y) projetés vers (lon, lat) en degrés ; `None` hors du domaine
    pub fn inverse(&self, x: f64, y: f64) -> Option<Point> {
        let dx = x - self.xs;
        let dy = self.ys - y;
        let r = dx.hypot(dy).copysign(self.n);
        if r == 0.0 {
            return None;
        }

        let gamma = (dx / dy).atan();
        let iso = -(r / self.c).ln() / self.n;
        let lat = latitude_from_isometric(iso, self.e);
        let lon = self.lon0 + gamma / self.n;

        (lat.is_finite() && lon.is_finite()).then(|| Point::new(lon.to_degrees(), lat.to_degrees()))
    }
}

fn isometric_latitude(lat: f64, e: f64) -> f64 {
    let es = e * lat.sin();
    ((FRAC_PI_4 + lat / 2.0).tan() * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).ln()
}

/// Inverse de `isometric_latitude`, par point fixe
fn latitude_from_isometric(iso: f64, e: f64) -> f64 {
    let exp_iso = iso.exp();
    let mut lat = 2.0 * exp_iso.atan() - FRAC_PI_2;
    for _ in 0..12 {
        let es = e * lat.sin();
        let next = 2.0 * (exp_iso * ((1.0 + es) / (1.0 - es)).powf(e / 2.0)).atan() - FRAC_PI_2;
        if (next - lat).abs() < 1e-12 {
            return next;
        }
        lat = next;
    }
    lat
}

/// Rayon de courbure dans le premier vertical
fn normal_radius(lat: f64) -> f64 {
    GRS80_A / (1.0 - GRS80_E2 * lat.sin().powi(2)).sqrt()
}
