//! Passage en WGS84 des coordonnées d'ouvrages saisies en projection
//!
//! Les coniques conformes RGF93 (Lambert 93, CC42 à CC50) sont calculées
//! en Rust pur. Le feature `reproject` ajoute PROJ pour les autres EPSG.

mod lambert;
#[cfg(feature = "reproject")]
mod proj_backend;

pub use lambert::LambertConic;

use geo::Point;
use thiserror::Error;

/// EPSG des coordonnées géographiques en sortie
pub const WGS84: u32 = 4326;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("EPSG:{0} is not supported (built-in: 2154, 3942 to 3950; build with --features reproject for others)")]
    Unsupported(u32),

    #[error("({x}, {y}) is outside the projection domain")]
    OutOfDomain { x: f64, y: f64 },

    #[cfg(feature = "reproject")]
    #[error("PROJ: {0}")]
    Proj(String),
}

/// Conversion d'un EPSG source vers WGS84
pub enum Projection {
    /// Source déjà en WGS84
    Identity,
    Conic { epsg: u32, conic: LambertConic },
    #[cfg(feature = "reproject")]
    Proj { epsg: u32, transform: proj_backend::ProjTransform },
}

impl Projection {
    pub fn from_epsg(epsg: u32) -> Result<Self, ProjectionError> {
        if epsg == WGS84 {
            return Ok(Self::Identity);
        }
        if let Some(conic) = LambertConic::rgf93(epsg) {
            return Ok(Self::Conic { epsg, conic });
        }

        #[cfg(feature = "reproject")]
        {
            let transform = proj_backend::ProjTransform::new(epsg)?;
            Ok(Self::Proj { epsg, transform })
        }
        #[cfg(not(feature = "reproject"))]
        Err(ProjectionError::Unsupported(epsg))
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Self::Identity => WGS84,
            Self::Conic { epsg, .. } => *epsg,
            #[cfg(feature = "reproject")]
            Self::Proj { epsg, .. } => *epsg,
        }
    }

    /// `point` : x = easting, y = northing. Retourne (lon, lat) en degrés.
    pub fn to_wgs84(&self, point: Point) -> Result<Point, ProjectionError> {
        match self {
            Self::Identity => Ok(point),
            Self::Conic { conic, .. } => conic
                .inverse(point.x(), point.y())
                .ok_or(ProjectionError::OutOfDomain { x: point.x(), y: point.y() }),
            #[cfg(feature = "reproject")]
            Self::Proj { transform, .. } => transform.convert(point),
        }
    }

    /// Méthode de calcul, pour les diagnostics
    pub fn method(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Conic { .. } => "built-in Lambert conic",
            #[cfg(feature = "reproject")]
            Self::Proj { .. } => "PROJ",
        }
    }
}

impl std::fmt::Debug for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Projection(EPSG:{} via {})", self.epsg(), self.method())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let projection = Projection::from_epsg(4326).unwrap();
        assert_eq!(projection.method(), "identity");
        assert_eq!(projection.to_wgs84(Point::new(1.0, 45.0)).unwrap(), Point::new(1.0, 45.0));
    }

    #[test]
    fn test_cc45_site() {
        let projection = Projection::from_epsg(3945).unwrap();
        assert_eq!(projection.epsg(), 3945);
        let p = projection.to_wgs84(Point::new(1584900.0, 4217700.0)).unwrap();
        assert!((p.x() - 1.536).abs() < 0.01, "lon={}", p.x());
        assert!((p.y() - 45.15).abs() < 0.01, "lat={}", p.y());
    }

    #[test]
    fn test_lambert93_paris() {
        let projection = Projection::from_epsg(2154).unwrap();
        let p = projection.to_wgs84(Point::new(652381.0, 6862047.0)).unwrap();
        assert!((p.x() - 2.35).abs() < 0.1, "lon={}", p.x());
        assert!((p.y() - 48.85).abs() < 0.1, "lat={}", p.y());
    }

    #[cfg(not(feature = "reproject"))]
    #[test]
    fn test_unsupported_without_proj() {
        let err = Projection::from_epsg(27572).unwrap_err();
        assert!(matches!(err, ProjectionError::Unsupported(27572)));
        assert!(err.to_string().contains("--features reproject"));
    }
}
