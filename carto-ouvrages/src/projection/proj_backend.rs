//! Conversion via PROJ pour les EPSG sans implémentation intégrée

use geo::Point;
use proj::Proj;

use super::{ProjectionError, WGS84};

pub struct ProjTransform {
    proj: Proj,
}

impl ProjTransform {
    pub fn new(source_epsg: u32) -> Result<Self, ProjectionError> {
        let proj = Proj::new_known_crs(
            &format!("EPSG:{}", source_epsg),
            &format!("EPSG:{}", WGS84),
            None,
        )
        .map_err(|e| ProjectionError::Proj(format!("EPSG:{}: {}", source_epsg, e)))?;
        Ok(Self { proj })
    }

    pub fn convert(&self, point: Point) -> Result<Point, ProjectionError> {
        let (lon, lat) = self
            .proj
            .convert((point.x(), point.y()))
            .map_err(|e| ProjectionError::Proj(e.to_string()))?;
        Ok(Point::new(lon, lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_builtin_conic() {
        let transform = ProjTransform::new(3945).unwrap();
        let p = transform.convert(Point::new(1700000.0, 4200000.0)).unwrap();
        assert!((p.x() - 3.0).abs() < 1e-6, "lon={}", p.x());
        assert!((p.y() - 45.0).abs() < 1e-6, "lat={}", p.y());
    }

    #[test]
    fn test_unknown_epsg() {
        assert!(ProjTransform::new(99999).is_err());
    }
}
