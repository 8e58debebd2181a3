//! Chargement des jeux de données (communes, ouvrages, éligibilité)

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection};
use serde_json::Value;
use tracing::{info, warn};

use crate::types::{value_to_text, BoundaryFeature, CommuneRecord, SiteRecord};
use crate::GeodataError;

/// Emplacement des quatre fichiers sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    /// Contours communaux (GeoJSON FeatureCollection)
    pub boundaries: PathBuf,
    /// Liste des ouvrages
    pub sites: PathBuf,
    /// Communes éligibles, avec position éventuelle de la mairie
    pub communes: PathBuf,
    /// Métadonnées des types d'ouvrage
    pub types: PathBuf,
}

impl DatasetPaths {
    /// Disposition standard sous `<base>/data/sites/`.
    ///
    /// Si `base` désigne un fichier, son dossier parent est utilisé.
    pub fn from_base_dir(base: &Path) -> Self {
        let base = if base.is_file() {
            base.parent().unwrap_or(base)
        } else {
            base
        };
        let dir = base.join("data").join("sites");
        Self {
            boundaries: dir.join("co.geojson"),
            sites: dir.join("recap.json"),
            communes: dir.join("commune_asst_collectif.json"),
            types: dir.join("type_site.json"),
        }
    }
}

/// Données chargées et filtrées, prêtes pour le rendu
#[derive(Debug, Clone)]
pub struct GeoDatasets {
    /// Contours restreints aux communes éligibles
    pub boundaries: FeatureCollection,
    /// Ouvrages
    pub sites: Vec<SiteRecord>,
    /// Enregistrements d'éligibilité
    pub communes: Vec<CommuneRecord>,
    /// Noms des communes éligibles
    pub eligible_names: Vec<String>,
    /// Noms des contours écartés (diagnostic)
    pub excluded_names: Vec<String>,
}

impl GeoDatasets {
    /// Contours typés, dans l'ordre du fichier
    pub fn boundary_features(&self) -> Vec<BoundaryFeature> {
        self.boundaries
            .features
            .iter()
            .map(BoundaryFeature::from_feature)
            .collect()
    }
}

/// Lit un fichier JSON en distinguant fichier absent et JSON malformé
pub fn read_json(path: &Path) -> Result<Value, GeodataError> {
    let content = std::fs::read_to_string(path).map_err(|e| GeodataError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| GeodataError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Charge et filtre les jeux de données.
///
/// Toute incohérence de forme au niveau racine est fatale ; les éléments
/// individuels illisibles sont ignorés avec un warning.
pub fn load(paths: &DatasetPaths) -> Result<GeoDatasets, GeodataError> {
    let geo = read_json(&paths.boundaries)?;
    let sites = read_json(&paths.sites)?;
    let communes = read_json(&paths.communes)?;

    let sites: Vec<SiteRecord> = parse_records(&paths.sites, sites)?;
    let communes: Vec<CommuneRecord> = parse_records(&paths.communes, communes)?;
    let collection = parse_feature_collection(&paths.boundaries, geo)?;

    let eligible_names = extract_commune_names(&communes);
    let (boundaries, excluded_names) = filter_features_by_communes(collection, &eligible_names);

    info!(
        boundaries = boundaries.features.len(),
        excluded = excluded_names.len(),
        sites = sites.len(),
        communes = communes.len(),
        "Datasets loaded"
    );

    Ok(GeoDatasets {
        boundaries,
        sites,
        communes,
        eligible_names,
        excluded_names,
    })
}

/// Charge uniquement la liste des ouvrages
pub fn load_sites(path: &Path) -> Result<Vec<SiteRecord>, GeodataError> {
    parse_records(path, read_json(path)?)
}

fn parse_records<T: serde::de::DeserializeOwned>(
    path: &Path,
    value: Value,
) -> Result<Vec<T>, GeodataError> {
    let Value::Array(items) = value else {
        return Err(GeodataError::invalid_shape(path, "a JSON array of objects"));
    };

    let mut records = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            warn!(path = %path.display(), position, "Skipping non-object entry");
            continue;
        }
        match serde_json::from_value(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), position, error = %e, "Skipping unreadable entry"),
        }
    }
    Ok(records)
}

fn parse_feature_collection(path: &Path, value: Value) -> Result<FeatureCollection, GeodataError> {
    let Value::Object(mut object) = value else {
        return Err(GeodataError::invalid_shape(path, "a GeoJSON object"));
    };
    let Some(Value::Array(raw_features)) = object.remove("features") else {
        return Err(GeodataError::invalid_shape(path, "an object with a 'features' array"));
    };

    let mut features = Vec::with_capacity(raw_features.len());
    for (position, raw) in raw_features.into_iter().enumerate() {
        if !raw.is_object() {
            continue;
        }
        match serde_json::from_value::<Feature>(raw) {
            Ok(feature) => features.push(feature),
            Err(e) => warn!(path = %path.display(), position, error = %e, "Skipping invalid feature"),
        }
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Noms de commune non vides, dans l'ordre du fichier
pub fn extract_commune_names(records: &[CommuneRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.commune.as_deref())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Conserve les contours dont `properties.nom` figure dans `communes`.
///
/// Retourne la collection filtrée et les noms écartés.
pub fn filter_features_by_communes(
    collection: FeatureCollection,
    communes: &[String],
) -> (FeatureCollection, Vec<String>) {
    let allowed: HashSet<&str> = communes
        .iter()
        .map(String::as_str)
        .filter(|n| !n.is_empty())
        .collect();

    let mut kept = Vec::new();
    let mut removed = Vec::new();
    for feature in collection.features {
        let name = feature
            .properties
            .as_ref()
            .and_then(|p| p.get("nom"))
            .map(value_to_text)
            .unwrap_or_default();
        if allowed.contains(name.as_str()) {
            kept.push(feature);
        } else {
            removed.push(name);
        }
    }

    (
        FeatureCollection {
            features: kept,
            ..collection
        },
        removed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(names: &[&str]) -> FeatureCollection {
        let features: Vec<Value> = names
            .iter()
            .map(|n| {
                json!({
                    "type": "Feature",
                    "properties": {"nom": n},
                    "geometry": {"type": "Polygon", "coordinates": [[[1.0, 45.0], [1.1, 45.0], [1.1, 45.1]]]}
                })
            })
            .collect();
        parse_feature_collection(
            Path::new("co.geojson"),
            json!({"type": "FeatureCollection", "features": features}),
        )
        .unwrap()
    }

    #[test]
    fn test_filter_features() {
        let (kept, removed) = filter_features_by_communes(
            collection(&["Alpha", "Beta", "Gamma"]),
            &["Alpha".to_string(), "Gamma".to_string()],
        );
        assert_eq!(kept.features.len(), 2);
        assert_eq!(removed, vec!["Beta".to_string()]);
    }

    #[test]
    fn test_filter_is_exact_match() {
        let (kept, removed) =
            filter_features_by_communes(collection(&["alpha"]), &["Alpha".to_string()]);
        assert!(kept.features.is_empty());
        assert_eq!(removed, vec!["alpha".to_string()]);
    }

    #[test]
    fn test_feature_collection_shape() {
        let err = parse_feature_collection(Path::new("co.geojson"), json!([])).unwrap_err();
        assert!(matches!(err, GeodataError::InvalidShape { .. }));

        let err = parse_feature_collection(Path::new("co.geojson"), json!({"features": {}}))
            .unwrap_err();
        assert!(matches!(err, GeodataError::InvalidShape { .. }));
    }

    #[test]
    fn test_parse_records_skips_non_objects() {
        let sites: Vec<SiteRecord> = parse_records(
            Path::new("recap.json"),
            json!([{"NOM": "A"}, 3, null, {"NOM": "B"}]),
        )
        .unwrap();
        assert_eq!(sites.len(), 2);

        let err = parse_records::<SiteRecord>(Path::new("recap.json"), json!({"NOM": "A"}))
            .unwrap_err();
        assert!(matches!(err, GeodataError::InvalidShape { .. }));
    }

    #[test]
    fn test_extract_commune_names() {
        let records: Vec<CommuneRecord> = serde_json::from_value(json!([
            {"COMMUNE": "Alpha"},
            {"COMMUNE": ""},
            {"AUTRE": 1},
            {"COMMUNE": "Beta"}
        ]))
        .unwrap();
        assert_eq!(extract_commune_names(&records), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_paths_from_base_dir() {
        let paths = DatasetPaths::from_base_dir(Path::new("/srv/app"));
        assert_eq!(paths.sites, Path::new("/srv/app/data/sites/recap.json"));
        assert_eq!(
            paths.boundaries,
            Path::new("/srv/app/data/sites/co.geojson")
        );
    }
}
