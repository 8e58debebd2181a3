//! Configuration de la génération de carte

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geodata::DatasetPaths;
use serde::{Deserialize, Serialize};

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MapConfig {
    /// Dossier racine de l'application (contient `data/`)
    pub base_dir: PathBuf,

    /// Fichiers sources, si différents de la disposition standard
    pub boundaries_file: Option<PathBuf>,
    pub sites_file: Option<PathBuf>,
    pub communes_file: Option<PathBuf>,
    pub types_file: Option<PathBuf>,

    /// Dossier des icônes (défaut : `<base>/data/icones`)
    pub icon_dir: Option<PathBuf>,

    /// Centre et zoom par défaut
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,

    /// Position de repli pour les coordonnées inexploitables
    pub placeholder_lat: f64,
    pub placeholder_lon: f64,

    /// Icône utilisée quand celle d'un type est absente
    pub default_icon: String,

    /// Taille d'icône de base en pixels (par axe)
    pub base_icon_size: u32,

    /// Préfixe des liens de documentation des ouvrages
    pub documentation_url: String,

    /// EPSG des coordonnées projetées ; `None` désactive la reprojection
    pub source_epsg: Option<u32>,

    /// Au-delà, une latitude est considérée comme une coordonnée projetée
    pub max_valid_latitude: f64,

    /// Valeurs d'ETAT masquées sur la carte
    pub out_of_service_states: Vec<String>,

    /// États d'exploitation autorisés
    pub site_states: Vec<String>,

    /// Type dont l'icône et la couche servent aux mairies
    pub commune_type: String,

    /// Couche des ouvrages de type inconnu
    pub default_group: String,

    /// Couche des contours communaux
    pub boundary_layer_name: String,
    pub boundary_color: String,

    /// Fonds de carte
    pub base_layers: Vec<TileLayerConfig>,
}

/// Fond de carte tuilé
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TileLayerConfig {
    pub name: String,
    pub url: String,
    pub attribution: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            boundaries_file: None,
            sites_file: None,
            communes_file: None,
            types_file: None,
            icon_dir: None,
            center_lat: 45.148537,
            center_lon: 1.463,
            zoom: 10,
            placeholder_lat: 45.0,
            placeholder_lon: 1.0,
            default_icon: "compteur.png".into(),
            base_icon_size: 50,
            documentation_url: "https://karto.mine.nu/static/ouvrages/".into(),
            source_epsg: Some(3945),
            max_valid_latitude: 100.0,
            out_of_service_states: ["HS", "H.S", "HORS SERVICE", "HORS-SERVICE"]
                .into_iter()
                .map(String::from)
                .collect(),
            site_states: geodata::store::DEFAULT_SITE_STATES
                .into_iter()
                .map(String::from)
                .collect(),
            commune_type: "COMMUNE".into(),
            default_group: "Autres ouvrages".into(),
            boundary_layer_name: "SEABB".into(),
            boundary_color: "#228B22".into(),
            base_layers: vec![
                TileLayerConfig {
                    name: "OpenStreetMap".into(),
                    url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
                    attribution: "&copy; OpenStreetMap contributors".into(),
                },
                TileLayerConfig {
                    name: "Esri Satellite".into(),
                    url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}".into(),
                    attribution: "Esri".into(),
                },
            ],
        }
    }
}

impl MapConfig {
    /// Charge une configuration depuis un fichier JSON (champs absents = défauts)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Applique les variables d'environnement
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("CARTO_BASE_DIR") {
            self.base_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("CARTO_ICON_DIR") {
            self.icon_dir = Some(PathBuf::from(dir));
        }
        if let Ok(url) = std::env::var("CARTO_DOC_URL") {
            self.documentation_url = url;
        }
        if let Ok(epsg) = std::env::var("CARTO_SOURCE_EPSG") {
            self.source_epsg = parse_epsg(&epsg);
        }
    }

    /// Chemins des jeux de données
    pub fn dataset_paths(&self) -> DatasetPaths {
        let mut paths = DatasetPaths::from_base_dir(&self.base_dir);
        if let Some(p) = &self.boundaries_file {
            paths.boundaries = p.clone();
        }
        if let Some(p) = &self.sites_file {
            paths.sites = p.clone();
        }
        if let Some(p) = &self.communes_file {
            paths.communes = p.clone();
        }
        if let Some(p) = &self.types_file {
            paths.types = p.clone();
        }
        paths
    }

    /// Dossier des icônes
    pub fn icon_dir(&self) -> PathBuf {
        match &self.icon_dir {
            Some(dir) => dir.clone(),
            None => {
                let base = if self.base_dir.is_file() {
                    self.base_dir.parent().unwrap_or(&self.base_dir)
                } else {
                    &self.base_dir
                };
                base.join("data").join("icones")
            }
        }
    }
}

/// `none`, `off` ou vide désactivent la reprojection
fn parse_epsg(value: &str) -> Option<u32> {
    let value = value.trim();
    let value = value
        .strip_prefix("EPSG:")
        .or_else(|| value.strip_prefix("epsg:"))
        .unwrap_or(value);
    value.parse().ok()
}
