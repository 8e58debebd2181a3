//! Types de données pour le crate geodata

use geo::Coord;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::normalize::normalize_label;

/// Identifiant d'un site : entier ou texte selon l'historique du fichier.
///
/// Toute autre valeur JSON (flottant, négatif, booléen...) est conservée
/// telle quelle : un INDEX inhabituel ne doit pas faire perdre l'ouvrage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteIndex {
    Number(u64),
    Text(String),
    Other(Value),
}

impl SiteIndex {
    /// Valeur entière positive si l'index en a une (`3.0` compte pour 3)
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Other(Value::Number(n)) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            Self::Other(_) => None,
        }
    }
}

/// Un ouvrage (station, poste de relevage, ...) de recap.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    #[serde(rename = "INDEX", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<SiteIndex>,

    #[serde(rename = "NOM", default, deserialize_with = "text")]
    pub nom: String,

    #[serde(rename = "COMMUNE", default, deserialize_with = "text")]
    pub commune: String,

    #[serde(rename = "TYPE", default, deserialize_with = "text")]
    pub type_label: String,

    /// Latitude brute (degrés décimaux ou coordonnée projetée)
    #[serde(rename = "LAT", default, deserialize_with = "opt_text")]
    pub lat: Option<String>,

    /// Longitude brute
    #[serde(rename = "LONG", default, deserialize_with = "opt_text")]
    pub long: Option<String>,

    #[serde(rename = "ETAT", default, deserialize_with = "text")]
    pub etat: String,

    #[serde(rename = "DOCUMENTATION", default, deserialize_with = "text")]
    pub documentation: String,

    /// Champs supplémentaires conservés tels quels
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Une commune de l'assainissement collectif (commune_asst_collectif.json)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommuneRecord {
    #[serde(rename = "COMMUNE", default, deserialize_with = "opt_text")]
    pub commune: Option<String>,

    #[serde(rename = "LAT_MAIRIE", default, deserialize_with = "opt_text")]
    pub lat_mairie: Option<String>,

    #[serde(rename = "LONG_MAIRIE", default, deserialize_with = "opt_text")]
    pub long_mairie: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entrée brute de type_site.json, avant coercition
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeMetadataRecord {
    #[serde(rename = "type", default, deserialize_with = "opt_text")]
    pub type_name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub group: Option<String>,
    #[serde(default)]
    pub enabled: Option<Value>,
    #[serde(default)]
    pub cluster: Option<Value>,
    #[serde(default)]
    pub scale: Option<Value>,
    #[serde(default)]
    pub show: Option<Value>,
}

/// Configuration d'affichage d'un type d'ouvrage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeMetadata {
    /// Libellé tel que saisi
    pub type_name: String,
    /// Nom du fichier d'icône
    pub icon: String,
    /// Nom de la couche d'affichage
    pub group: String,
    /// Type affiché sur la carte
    pub enabled: bool,
    /// Regroupement des marqueurs proches
    pub cluster: bool,
    /// Facteur appliqué à la taille d'icône de base
    pub scale: f64,
    /// Couche visible au chargement
    pub show: bool,
}

impl TypeMetadata {
    /// Clé de recherche (libellé normalisé)
    pub fn key(&self) -> String {
        normalize_label(&self.type_name)
    }

    /// Construit une entrée depuis un enregistrement brut.
    ///
    /// Retourne `None` si le type ou l'icône manque. `show_default`
    /// dépend de l'appelant.
    pub fn from_record(record: &TypeMetadataRecord, show_default: bool) -> Option<Self> {
        let type_name = record.type_name.as_deref().map(str::trim).unwrap_or("");
        let icon = record.icon.as_deref().map(str::trim).unwrap_or("");
        if type_name.is_empty() || icon.is_empty() {
            return None;
        }

        let group = match record.group.as_deref().map(str::trim) {
            Some(g) if !g.is_empty() => g.to_string(),
            _ => type_name.to_string(),
        };

        Some(Self {
            type_name: type_name.to_string(),
            icon: icon.to_string(),
            group,
            enabled: coerce_bool(record.enabled.as_ref(), true),
            cluster: coerce_bool(record.cluster.as_ref(), false),
            scale: coerce_scale(record.scale.as_ref()),
            show: coerce_bool(record.show.as_ref(), show_default),
        })
    }
}

/// Une commune de co.geojson
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    /// Valeur de `properties.nom`
    pub name: String,
    /// Géométrie GeoJSON (Polygon ou MultiPolygon attendu)
    pub geometry: Option<geojson::Geometry>,
}

impl BoundaryFeature {
    pub fn from_feature(feature: &geojson::Feature) -> Self {
        let name = feature
            .properties
            .as_ref()
            .and_then(|p| p.get("nom"))
            .map(value_to_text)
            .unwrap_or_default();
        Self {
            name,
            geometry: feature.geometry.clone(),
        }
    }

    /// Premier anneau du polygone (x = longitude, y = latitude)
    pub fn first_ring(&self) -> Option<Vec<Coord>> {
        let ring = match &self.geometry.as_ref()?.value {
            geojson::Value::Polygon(rings) => rings.first()?,
            geojson::Value::MultiPolygon(polys) => polys.first()?.first()?,
            _ => return None,
        };
        let coords: Vec<Coord> = ring
            .iter()
            .filter(|pos| pos.len() >= 2)
            .map(|pos| Coord {
                x: pos[0],
                y: pos[1],
            })
            .collect();
        if coords.is_empty() {
            None
        } else {
            Some(coords)
        }
    }
}

/// Représentation textuelle d'une valeur JSON scalaire
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(opt_text(deserializer)?.unwrap_or_default())
}

fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(value_to_text(&v)),
    })
}

/// Coercition booléenne tolérante (JSON bool, nombre, chaîne)
pub fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "oui" => true,
            "false" | "0" | "no" | "off" | "non" | "" => false,
            _ => default,
        },
        Some(_) => default,
    }
}

/// Échelle d'icône strictement positive, 1.0 sinon
pub fn coerce_scale(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => fast_float::parse(s.trim().replace(',', ".")).ok(),
        _ => None,
    };
    match parsed {
        Some(scale) if scale.is_finite() && scale > 0.0 => scale,
        _ => 1.0,
    }
}
