//! État de vue piloté par l'URL
//!
//! La page générée embarque un script qui lit `lat`, `lon`, `zoom`,
//! `layer` et `exclusive` dans la query string. [`ViewState::from_query`]
//! et [`plan_layer_activation`] reproduisent la même résolution côté Rust,
//! y compris la lecture des nombres par préfixe (`parseFloat`, `parseInt`).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use geodata::normalize_label;
use regex::Regex;
use serde::Serialize;
use tera::Context;

use crate::error::CartoError;
use crate::template::{self, VIEW_STATE};

static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("valid regex")
});
static INT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+").expect("valid regex"));

/// Nombre en tête de chaîne, comme `parseFloat` ; `None` si non fini
pub fn parse_float_prefix(value: &str) -> Option<f64> {
    let m = FLOAT_PREFIX.find(value.trim_start())?;
    m.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Entier en tête de chaîne, comme `parseInt(v, 10)`
pub fn parse_int_prefix(value: &str) -> Option<i64> {
    let m = INT_PREFIX.find(value.trim_start())?;
    // au-delà de i64, le zoom est de toute façon saturé
    m.as_str().parse::<i64>().ok().or(Some(i64::MAX))
}

/// Vue demandée à la génération, utilisée quand l'URL ne précise rien
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialView {
    pub lat: f64,
    pub lon: f64,
    pub zoom: u8,
    /// Type ou nom de couche à afficher (vide : aucune)
    pub layer: String,
    pub exclusive: bool,
}

/// Vue effective après lecture de la query string
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub lat: f64,
    pub lon: f64,
    pub zoom: u32,
    pub layer: Option<String>,
    pub exclusive: bool,
}

impl ViewState {
    /// Résout la vue depuis une query string (`?` initial accepté)
    pub fn from_query(query: &str, initial: &InitialView) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        let number = |key: &str| params.get(key).and_then(|v| parse_float_prefix(v));

        let (lat, lon) = match (number("lat"), number("lon")) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => (initial.lat, initial.lon),
        };
        let zoom = params
            .get("zoom")
            .and_then(|v| parse_int_prefix(v))
            .filter(|z| *z > 0)
            .map(|z| z.min(u32::MAX as i64) as u32)
            .unwrap_or(initial.zoom as u32);
        let layer = params
            .get("layer")
            .filter(|l| !l.is_empty())
            .cloned()
            .or_else(|| Some(initial.layer.clone()).filter(|l| !l.is_empty()));
        let exclusive = matches!(params.get("exclusive").map(String::as_str), Some("1") | Some("true"))
            || initial.exclusive;

        Self {
            lat,
            lon,
            zoom,
            layer,
            exclusive,
        }
    }
}

/// Changements de couches à appliquer pour une vue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerActivation {
    /// Couche à afficher
    pub show: String,
    /// Couches actives à masquer (mode exclusif)
    pub hide: Vec<String>,
}

/// Couche visée par `layer` : type normalisé → groupe, puis nom de couche
/// sans tenir compte de la casse.
///
/// `overlays` associe chaque nom de couche à son état affiché.
pub fn plan_layer_activation(
    view: &ViewState,
    type_to_group: &BTreeMap<String, String>,
    overlays: &BTreeMap<String, bool>,
) -> Option<LayerActivation> {
    let layer = view.layer.as_deref()?;
    let target = type_to_group
        .get(&normalize_label(layer))
        .filter(|group| overlays.contains_key(*group))
        .cloned()
        .or_else(|| {
            let wanted = layer.to_lowercase();
            overlays.keys().find(|name| name.to_lowercase() == wanted).cloned()
        })?;

    let hide = if view.exclusive {
        overlays
            .iter()
            .filter(|(name, active)| **active && **name != target)
            .map(|(name, _)| name.clone())
            .collect()
    } else {
        Vec::new()
    };
    Some(LayerActivation { show: target, hide })
}

/// Rend le script d'état de vue pour une carte
pub fn render_script(
    map_var: &str,
    overlay_bindings: &BTreeMap<String, String>,
    type_to_group: &BTreeMap<String, String>,
    initial: &InitialView,
) -> Result<String, CartoError> {
    if map_var.is_empty() || !map_var.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CartoError::Template(format!("invalid map variable '{}'", map_var)));
    }
    let mut context = Context::new();
    context.insert("map_var", map_var);
    context.insert("overlay_bindings", overlay_bindings);
    context.insert("type_to_group", type_to_group);
    context.insert("initial_config", initial);
    template::render(VIEW_STATE, &context)
}
