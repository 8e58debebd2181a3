//! Placement des marqueurs : mairies et ouvrages
//!
//! Un enregistrement défectueux ne fait jamais échouer la génération :
//! coordonnées, couche et icône ont chacune une valeur de repli. Seule
//! l'absence de l'icône par défaut remonte une erreur.

use std::collections::HashSet;
use std::sync::LazyLock;

use geo::{Coord, Point};
use geodata::{BoundaryFeature, CommuneRecord, SiteRecord, TypeRegistry};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::MapConfig;
use crate::error::CartoError;
use crate::icons::{icon_size, IconResolution, IconResolver};
use crate::layers::LayerRegistry;
use crate::map::{CustomIcon, LeafletMap, Popup};
use crate::report::{GenerationReport, WarningKind};
use crate::projection::Projection;

static STATE_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\W_]+").expect("valid regex"));

/// Lit une coordonnée texte (virgule décimale acceptée)
pub fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    let value = raw?.trim().replace(',', ".");
    if value.is_empty() {
        return None;
    }
    fast_float::parse::<f64, _>(&value)
        .ok()
        .filter(|v| v.is_finite())
}

/// Pourquoi la position de repli a été utilisée
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// LAT ou LONG absente ou illisible
    Unparsable,
    /// Latitude hors bornes et aucune reprojection configurée
    TransformUnavailable,
    /// La reprojection a échoué
    TransformFailed(String),
}

impl FallbackReason {
    fn label(&self) -> &'static str {
        match self {
            Self::Unparsable => "unparsable",
            Self::TransformUnavailable => "transform unavailable",
            Self::TransformFailed(_) => "transform failed",
        }
    }
}

/// Position résolue d'un ouvrage (x = longitude, y = latitude)
#[derive(Debug, Clone, PartialEq)]
pub enum Coordinates {
    /// Degrés décimaux lus tels quels
    Parsed(Point),
    /// Coordonnées projetées converties en WGS84
    Reprojected(Point),
    /// Position de repli
    Fallback { point: Point, reason: FallbackReason },
}

impl Coordinates {
    pub fn point(&self) -> Point {
        match self {
            Self::Parsed(p) | Self::Reprojected(p) | Self::Fallback { point: p, .. } => *p,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Règles de résolution des coordonnées d'ouvrage
pub struct CoordinatePolicy<'a> {
    /// Au-delà, la latitude est traitée comme une valeur projetée
    pub max_valid_latitude: f64,
    pub placeholder: Point,
    pub projection: Option<&'a Projection>,
}

impl CoordinatePolicy<'_> {
    /// Résout LAT/LONG.
    ///
    /// La reprojection reçoit LONG comme x et LAT comme y.
    pub fn resolve(&self, lat_raw: Option<&str>, lon_raw: Option<&str>) -> Coordinates {
        let (Some(lat), Some(lon)) = (parse_coordinate(lat_raw), parse_coordinate(lon_raw)) else {
            return self.fallback(FallbackReason::Unparsable);
        };
        if lat <= self.max_valid_latitude {
            return Coordinates::Parsed(Point::new(lon, lat));
        }

        let Some(projection) = self.projection else {
            return self.fallback(FallbackReason::TransformUnavailable);
        };
        match projection.to_wgs84(Point::new(lon, lat)) {
            Ok(point) if is_wgs84(point) => Coordinates::Reprojected(point),
            Ok(point) => self.fallback(FallbackReason::TransformFailed(format!(
                "result ({}, {}) outside WGS84 bounds",
                point.x(),
                point.y()
            ))),
            Err(e) => self.fallback(FallbackReason::TransformFailed(e.to_string())),
        }
    }

    fn fallback(&self, reason: FallbackReason) -> Coordinates {
        Coordinates::Fallback {
            point: self.placeholder,
            reason,
        }
    }
}

fn is_wgs84(point: Point) -> bool {
    (-180.0..=180.0).contains(&point.x()) && (-90.0..=90.0).contains(&point.y())
}

/// Filtre des ouvrages hors service.
///
/// La comparaison ignore la casse, la ponctuation et les espaces.
#[derive(Debug, Clone)]
pub struct StateFilter {
    hidden: HashSet<String>,
}

impl StateFilter {
    pub fn new<S: AsRef<str>>(states: &[S]) -> Self {
        let hidden = states
            .iter()
            .map(|s| canonical_state(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        Self { hidden }
    }

    pub fn is_hidden(&self, etat: &str) -> bool {
        self.hidden.contains(&canonical_state(etat))
    }
}

fn canonical_state(etat: &str) -> String {
    STATE_PUNCTUATION.replace_all(etat, "").to_uppercase()
}

/// Position d'une mairie (x = longitude, y = latitude)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TownHallLocation {
    /// Coordonnées LAT_MAIRIE/LONG_MAIRIE
    Mairie(Point),
    /// Centroïde du premier anneau du contour
    Centroid(Point),
    Placeholder(Point),
}

impl TownHallLocation {
    pub fn point(&self) -> Point {
        match self {
            Self::Mairie(p) | Self::Centroid(p) | Self::Placeholder(p) => *p,
        }
    }
}

/// Moyenne non pondérée des sommets
pub fn ring_centroid(ring: &[Coord]) -> Option<Point> {
    if ring.is_empty() {
        return None;
    }
    let n = ring.len() as f64;
    let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
    let (x, y) = (sx / n, sy / n);
    (x.is_finite() && y.is_finite()).then(|| Point::new(x, y))
}

/// Localise la mairie d'une commune : fichier des communes, puis contour
pub fn locate_town_hall(
    boundary: &BoundaryFeature,
    communes: &[CommuneRecord],
    placeholder: Point,
) -> TownHallLocation {
    let mairie = communes
        .iter()
        .find(|c| c.commune.as_deref() == Some(boundary.name.as_str()))
        .and_then(|c| {
            let lat = parse_coordinate(c.lat_mairie.as_deref())?;
            let lon = parse_coordinate(c.long_mairie.as_deref())?;
            Some(Point::new(lon, lat))
        });
    if let Some(point) = mairie {
        return TownHallLocation::Mairie(point);
    }

    match boundary.first_ring().as_deref().and_then(ring_centroid) {
        Some(point) => TownHallLocation::Centroid(point),
        None => TownHallLocation::Placeholder(placeholder),
    }
}

/// Échappe un texte pour l'insérer dans du HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Lien d'itinéraire Google Maps vers un point
pub fn directions_link(point: Point) -> String {
    let (lat, lon) = (point.y(), point.x());
    format!("https://www.google.com/maps/dir//{lat:?},{lon:?}/@{lat:?},{lon:?},17z")
}

/// Bulle d'une mairie
pub fn town_hall_popup(name: &str, location: Point) -> Popup {
    Popup {
        html: format!(
            "<h2>Mairie de {}</h2><br><p><code><a href=\"{}\" target=\"_blank\">Lien</a></code></p>",
            escape_html(name),
            directions_link(location)
        ),
        width: 400,
        height: 200,
    }
}

/// Bulle d'un ouvrage, avec lien de documentation si renseigné
pub fn site_popup(site: &SiteRecord, location: Point, documentation_url: &str) -> Popup {
    let documentation = site.documentation.trim();
    let footer = if documentation.is_empty() {
        "<br></code></p>".to_string()
    } else {
        format!(
            "<br><a href=\"{}{}\" target=\"_blank\">documentation</a><br></code></p>",
            escape_html(documentation_url),
            escape_html(documentation)
        )
    };
    Popup {
        html: format!(
            "<h3> Ouvrage: {} / {} {}</h3><br><p><code><a href=\"{}\" target=\"_blank\">Vers...</a><br>{}",
            escape_html(&site.nom),
            escape_html(&site.commune),
            escape_html(&site.type_label),
            directions_link(location),
            footer
        ),
        width: 300,
        height: 200,
    }
}

/// Pose les marqueurs sur la carte.
///
/// Types désactivés, types inconnus et icônes manquantes ne sont signalés
/// qu'une fois chacun.
pub struct MarkerPlacer<'a> {
    config: &'a MapConfig,
    layers: &'a LayerRegistry,
    icons: &'a mut IconResolver,
    policy: CoordinatePolicy<'a>,
    states: StateFilter,
    disabled: HashSet<String>,
    logged_icons: HashSet<String>,
}

impl<'a> MarkerPlacer<'a> {
    pub fn new(
        config: &'a MapConfig,
        metadata: &TypeRegistry,
        layers: &'a LayerRegistry,
        icons: &'a mut IconResolver,
        policy: CoordinatePolicy<'a>,
    ) -> Self {
        Self {
            config,
            layers,
            icons,
            policy,
            states: StateFilter::new(&config.out_of_service_states),
            disabled: metadata.disabled_keys().cloned().collect(),
            logged_icons: HashSet::new(),
        }
    }

    /// Un marqueur par contour communal retenu
    pub fn place_town_halls(
        &mut self,
        map: &mut LeafletMap,
        boundaries: &[BoundaryFeature],
        communes: &[CommuneRecord],
        report: &mut GenerationReport,
    ) -> Result<usize, CartoError> {
        let (config, layers) = (self.config, self.layers);
        let entry = layers
            .get(&config.commune_type)
            .unwrap_or_else(|| layers.default_entry());
        let icon = self.icon(&entry.meta.icon, entry.meta.scale, &config.commune_type, report)?;
        let placeholder = self.policy.placeholder;

        for boundary in boundaries {
            let location = locate_town_hall(boundary, communes, placeholder);
            match location {
                TownHallLocation::Mairie(_) => {}
                TownHallLocation::Centroid(_) => {
                    debug!(commune = %boundary.name, "No mairie coordinates, using polygon centroid");
                    report.centroid_town_halls += 1;
                }
                TownHallLocation::Placeholder(_) => {
                    warn!(commune = %boundary.name, "No usable geometry, town hall placed at placeholder");
                    report.record_warning(
                        WarningKind::PlaceholderCoordinates,
                        &boundary.name,
                        "town hall placed at placeholder",
                    );
                }
            }
            let point = location.point();
            map.add_marker(
                entry.target,
                point,
                town_hall_popup(&boundary.name, point),
                icon.clone(),
            );
            report.town_hall_markers += 1;
        }
        Ok(report.town_hall_markers)
    }

    /// Un marqueur par ouvrage en service d'un type actif
    pub fn place_sites(
        &mut self,
        map: &mut LeafletMap,
        sites: &[SiteRecord],
        report: &mut GenerationReport,
    ) -> Result<usize, CartoError> {
        let (config, layers) = (self.config, self.layers);
        report.sites_total += sites.len();

        for site in sites {
            if self.states.is_hidden(&site.etat) {
                report.out_of_service += 1;
                continue;
            }

            let key = geodata::normalize_label(&site.type_label);
            if self.disabled.contains(&key) {
                if report.record_skipped_type(&site.type_label) {
                    warn!(site_type = %site.type_label, "Disabled type skipped");
                }
                continue;
            }

            let coordinates = self.policy.resolve(site.lat.as_deref(), site.long.as_deref());
            match &coordinates {
                Coordinates::Parsed(_) => {}
                Coordinates::Reprojected(_) => report.reprojected_sites += 1,
                Coordinates::Fallback { reason, .. } => {
                    debug!(site = %site.nom, reason = reason.label(), "Invalid coordinates, using placeholder");
                    report.placeholder_sites += 1;
                    let message = match reason {
                        FallbackReason::TransformFailed(e) => format!("placeholder coordinates: {}", e),
                        other => format!("placeholder coordinates: {}", other.label()),
                    };
                    report.record_warning(WarningKind::PlaceholderCoordinates, &site.nom, message);
                }
            }

            let entry = layers.resolve(&site.type_label);
            if layers.is_default(entry) && report.record_unknown_type(&site.type_label) {
                warn!(site_type = %site.type_label, group = %entry.meta.group, "Type not configured, using default group");
                report.record_warning(
                    WarningKind::UnknownType,
                    &site.nom,
                    format!("type '{}' not configured, placed in '{}'", site.type_label, entry.meta.group),
                );
            }

            let point = coordinates.point();
            let icon = self.icon(&entry.meta.icon, entry.meta.scale, &site.nom, report)?;
            let popup = site_popup(site, point, &config.documentation_url);
            map.add_marker(entry.target, point, popup, icon);
            report.site_markers += 1;
        }
        Ok(report.site_markers)
    }

    fn icon(
        &mut self,
        name: &str,
        scale: f64,
        subject: &str,
        report: &mut GenerationReport,
    ) -> Result<CustomIcon, CartoError> {
        let resolution = self.icons.icon_path(name)?;
        if let IconResolution::Fallback { requested, .. } = &resolution {
            report.icon_fallbacks += 1;
            if self.logged_icons.insert(requested.clone()) {
                report.record_warning(
                    WarningKind::IconFallback,
                    subject,
                    format!("{} not found, default icon used", requested),
                );
            }
        }
        Ok(CustomIcon {
            url: self.icons.data_uri(resolution.path())?,
            size: icon_size(scale, self.config.base_icon_size),
        })
    }
}
