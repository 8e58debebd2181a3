//! Génération de la carte des ouvrages, du chargement à l'écriture
//!
//! Les erreurs de chargement (fichier absent, JSON invalide, forme
//! inattendue) et l'absence de l'icône par défaut interrompent la
//! génération. Le reste dégrade la carte sans l'empêcher.

use std::path::PathBuf;
use std::time::Instant;

use geo::Point;
use geodata::TypeRegistry;
use tracing::{debug, info, warn};

use crate::config::MapConfig;
use crate::error::CartoError;
use crate::icons::IconResolver;
use crate::layers::LayerRegistry;
use crate::map::LeafletMap;
use crate::markers::{CoordinatePolicy, MarkerPlacer};
use crate::render;
use crate::report::{GenerationReport, WarningKind};
use crate::projection::Projection;
use crate::viewstate::{render_script, InitialView};

/// Vue demandée par l'appelant ; chaque champ absent prend sa valeur par défaut
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewParams {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub zoom: Option<u8>,
    /// Type ou nom de couche à mettre en avant
    pub layer: Option<String>,
    pub exclusive: bool,
}

impl ViewParams {
    /// Vue initiale complétée par la configuration
    pub fn resolve(&self, config: &MapConfig) -> InitialView {
        InitialView {
            lat: self.lat.filter(|v| v.is_finite()).unwrap_or(config.center_lat),
            lon: self.lon.filter(|v| v.is_finite()).unwrap_or(config.center_lon),
            zoom: self.zoom.unwrap_or(config.zoom),
            layer: self.layer.clone().unwrap_or_default(),
            exclusive: self.exclusive,
        }
    }
}

/// Demande de génération
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub output: PathBuf,
    pub view: ViewParams,
}

/// Projection des coordonnées saisies, `None` si désactivée ou indisponible
pub fn build_projection(config: &MapConfig, report: &mut GenerationReport) -> Option<Projection> {
    let epsg = config.source_epsg?;
    match Projection::from_epsg(epsg) {
        Ok(projection) => {
            debug!(epsg, method = projection.method(), "Reprojection ready");
            Some(projection)
        }
        Err(e) => {
            warn!(epsg, error = %e, "Reprojection unavailable, projected coordinates will use placeholder");
            report.record_warning(WarningKind::Reprojection, &format!("EPSG:{}", epsg), e.to_string());
            None
        }
    }
}

/// Assemble la carte en mémoire sans l'écrire
pub fn build_map(
    config: &MapConfig,
    view: &ViewParams,
) -> Result<(LeafletMap, GenerationReport), CartoError> {
    let mut report = GenerationReport::new();
    let paths = config.dataset_paths();
    let datasets = geodata::load(&paths)?;
    let metadata = TypeRegistry::load(&paths.types)?;

    let initial = view.resolve(config);
    let mut map = LeafletMap::new(Point::new(initial.lon, initial.lat), initial.zoom);
    for tile in &config.base_layers {
        map.add_tile_layer(&tile.name, &tile.url, &tile.attribution);
    }

    let layers = LayerRegistry::build(&mut map, &metadata, &config.default_group, &config.default_icon);
    debug!(layers = layers.len(), "Layer registry built");

    let boundaries = datasets.boundary_features();
    map.add_geojson(
        &config.boundary_layer_name,
        datasets.boundaries.clone(),
        &config.boundary_color,
    );

    let projection = build_projection(config, &mut report);
    let mut icons = IconResolver::new(config.icon_dir(), &config.default_icon);
    let policy = CoordinatePolicy {
        max_valid_latitude: config.max_valid_latitude,
        placeholder: Point::new(config.placeholder_lon, config.placeholder_lat),
        projection: projection.as_ref(),
    };

    {
        let mut placer = MarkerPlacer::new(config, &metadata, &layers, &mut icons, policy);
        placer.place_town_halls(&mut map, &boundaries, &datasets.communes, &mut report)?;
        placer.place_sites(&mut map, &datasets.sites, &mut report)?;
    }

    map.enable_layer_control();

    match render_script(
        &map.var,
        &layers.overlay_bindings(&map),
        &metadata.type_to_group(),
        &initial,
    ) {
        Ok(script) => {
            map.add_script(script);
            report.view_state_injected = true;
        }
        Err(e) => {
            warn!(error = %e, "View state script not injected");
            report.record_warning(WarningKind::ViewState, &map.var, e.to_string());
        }
    }

    report.overlays = map.overlays().iter().map(|o| o.name.clone()).collect();
    report.excluded_communes = datasets.excluded_names;
    Ok((map, report))
}

/// Génère la carte et l'écrit dans `request.output`
pub fn generate_map(
    config: &MapConfig,
    request: &GenerateRequest,
) -> Result<GenerationReport, CartoError> {
    let start = Instant::now();
    let (map, mut report) = build_map(config, &request.view)?;

    let output = render::save(&map, &request.output)?;
    report.output = Some(output);
    report.set_duration(start.elapsed());
    report.finalize();

    info!(
        output = %request.output.display(),
        sites = report.site_markers,
        town_halls = report.town_hall_markers,
        overlays = report.overlays.len(),
        status = ?report.status,
        "Map generated"
    );
    Ok(report)
}
