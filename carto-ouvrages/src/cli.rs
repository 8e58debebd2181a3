//! Définition et implémentation des commandes CLI
//!
//! - `generate` (défaut) : jeux de données → carte HTML
//! - `inspect` : diagnostic des jeux de données sans rendu
//! - `types` : contenu du registre des types

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use geodata::store::normalize_state;
use geodata::{normalize_label, TypeRegistry};
use tracing::info;

use crate::config::MapConfig;
use crate::markers::{CoordinatePolicy, StateFilter};
use crate::pipeline::{build_projection, generate_map, GenerateRequest, ViewParams};
use crate::report::GenerationReport;

/// Sortie par défaut, relative au répertoire courant
pub const DEFAULT_OUTPUT: &str = "app/static/global/ouvrages.html";

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the HTML map (default command)
    Generate(GenerateArgs),

    /// Load the datasets and print diagnostics without rendering
    Inspect(DatasetArgs),

    /// List the site type registry
    Types(DatasetArgs),
}

/// Emplacement des données et de la configuration
#[derive(Args, Debug, Clone, Default)]
pub struct DatasetArgs {
    /// Application directory containing data/ (défaut : env CARTO_BASE_DIR / .)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Path to a JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Icon directory (défaut : <base-dir>/data/icones)
    #[arg(long)]
    pub icon_dir: Option<PathBuf>,

    /// EPSG code of projected coordinates, or "none" to disable reprojection
    #[arg(long)]
    pub source_epsg: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub datasets: DatasetArgs,

    /// Output HTML file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub out: PathBuf,

    /// Initial center latitude
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Initial center longitude
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Initial zoom level
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Site type or layer name to display on load
    #[arg(long)]
    pub layer: Option<String>,

    /// Hide every other layer when --layer is set
    #[arg(long)]
    pub exclusive: bool,

    /// Write the generation report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            datasets: DatasetArgs::default(),
            out: PathBuf::from(DEFAULT_OUTPUT),
            lat: None,
            lon: None,
            zoom: None,
            layer: None,
            exclusive: false,
            report: None,
        }
    }
}

impl GenerateArgs {
    fn view(&self) -> ViewParams {
        ViewParams {
            lat: self.lat,
            lon: self.lon,
            zoom: self.zoom,
            layer: self.layer.clone().filter(|l| !l.trim().is_empty()),
            exclusive: self.exclusive,
        }
    }
}

/// Configuration : fichier (ou défauts), puis environnement, puis options CLI
pub fn load_config(args: &DatasetArgs) -> Result<MapConfig> {
    let mut config = match &args.config {
        Some(path) => MapConfig::load(path)?,
        None => MapConfig::default(),
    };
    config.apply_env();

    if let Some(dir) = &args.base_dir {
        config.base_dir = dir.clone();
    }
    if let Some(dir) = &args.icon_dir {
        config.icon_dir = Some(dir.clone());
    }
    if let Some(epsg) = &args.source_epsg {
        config.source_epsg = parse_epsg_flag(epsg)?;
    }
    Ok(config)
}

fn parse_epsg_flag(value: &str) -> Result<Option<u32>> {
    let value = value.trim();
    if matches!(value.to_ascii_lowercase().as_str(), "" | "none" | "off") {
        return Ok(None);
    }
    let code = value
        .strip_prefix("EPSG:")
        .or_else(|| value.strip_prefix("epsg:"))
        .unwrap_or(value);
    match code.parse::<u32>() {
        Ok(code) => Ok(Some(code)),
        Err(_) => bail!("Invalid EPSG code: {}", value),
    }
}

/// Exécute la commande generate
pub fn cmd_generate(args: &GenerateArgs) -> Result<()> {
    let config = load_config(&args.datasets)?;
    info!(
        base_dir = %config.base_dir.display(),
        output = %args.out.display(),
        source_epsg = ?config.source_epsg,
        "Starting map generation"
    );

    let request = GenerateRequest {
        output: args.out.clone(),
        view: args.view(),
    };
    let report = generate_map(&config, &request).context("Map generation failed")?;

    if let Some(path) = &args.report {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }
    if !report.warnings.is_empty() || !report.unknown_types.is_empty() {
        report.display();
    }

    info!("{}", report.summary());
    if let Some(output) = &report.output {
        println!("{}", output.display());
    }
    Ok(())
}

/// Exécute la commande inspect
pub fn cmd_inspect(args: &DatasetArgs) -> Result<()> {
    let config = load_config(args)?;
    let paths = config.dataset_paths();
    let datasets = geodata::load(&paths).context("Failed to load datasets")?;
    let registry = TypeRegistry::load(&paths.types).context("Failed to load type registry")?;

    let mut scratch = GenerationReport::new();
    let projection = build_projection(&config, &mut scratch);
    let policy = CoordinatePolicy {
        max_valid_latitude: config.max_valid_latitude,
        placeholder: geo::Point::new(config.placeholder_lon, config.placeholder_lat),
        projection: projection.as_ref(),
    };
    let states = StateFilter::new(&config.out_of_service_states);

    let mut out_of_service = 0;
    let mut odd_states = Vec::new();
    let mut placeholder_sites = Vec::new();
    // clé normalisée → première orthographe rencontrée
    let mut unknown = BTreeMap::new();
    let mut disabled = BTreeMap::new();
    for site in &datasets.sites {
        let state = normalize_state(Some(site.etat.as_str()), &config.site_states);
        if !state.eq_ignore_ascii_case(site.etat.trim()) {
            odd_states.push(format!("{} ({:?} -> {})", site.nom, site.etat, state));
        }
        if states.is_hidden(&site.etat) {
            out_of_service += 1;
            continue;
        }
        match registry.get(&site.type_label) {
            Some(meta) if !meta.enabled => {
                disabled
                    .entry(normalize_label(&site.type_label))
                    .or_insert_with(|| site.type_label.clone());
                continue;
            }
            Some(_) => {}
            None => {
                unknown
                    .entry(normalize_label(&site.type_label))
                    .or_insert_with(|| site.type_label.clone());
            }
        }
        if policy
            .resolve(site.lat.as_deref(), site.long.as_deref())
            .is_fallback()
        {
            placeholder_sites.push(site.nom.clone());
        }
    }

    println!("=== Datasets ===");
    println!("Base dir: {}", config.base_dir.display());
    println!("Boundaries kept: {}", datasets.boundaries.features.len());
    println!("Eligible communes: {}", datasets.eligible_names.len());
    println!("Sites: {} ({} out of service)", datasets.sites.len(), out_of_service);
    println!("Types: {}", registry.len());
    if let Some(projection) = &projection {
        println!("Reprojection: EPSG:{} ({})", projection.epsg(), projection.method());
    } else {
        println!("Reprojection: disabled");
    }

    print_list("Excluded communes", datasets.excluded_names.iter());
    print_list("Unknown types", unknown.values());
    print_list("Disabled types", disabled.values());
    print_list("Sites at placeholder", placeholder_sites.iter());
    print_list("Non-standard states", odd_states.iter());
    Ok(())
}

fn print_list<'a>(title: &str, items: impl ExactSizeIterator<Item = &'a String>) {
    if items.len() == 0 {
        return;
    }
    println!("\n--- {} ({}) ---", title, items.len());
    for item in items {
        println!("  {}", if item.is_empty() { "(empty)" } else { item.as_str() });
    }
}

/// Exécute la commande types
pub fn cmd_types(args: &DatasetArgs) -> Result<()> {
    let config = load_config(args)?;
    let path = config.dataset_paths().types;
    let registry = TypeRegistry::load(&path).context("Failed to load type registry")?;
    print_types(&registry, &path);
    Ok(())
}

fn print_types(registry: &TypeRegistry, path: &Path) {
    println!("=== {} ({} types) ===", path.display(), registry.len());
    println!(
        "{:<30} {:<25} {:<20} {:>7} {:>7} {:>5} {:>5}",
        "KEY", "GROUP", "ICON", "ENABLED", "CLUSTER", "SCALE", "SHOW"
    );
    for (key, meta) in registry.iter() {
        println!(
            "{:<30} {:<25} {:<20} {:>7} {:>7} {:>5.2} {:>5}",
            key, meta.group, meta.icon, meta.enabled, meta.cluster, meta.scale, meta.show
        );
    }
    let keys: BTreeSet<_> = registry.iter().map(|(k, _)| k.as_str()).collect();
    if !keys.contains(normalize_label("COMMUNE").as_str()) {
        println!("\nNo COMMUNE type: town halls use the default layer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg_flag() {
        assert_eq!(parse_epsg_flag("3945").unwrap(), Some(3945));
        assert_eq!(parse_epsg_flag("EPSG:2154").unwrap(), Some(2154));
        assert_eq!(parse_epsg_flag("none").unwrap(), None);
        assert_eq!(parse_epsg_flag("OFF").unwrap(), None);
        assert!(parse_epsg_flag("lambert").is_err());
    }

    #[test]
    fn test_load_config_overrides() {
        let args = DatasetArgs {
            base_dir: Some(PathBuf::from("/srv/carto")),
            config: None,
            icon_dir: Some(PathBuf::from("/srv/icons")),
            source_epsg: Some("none".into()),
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/srv/carto"));
        assert_eq!(config.icon_dir(), PathBuf::from("/srv/icons"));
        assert_eq!(config.source_epsg, None);
    }

    #[test]
    fn test_generate_view_params() {
        let args = GenerateArgs {
            lat: Some(45.2),
            layer: Some("  ".into()),
            exclusive: true,
            ..Default::default()
        };
        let view = args.view();
        assert_eq!(view.lat, Some(45.2));
        assert_eq!(view.layer, None);
        assert!(view.exclusive);
        assert_eq!(args.out, PathBuf::from(DEFAULT_OUTPUT));
    }
}
