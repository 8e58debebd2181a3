//! # geodata
//!
//! Chargement typé des jeux de données de la cartographie des ouvrages
//! (eau potable / assainissement).
//!
//! ## Features
//!
//! - Contours communaux GeoJSON filtrés sur les communes éligibles
//! - Ouvrages, communes et types d'ouvrage en structures explicites
//! - Normalisation des libellés (accents, casse, ponctuation)
//! - Gestion des INDEX et écriture atomique de la liste des ouvrages
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geodata::{DatasetPaths, TypeRegistry};
//! use std::path::Path;
//!
//! let paths = DatasetPaths::from_base_dir(Path::new("app"));
//! let datasets = geodata::load(&paths)?;
//! let types = TypeRegistry::load(&paths.types)?;
//!
//! println!("{} communes écartées", datasets.excluded_names.len());
//! ```

pub mod datasets;
pub mod error;
pub mod metadata;
pub mod normalize;
pub mod store;
pub mod types;

pub use datasets::{load, read_json, DatasetPaths, GeoDatasets};
pub use error::GeodataError;
pub use metadata::TypeRegistry;
pub use normalize::normalize_label;
pub use types::{
    BoundaryFeature, CommuneRecord, SiteIndex, SiteRecord, TypeMetadata, TypeMetadataRecord,
};
