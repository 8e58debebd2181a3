//! # carto-ouvrages
//!
//! Carte interactive des ouvrages d'eau et d'assainissement.
//!
//! ## Features
//!
//! - Contours communaux filtrés par la liste des communes éligibles
//! - Une couche Leaflet par type d'ouvrage, regroupement optionnel
//! - Reprojection des coordonnées Lambert (CC42 à CC50, Lambert-93)
//! - Vue initiale pilotable par l'URL (`?lat=&lon=&zoom=&layer=&exclusive=`)
//!
//! ## Usage CLI
//!
//! ```bash
//! # Carte par défaut dans app/static/global/ouvrages.html
//! carto-ouvrages --base-dir ./app
//!
//! # Couche STEP seule, centrée sur Brive
//! carto-ouvrages --base-dir ./app --layer STEP --exclusive --lat 45.16 --lon 1.53 --zoom 13
//!
//! # Diagnostic des données
//! carto-ouvrages inspect --base-dir ./app
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod icons;
pub mod layers;
pub mod map;
pub mod markers;
pub mod pipeline;
pub mod projection;
pub mod render;
pub mod report;
pub mod template;
pub mod viewstate;

pub use config::MapConfig;
pub use error::CartoError;
pub use pipeline::{build_map, generate_map, GenerateRequest, ViewParams};
pub use report::{GenerationReport, GenerationStatus};
