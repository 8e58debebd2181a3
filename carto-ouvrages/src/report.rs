//! Rapport de génération de carte
//!
//! Collecte ce qui a été placé, ignoré ou dégradé pendant une génération,
//! pour affichage console ou export JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use geodata::normalize_label;
use indexmap::IndexMap;
use serde::Serialize;

/// Statut global de la génération
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerationStatus {
    /// Carte produite sans dégradation
    Success,
    /// Carte produite avec des valeurs de repli
    Degraded,
}

/// Nature d'une dégradation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// Coordonnées remplacées par la position de repli
    PlaceholderCoordinates,
    /// Icône remplacée par l'icône par défaut
    IconFallback,
    /// Type absent du registre, couche par défaut utilisée
    UnknownType,
    /// Script d'état de vue non injecté
    ViewState,
    /// Reprojection indisponible
    Reprojection,
}

/// Avertissement rattaché à un élément de la carte
#[derive(Debug, Clone, Serialize)]
pub struct GenerationWarning {
    pub kind: WarningKind,
    /// Nom de l'ouvrage ou de la commune concernée
    pub subject: String,
    pub message: String,
}

/// Rapport complet de génération
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// Fichier HTML produit (absolu)
    pub output: Option<PathBuf>,
    pub duration_secs: f64,
    pub status: GenerationStatus,

    /// Ouvrages lus dans recap.json
    pub sites_total: usize,
    /// Marqueurs d'ouvrages posés
    pub site_markers: usize,
    /// Marqueurs de mairies posés
    pub town_hall_markers: usize,
    /// Ouvrages hors service masqués
    pub out_of_service: usize,
    /// Ouvrages d'un type désactivé
    pub disabled_skipped: usize,
    /// Ouvrages posés à la position de repli
    pub placeholder_sites: usize,
    /// Ouvrages reprojetés
    pub reprojected_sites: usize,
    /// Ouvrages posés dans la couche par défaut faute de type connu
    pub unknown_type_sites: usize,
    /// Marqueurs dont l'icône a été remplacée par l'icône par défaut
    pub icon_fallbacks: usize,
    /// Mairies positionnées au centroïde du contour
    pub centroid_town_halls: usize,

    /// Types désactivés rencontrés : clé normalisée → première orthographe
    /// rencontrée, dans l'ordre d'apparition
    pub skipped_types: IndexMap<String, String>,
    /// Types absents du registre, même forme
    pub unknown_types: IndexMap<String, String>,
    /// Contours écartés faute de commune éligible
    pub excluded_communes: Vec<String>,
    /// Couches créées, dans l'ordre de la carte
    pub overlays: Vec<String>,
    pub view_state_injected: bool,

    pub warnings: Vec<GenerationWarning>,
}

impl Default for GenerationReport {
    fn default() -> Self {
        Self {
            output: None,
            duration_secs: 0.0,
            status: GenerationStatus::Success,
            sites_total: 0,
            site_markers: 0,
            town_hall_markers: 0,
            out_of_service: 0,
            disabled_skipped: 0,
            placeholder_sites: 0,
            reprojected_sites: 0,
            unknown_type_sites: 0,
            icon_fallbacks: 0,
            centroid_town_halls: 0,
            skipped_types: IndexMap::new(),
            unknown_types: IndexMap::new(),
            excluded_communes: Vec::new(),
            overlays: Vec::new(),
            view_state_injected: false,
            warnings: Vec::new(),
        }
    }
}

impl GenerationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un avertissement
    pub fn record_warning(&mut self, kind: WarningKind, subject: &str, message: impl Into<String>) {
        self.warnings.push(GenerationWarning {
            kind,
            subject: subject.to_string(),
            message: message.into(),
        });
    }

    /// Enregistre un type désactivé ; vrai à la première occurrence de sa
    /// clé normalisée
    pub fn record_skipped_type(&mut self, label: &str) -> bool {
        self.disabled_skipped += 1;
        first_spelling(&mut self.skipped_types, label)
    }

    /// Enregistre un type inconnu ; vrai à la première occurrence de sa
    /// clé normalisée
    pub fn record_unknown_type(&mut self, label: &str) -> bool {
        self.unknown_type_sites += 1;
        first_spelling(&mut self.unknown_types, label)
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if self.warnings.is_empty() && self.unknown_types.is_empty() {
            GenerationStatus::Success
        } else {
            GenerationStatus::Degraded
        };
    }

    /// Nombre total de marqueurs
    pub fn total_markers(&self) -> usize {
        self.site_markers + self.town_hall_markers
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("MAP GENERATION REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        if let Some(output) = &self.output {
            println!("Output: {}", output.display());
        }

        println!("\n--- SUMMARY ---");
        println!(
            "Sites: {} read, {} placed, {} out of service, {} disabled type",
            self.sites_total, self.site_markers, self.out_of_service, self.disabled_skipped
        );
        println!(
            "Coordinates: {} reprojected, {} placeholder",
            self.reprojected_sites, self.placeholder_sites
        );
        println!(
            "Fallbacks: {} sites in default layer, {} default icons",
            self.unknown_type_sites, self.icon_fallbacks
        );
        println!(
            "Town halls: {} placed, {} at polygon centroid",
            self.town_hall_markers, self.centroid_town_halls
        );
        println!("View state script: {}", if self.view_state_injected { "yes" } else { "no" });

        if !self.overlays.is_empty() {
            println!("\n--- OVERLAYS ---");
            for name in &self.overlays {
                println!("  {}", name);
            }
        }

        if !self.skipped_types.is_empty() {
            println!("\n--- DISABLED TYPES ---");
            for label in self.skipped_types.values() {
                println!("  {}", label);
            }
        }

        if !self.unknown_types.is_empty() {
            println!("\n--- UNKNOWN TYPES ---");
            for label in self.unknown_types.values() {
                println!("  {}", label);
            }
        }

        if !self.excluded_communes.is_empty() {
            println!("\n--- EXCLUDED COMMUNES ({}) ---", self.excluded_communes.len());
            for name in self.excluded_communes.iter().take(10) {
                println!("  {}", name);
            }
            if self.excluded_communes.len() > 10 {
                println!("  ... and {} more", self.excluded_communes.len() - 10);
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(20) {
                println!("  {:?} [{}] {}", w.kind, w.subject, w.message);
            }
            if self.warnings.len() > 20 {
                println!("  ... and {} more", self.warnings.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{} site markers, {} town halls, {} overlays, {} warnings",
            self.site_markers,
            self.town_hall_markers,
            self.overlays.len(),
            self.warnings.len()
        )
    }
}

fn first_spelling(seen: &mut IndexMap<String, String>, label: &str) -> bool {
    let key = normalize_label(label);
    if seen.contains_key(&key) {
        return false;
    }
    seen.insert(key, label.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_default() {
        let report = GenerationReport::default();
        assert_eq!(report.status, GenerationStatus::Success);
        assert_eq!(report.total_markers(), 0);
        assert!(report.output.is_none());
    }

    #[test]
    fn test_skipped_types_logged_once() {
        let mut report = GenerationReport::new();
        assert!(report.record_skipped_type("Forage"));
        assert!(!report.record_skipped_type("Forage"));
        assert!(report.record_skipped_type("Bassin"));
        assert!(!report.record_skipped_type(" FORAGE"));

        assert_eq!(report.disabled_skipped, 4);
        assert_eq!(report.skipped_types.len(), 2);
    }

    #[test]
    fn test_finalize_degraded() {
        let mut report = GenerationReport::new();
        report.site_markers = 2;
        report.finalize();
        assert_eq!(report.status, GenerationStatus::Success);

        report.record_warning(WarningKind::IconFallback, "Pump1", "step.png not found");
        report.finalize();
        assert_eq!(report.status, GenerationStatus::Degraded);
    }

    #[test]
    fn test_unknown_type_degrades() {
        let mut report = GenerationReport::new();
        assert!(report.record_unknown_type("Bassin"));
        assert!(!report.record_unknown_type("Bassin"));
        assert!(report.record_unknown_type("Aérateur"));
        assert!(!report.record_unknown_type(" bassin "));
        assert_eq!(report.unknown_type_sites, 4);
        let first = report.unknown_types.first().map(|(key, label)| (key.as_str(), label.as_str()));
        assert_eq!(first, Some(("bassin", "Bassin")));
        report.finalize();
        assert_eq!(report.status, GenerationStatus::Degraded);
    }

    #[test]
    fn test_summary() {
        let mut report = GenerationReport::new();
        report.site_markers = 12;
        report.town_hall_markers = 3;
        report.overlays = vec!["Stations".into(), "Autres ouvrages".into()];

        let summary = report.summary();
        assert!(summary.contains("12 site markers"));
        assert!(summary.contains("2 overlays"));
    }

    #[test]
    fn test_save_to_file() {
        let path = std::env::temp_dir().join(format!("carto_report_{}.json", std::process::id()));
        let mut report = GenerationReport::new();
        report.record_skipped_type("Forage");
        report.save_to_file(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "Success");
        assert_eq!(value["skipped_types"]["forage"], "Forage");
        std::fs::remove_file(path).ok();
    }
}
