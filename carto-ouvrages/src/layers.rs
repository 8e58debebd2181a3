//! Registre des couches de la carte
//!
//! Associe chaque type d'ouvrage actif à son groupe Leaflet et à la couche
//! qui reçoit réellement ses marqueurs.

use std::collections::BTreeMap;

use geodata::{normalize_label, TypeMetadata, TypeRegistry};
use indexmap::IndexMap;

use crate::map::{LeafletMap, MarkerTarget, OverlayId};

/// Type d'ouvrage relié à sa couche
#[derive(Debug, Clone)]
pub struct LayerEntry {
    pub meta: TypeMetadata,
    pub overlay: OverlayId,
    pub target: MarkerTarget,
}

/// Couches actives indexées par clé normalisée, plus la couche par défaut
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    entries: IndexMap<String, LayerEntry>,
    default_entry: LayerEntry,
}

impl LayerRegistry {
    /// Crée une couche par type actif, puis la couche par défaut.
    ///
    /// La couche par défaut est masquée au chargement et n'est jamais
    /// regroupée. Elle n'est pas indexée sous une clé normalisée.
    pub fn build(
        map: &mut LeafletMap,
        metadata: &TypeRegistry,
        default_group: &str,
        default_icon: &str,
    ) -> Self {
        let mut entries = IndexMap::new();
        for (key, meta) in metadata.iter().filter(|(_, meta)| meta.enabled) {
            let overlay = map.add_overlay(&meta.group, meta.show);
            let target = if meta.cluster {
                map.add_cluster(overlay)
            } else {
                MarkerTarget::Group(overlay)
            };
            entries.insert(
                key.clone(),
                LayerEntry {
                    meta: meta.clone(),
                    overlay,
                    target,
                },
            );
        }

        let default_meta = TypeMetadata {
            type_name: default_group.to_string(),
            icon: default_icon.to_string(),
            group: default_group.to_string(),
            enabled: true,
            cluster: false,
            scale: 1.0,
            show: false,
        };
        let overlay = map.add_overlay(&default_meta.group, false);
        let default_entry = LayerEntry {
            meta: default_meta,
            overlay,
            target: MarkerTarget::Group(overlay),
        };

        Self {
            entries,
            default_entry,
        }
    }

    /// Couche d'un type actif, par libellé libre
    pub fn get(&self, label: &str) -> Option<&LayerEntry> {
        self.entries.get(&normalize_label(label))
    }

    /// Couche d'un libellé, couche par défaut si le type est inconnu
    pub fn resolve(&self, label: &str) -> &LayerEntry {
        self.get(label).unwrap_or(&self.default_entry)
    }

    /// Vrai si `entry` est la couche par défaut
    pub fn is_default(&self, entry: &LayerEntry) -> bool {
        entry.overlay == self.default_entry.overlay
    }

    pub fn default_entry(&self) -> &LayerEntry {
        &self.default_entry
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &LayerEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nom affiché → variable JS du groupe, pour le script d'état de vue.
    ///
    /// Plusieurs types peuvent partager un groupe : le dernier l'emporte.
    pub fn overlay_bindings(&self, map: &LeafletMap) -> BTreeMap<String, String> {
        let mut bindings = BTreeMap::new();
        for entry in self.entries.values().chain(std::iter::once(&self.default_entry)) {
            let overlay = map.overlay(entry.overlay);
            bindings.insert(overlay.name.clone(), overlay.var.clone());
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use serde_json::json;
    use std::path::Path;

    fn registry() -> TypeRegistry {
        TypeRegistry::from_value(
            Path::new("type_site.json"),
            json!([
                {"type": "STEP", "icon": "step.png", "group": "Stations", "cluster": true},
                {"type": "Poste de relèvement", "icon": "pr.png", "show": false},
                {"type": "Forage", "icon": "forage.png", "enabled": false}
            ]),
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_build_skips_disabled_types() {
        let mut map = LeafletMap::new(Point::new(1.0, 45.0), 10);
        let layers = LayerRegistry::build(&mut map, &registry(), "Autres ouvrages", "compteur.png");

        assert_eq!(layers.len(), 2);
        assert!(layers.get("forage").is_none());
        let names: Vec<_> = map.overlays().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Stations", "Poste de relèvement", "Autres ouvrages"]);
    }

    #[test]
    fn test_cluster_and_visibility() {
        let mut map = LeafletMap::new(Point::new(1.0, 45.0), 10);
        let layers = LayerRegistry::build(&mut map, &registry(), "Autres ouvrages", "compteur.png");

        let step = layers.get("step").unwrap();
        assert!(matches!(step.target, MarkerTarget::Cluster(_)));
        assert!(map.overlay(step.overlay).show);

        let pr = layers.get("poste de relevement").unwrap();
        assert_eq!(pr.target, MarkerTarget::Group(pr.overlay));
        assert!(!map.overlay(pr.overlay).show);

        let default = layers.default_entry();
        assert!(!map.overlay(default.overlay).show);
        assert_eq!(default.meta.icon, "compteur.png");
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let mut map = LeafletMap::new(Point::new(1.0, 45.0), 10);
        let layers = LayerRegistry::build(&mut map, &registry(), "Autres ouvrages", "compteur.png");

        let entry = layers.resolve("Poste-de-Relevement");
        assert_eq!(entry.meta.type_name, "Poste de relèvement");
        assert!(!layers.is_default(entry));

        assert!(layers.is_default(layers.resolve("Bassin")));
        assert!(layers.is_default(layers.resolve("Autres ouvrages")));
        assert!(layers.is_default(layers.resolve("Forage")));
    }

    #[test]
    fn test_overlay_bindings() {
        let mut map = LeafletMap::new(Point::new(1.0, 45.0), 10);
        let layers = LayerRegistry::build(&mut map, &registry(), "Autres ouvrages", "compteur.png");

        let bindings = layers.overlay_bindings(&map);
        assert_eq!(bindings.len(), 3);
        assert!(bindings["Stations"].starts_with("feature_group_"));
        assert!(bindings.contains_key("Autres ouvrages"));
    }
}
