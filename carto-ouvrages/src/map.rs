//! Modèle en mémoire de la carte Leaflet
//!
//! La carte est assemblée ici (fonds, contours, couches, marqueurs,
//! scripts) puis sérialisée par [`crate::render`].

use geo::Point;
use geojson::FeatureCollection;

/// Générateur d'identifiants d'éléments.
///
/// L'identifiant dépend uniquement du type d'élément et de son rang de
/// création : deux générations identiques produisent le même HTML.
#[derive(Debug, Clone)]
pub struct ElementIds {
    seed: String,
    counter: u64,
}

impl ElementIds {
    pub fn new(seed: &str) -> Self {
        Self {
            seed: seed.to_string(),
            counter: 0,
        }
    }

    /// Identifiant suivant, ex. `feature_group_4f1c...`
    pub fn next(&mut self, kind: &str) -> String {
        self.counter += 1;
        let hash = blake3::hash(format!("{}:{}:{}", self.seed, kind, self.counter).as_bytes());
        format!("{}_{}", kind, hex::encode(&hash.as_bytes()[..16]))
    }
}

/// Fond de carte tuilé
#[derive(Debug, Clone)]
pub struct TileLayer {
    pub var: String,
    pub name: String,
    pub url: String,
    pub attribution: String,
}

/// Couche GeoJSON (contours communaux)
#[derive(Debug, Clone)]
pub struct GeoJsonLayer {
    pub var: String,
    pub name: String,
    pub data: FeatureCollection,
    pub color: String,
}

/// Identifiant d'une couche dans la carte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(usize);

/// Couche où sont déposés les marqueurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerTarget {
    /// Directement dans le groupe
    Group(OverlayId),
    /// Dans le regroupement imbriqué du groupe
    Cluster(OverlayId),
}

impl MarkerTarget {
    pub fn overlay(&self) -> OverlayId {
        match self {
            Self::Group(id) | Self::Cluster(id) => *id,
        }
    }
}

/// Contenu d'une bulle
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub html: String,
    pub width: u32,
    pub height: u32,
}

/// Icône image
#[derive(Debug, Clone, PartialEq)]
pub struct CustomIcon {
    /// URI `data:` de l'image
    pub url: String,
    pub size: (u32, u32),
}

/// Un marqueur positionné
#[derive(Debug, Clone)]
pub struct Marker {
    pub var: String,
    /// x = longitude, y = latitude
    pub location: Point,
    pub popup: Popup,
    pub icon: CustomIcon,
    pub clustered: bool,
}

/// Groupe de marqueurs affiché dans le contrôle des couches
#[derive(Debug, Clone)]
pub struct Overlay {
    pub var: String,
    pub name: String,
    pub show: bool,
    /// Variable du regroupement imbriqué, s'il existe
    pub cluster: Option<String>,
    pub markers: Vec<Marker>,
}

/// Carte complète
#[derive(Debug, Clone)]
pub struct LeafletMap {
    pub var: String,
    /// x = longitude, y = latitude
    pub center: Point,
    pub zoom: u8,
    pub tile_layers: Vec<TileLayer>,
    pub geojson_layers: Vec<GeoJsonLayer>,
    pub layer_control: bool,
    overlays: Vec<Overlay>,
    scripts: Vec<String>,
    ids: ElementIds,
}

impl LeafletMap {
    pub fn new(center: Point, zoom: u8) -> Self {
        let mut ids = ElementIds::new("carto-ouvrages");
        Self {
            var: ids.next("map"),
            center,
            zoom,
            tile_layers: Vec::new(),
            geojson_layers: Vec::new(),
            layer_control: false,
            overlays: Vec::new(),
            scripts: Vec::new(),
            ids,
        }
    }

    pub fn add_tile_layer(&mut self, name: &str, url: &str, attribution: &str) {
        let var = self.ids.next("tile_layer");
        self.tile_layers.push(TileLayer {
            var,
            name: name.to_string(),
            url: url.to_string(),
            attribution: attribution.to_string(),
        });
    }

    pub fn add_geojson(&mut self, name: &str, data: FeatureCollection, color: &str) {
        let var = self.ids.next("geo_json");
        self.geojson_layers.push(GeoJsonLayer {
            var,
            name: name.to_string(),
            data,
            color: color.to_string(),
        });
    }

    /// Ajoute un groupe nommé, visible ou non au chargement
    pub fn add_overlay(&mut self, name: &str, show: bool) -> OverlayId {
        let var = self.ids.next("feature_group");
        self.overlays.push(Overlay {
            var,
            name: name.to_string(),
            show,
            cluster: None,
            markers: Vec::new(),
        });
        OverlayId(self.overlays.len() - 1)
    }

    /// Imbrique un regroupement de marqueurs dans le groupe
    pub fn add_cluster(&mut self, overlay: OverlayId) -> MarkerTarget {
        let var = self.ids.next("marker_cluster");
        let entry = &mut self.overlays[overlay.0];
        if entry.cluster.is_none() {
            entry.cluster = Some(var);
        }
        MarkerTarget::Cluster(overlay)
    }

    pub fn add_marker(&mut self, target: MarkerTarget, location: Point, popup: Popup, icon: CustomIcon) {
        let var = self.ids.next("marker");
        let clustered = matches!(target, MarkerTarget::Cluster(_));
        self.overlays[target.overlay().0].markers.push(Marker {
            var,
            location,
            popup,
            icon,
            clustered,
        });
    }

    pub fn overlay(&self, id: OverlayId) -> &Overlay {
        &self.overlays[id.0]
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// Nombre total de marqueurs, toutes couches confondues
    pub fn marker_count(&self) -> usize {
        self.overlays.iter().map(|o| o.markers.len()).sum()
    }

    pub fn enable_layer_control(&mut self) {
        self.layer_control = true;
    }

    /// Script exécuté après la création de la carte
    pub fn add_script(&mut self, script: String) {
        self.scripts.push(script);
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn popup() -> Popup {
        Popup {
            html: "<b>x</b>".into(),
            width: 300,
            height: 200,
        }
    }

    fn icon() -> CustomIcon {
        CustomIcon {
            url: "icons/a.png".into(),
            size: (50, 50),
        }
    }

    #[test]
    fn test_ids_are_deterministic() {
        let mut a = ElementIds::new("seed");
        let mut b = ElementIds::new("seed");
        let first = a.next("marker");
        assert_eq!(first, b.next("marker"));
        assert!(first.starts_with("marker_"));
        assert_eq!(first.len(), "marker_".len() + 32);
        assert_ne!(a.next("marker"), first);
    }

    #[test]
    fn test_markers_go_to_target() {
        let mut map = LeafletMap::new(Point::new(1.0, 45.0), 10);
        let plain = map.add_overlay("Stations", true);
        let clustered = map.add_overlay("Postes", false);
        let cluster_target = map.add_cluster(clustered);

        map.add_marker(MarkerTarget::Group(plain), Point::new(1.0, 45.0), popup(), icon());
        map.add_marker(cluster_target, Point::new(1.1, 45.1), popup(), icon());
        map.add_marker(cluster_target, Point::new(1.2, 45.2), popup(), icon());

        assert_eq!(map.marker_count(), 3);
        assert_eq!(map.overlay(plain).markers.len(), 1);
        assert!(!map.overlay(plain).markers[0].clustered);
        assert!(map.overlay(clustered).cluster.is_some());
        assert!(map.overlay(clustered).markers.iter().all(|m| m.clustered));
    }
}
