//! Sérialisation de la carte en page HTML autonome

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tera::Context;
use tracing::debug;

use crate::error::CartoError;
use crate::map::{LeafletMap, Marker};
use crate::markers::escape_html;
use crate::template::{self, json_for_script, PAGE};

/// Titre de la page générée
pub const PAGE_TITLE: &str = "Ouvrages";

/// Produit le HTML complet de la carte
pub fn render_html(map: &LeafletMap) -> Result<String, CartoError> {
    let scripts: Vec<String> = map
        .scripts()
        .iter()
        .map(|script| script.replace("</script", "<\\/script"))
        .collect();

    let mut context = Context::new();
    context.insert("title", PAGE_TITLE);
    context.insert("map_var", &map.var);
    context.insert("map_script", &map_script(map)?);
    context.insert("scripts", &scripts);
    template::render(PAGE, &context)
}

/// Script de construction de la carte Leaflet
fn map_script(map: &LeafletMap) -> Result<String, CartoError> {
    let mut js = String::new();
    let m = &map.var;

    writeln!(
        js,
        "    var {m} = L.map({}, {{center: {}, zoom: {}}});",
        json_for_script(m)?,
        json_for_script(&[map.center.y(), map.center.x()])?,
        map.zoom
    )?;

    // chaque image d'icône n'est écrite qu'une fois
    let mut icon_urls: IndexMap<&str, String> = IndexMap::new();
    for marker in map.overlays().iter().flat_map(|o| o.markers.iter()) {
        let next = icon_urls.len();
        icon_urls
            .entry(marker.icon.url.as_str())
            .or_insert_with(|| format!("icon_url_{}", next));
    }
    for (url, var) in &icon_urls {
        writeln!(js, "    var {} = {};", var, json_for_script(url)?)?;
    }

    let mut base_layers = BTreeMap::new();
    for (i, tile) in map.tile_layers.iter().enumerate() {
        write!(
            js,
            "    var {} = L.tileLayer({}, {{attribution: {}, maxZoom: 19}})",
            tile.var,
            json_for_script(&tile.url)?,
            json_for_script(&tile.attribution)?
        )?;
        // seul le premier fond est affiché au chargement
        if i == 0 {
            write!(js, ".addTo({m})")?;
        }
        js.push_str(";\n");
        base_layers.insert(tile.name.clone(), tile.var.clone());
    }

    let mut overlays = BTreeMap::new();
    for layer in &map.geojson_layers {
        let style = serde_json::json!({"fillColor": layer.color, "color": layer.color});
        writeln!(
            js,
            "    var {} = L.geoJson({}, {{style: function () {{ return {}; }}}}).addTo({m});",
            layer.var,
            json_for_script(&layer.data)?,
            json_for_script(&style)?
        )?;
        overlays.insert(layer.name.clone(), layer.var.clone());
    }

    for overlay in map.overlays() {
        write!(js, "    var {} = L.featureGroup()", overlay.var)?;
        if overlay.show {
            write!(js, ".addTo({m})")?;
        }
        js.push_str(";\n");
        if let Some(cluster) = &overlay.cluster {
            writeln!(js, "    var {cluster} = L.markerClusterGroup().addTo({});", overlay.var)?;
        }
        for marker in &overlay.markers {
            let parent = match (&overlay.cluster, marker.clustered) {
                (Some(cluster), true) => cluster,
                _ => &overlay.var,
            };
            let icon_var = icon_urls
                .get(marker.icon.url.as_str())
                .ok_or_else(|| CartoError::Template(format!("no icon variable for {}", marker.var)))?;
            write_marker(&mut js, marker, icon_var, parent)?;
        }
        overlays.insert(overlay.name.clone(), overlay.var.clone());
    }

    if map.layer_control {
        writeln!(
            js,
            "    L.control.layers({}, {}).addTo({m});",
            layer_object(&base_layers)?,
            layer_object(&overlays)?
        )?;
    }
    Ok(js)
}

fn write_marker(js: &mut String, marker: &Marker, icon_var: &str, parent: &str) -> Result<(), CartoError> {
    let iframe = format!(
        "<iframe srcdoc=\"{}\" width=\"{}\" height=\"{}\" style=\"border:none;\"></iframe>",
        escape_html(&marker.popup.html),
        marker.popup.width,
        marker.popup.height
    );
    writeln!(
        js,
        "    var {} = L.marker({}, {{icon: L.icon({{iconUrl: {icon_var}, iconSize: {}}})}}).bindPopup({}, {{maxWidth: {}}}).addTo({parent});",
        marker.var,
        json_for_script(&[marker.location.y(), marker.location.x()])?,
        json_for_script(&[marker.icon.size.0, marker.icon.size.1])?,
        json_for_script(&iframe)?,
        marker.popup.width + 20
    )?;
    Ok(())
}

/// Objet JS `{"Nom": variable, ...}`
fn layer_object(layers: &BTreeMap<String, String>) -> Result<String, CartoError> {
    let entries = layers
        .iter()
        .map(|(name, var)| Ok(format!("{}: {}", json_for_script(name)?, var)))
        .collect::<Result<Vec<_>, CartoError>>()?;
    Ok(format!("{{{}}}", entries.join(", ")))
}

/// Écrit la carte dans `path` et renvoie le chemin absolu.
///
/// Le fichier est écrit à côté de la cible puis renommé : un lecteur ne
/// voit jamais une page partielle.
pub fn save(map: &LeafletMap, path: &Path) -> Result<PathBuf, CartoError> {
    let html = render_html(map)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CartoError::io(parent, e))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "carte.html".into());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    std::fs::write(&tmp, html.as_bytes()).map_err(|e| CartoError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| CartoError::io(path, e))?;

    let absolute = std::fs::canonicalize(path).map_err(|e| CartoError::io(path, e))?;
    debug!(path = %absolute.display(), bytes = html.len(), "Map saved");
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CustomIcon, MarkerTarget, Popup};
    use geo::Point;

    fn sample_map() -> LeafletMap {
        let mut map = LeafletMap::new(Point::new(1.463, 45.148537), 10);
        map.add_tile_layer("OpenStreetMap", "https://tile.openstreetmap.org/{z}/{x}/{y}.png", "OSM");
        map.add_tile_layer("Esri Satellite", "https://example.org/{z}/{y}/{x}", "Esri");
        map.add_geojson(
            "SEABB",
            geojson::FeatureCollection {
                bbox: None,
                features: vec![],
                foreign_members: None,
            },
            "#228B22",
        );
        let stations = map.add_overlay("Stations", true);
        let hidden = map.add_overlay("Autres ouvrages", false);
        let cluster = map.add_cluster(stations);
        let popup = Popup {
            html: "<h3>Pump \"1\"</h3>".into(),
            width: 300,
            height: 200,
        };
        let icon = CustomIcon {
            url: "/srv/icones/step.png".into(),
            size: (50, 50),
        };
        map.add_marker(cluster, Point::new(1.0, 45.0), popup.clone(), icon.clone());
        map.add_marker(MarkerTarget::Group(hidden), Point::new(1.0, 45.0), popup, icon);
        map.enable_layer_control();
        map
    }

    #[test]
    fn test_render_html_structure() {
        let map = sample_map();
        let html = render_html(&map).unwrap();

        assert!(html.contains("leaflet@1.9.4"));
        assert!(html.contains(&format!("<div id=\"{}\"></div>", map.var)));
        assert!(html.contains("L.markerClusterGroup()"));
        assert!(html.contains("[45.0,1.0]"));
        assert!(html.contains("\"#228B22\""));
        assert!(html.contains("L.control.layers("));
        assert!(html.contains("\"Stations\": feature_group_"));
        assert_eq!(html.matches("L.marker(").count(), 2);
        // même image pour les deux marqueurs : une seule variable
        assert_eq!(html.matches("var icon_url_").count(), 1);
        assert!(html.contains("iconUrl: icon_url_0"));
        assert_eq!(html.matches(".addTo(map_").count(), 4);
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render_html(&sample_map()).unwrap(), render_html(&sample_map()).unwrap());
    }

    #[test]
    fn test_scripts_are_appended() {
        let mut map = sample_map();
        map.add_script("console.log('view');".into());
        let html = render_html(&map).unwrap();
        assert!(html.contains("console.log('view');"));
    }

    #[test]
    fn test_save_creates_parents_and_overwrites() {
        let dir = std::env::temp_dir().join(format!("carto_render_{}", std::process::id()));
        let out = dir.join("static").join("global").join("ouvrages.html");

        let first = save(&sample_map(), &out).unwrap();
        assert!(first.is_absolute());
        std::fs::write(&out, "old").unwrap();
        let second = save(&sample_map(), &out).unwrap();
        assert_eq!(first, second);
        assert!(std::fs::read_to_string(&second).unwrap().contains("L.map("));
        assert!(!out.with_file_name(".ouvrages.html.tmp").exists());

        std::fs::remove_dir_all(dir).ok();
    }
}
