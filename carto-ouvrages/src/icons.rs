//! Résolution des icônes avec repli sur l'icône par défaut
//!
//! Les images sont embarquées dans la page en URI `data:` : la carte ne
//! dépend pas de l'endroit où elle est servie.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::error::CartoError;

/// Taille minimale d'une icône, en pixels par axe
pub const MIN_ICON_PX: u32 = 12;

/// Résultat de la résolution d'une icône
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconResolution {
    /// Le fichier demandé existe
    Found(PathBuf),
    /// Fichier demandé absent, icône par défaut utilisée
    Fallback { requested: String, path: PathBuf },
}

impl IconResolution {
    pub fn path(&self) -> &Path {
        match self {
            Self::Found(path) | Self::Fallback { path, .. } => path,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Résolveur d'icônes avec cache par nom de fichier.
///
/// Le cache appartient à une génération ; chaque nom n'y est écrit qu'une
/// fois.
#[derive(Debug)]
pub struct IconResolver {
    dir: PathBuf,
    default_name: String,
    cache: HashMap<String, IconResolution>,
    data_uris: HashMap<PathBuf, String>,
}

impl IconResolver {
    pub fn new(dir: impl Into<PathBuf>, default_name: &str) -> Self {
        Self {
            dir: dir.into(),
            default_name: default_name.to_string(),
            cache: HashMap::new(),
            data_uris: HashMap::new(),
        }
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Chemin absolu de l'icône `name`, erreur si le fichier est absent
    pub fn resolve_icon(&self, name: &str) -> Result<PathBuf, CartoError> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(CartoError::IconNotFound(path));
        }
        std::fs::canonicalize(&path).map_err(|e| CartoError::io(&path, e))
    }

    /// Résout une icône, en se rabattant sur l'icône par défaut.
    ///
    /// Seule l'absence de l'icône par défaut est une erreur.
    pub fn icon_path(&mut self, name: &str) -> Result<IconResolution, CartoError> {
        let name = match name.trim() {
            "" => self.default_name.clone(),
            n => n.to_string(),
        };
        if let Some(cached) = self.cache.get(&name) {
            return Ok(cached.clone());
        }

        let resolution = match self.resolve_icon(&name) {
            Ok(path) => IconResolution::Found(path),
            Err(CartoError::IconNotFound(missing)) if name != self.default_name => {
                warn!(icon = %missing.display(), fallback = %self.default_name, "Icon not found, using default icon");
                let path = self.resolve_default()?;
                IconResolution::Fallback {
                    requested: name.clone(),
                    path,
                }
            }
            Err(CartoError::IconNotFound(missing)) => {
                return Err(CartoError::MissingDefaultIcon(missing))
            }
            Err(e) => return Err(e),
        };

        self.cache.insert(name, resolution.clone());
        Ok(resolution)
    }

    /// Contenu de l'icône en URI `data:`, lu une seule fois par fichier
    pub fn data_uri(&mut self, path: &Path) -> Result<String, CartoError> {
        if let Some(uri) = self.data_uris.get(path) {
            return Ok(uri.clone());
        }
        let bytes = std::fs::read(path).map_err(|e| CartoError::io(path, e))?;
        let uri = format!("data:{};base64,{}", mime_type(path), STANDARD.encode(&bytes));
        debug!(icon = %path.display(), bytes = bytes.len(), "Icon embedded");
        self.data_uris.insert(path.to_path_buf(), uri.clone());
        Ok(uri)
    }

    fn resolve_default(&self) -> Result<PathBuf, CartoError> {
        match self.resolve_icon(&self.default_name) {
            Err(CartoError::IconNotFound(missing)) => Err(CartoError::MissingDefaultIcon(missing)),
            other => other,
        }
    }
}

/// Type MIME d'après l'extension
fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Taille d'icône : base × échelle, tronquée, au moins [`MIN_ICON_PX`]
pub fn icon_size(scale: f64, base: u32) -> (u32, u32) {
    let scaled = (base as f64 * scale).trunc();
    let px = if scaled.is_finite() && scaled > MIN_ICON_PX as f64 {
        scaled.min(u32::MAX as f64) as u32
    } else {
        MIN_ICON_PX
    };
    (px, px)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icon_dir(name: &str, files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("carto_icons_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for f in files {
            std::fs::write(dir.join(f), b"png").unwrap();
        }
        dir
    }

    #[test]
    fn test_icon_size() {
        assert_eq!(icon_size(1.0, 50), (50, 50));
        assert_eq!(icon_size(0.5, 50), (25, 25));
        assert_eq!(icon_size(0.1, 50), (12, 12));
        assert_eq!(icon_size(1.33, 50), (66, 66));
    }

    #[test]
    fn test_found_and_fallback() {
        let dir = icon_dir("fallback", &["compteur.png", "step.png"]);
        let mut icons = IconResolver::new(&dir, "compteur.png");

        let found = icons.icon_path("step.png").unwrap();
        assert!(!found.is_fallback());
        assert!(found.path().ends_with("step.png"));

        let fallback = icons.icon_path("absent.png").unwrap();
        assert!(fallback.is_fallback());
        assert!(fallback.path().ends_with("compteur.png"));

        let empty = icons.icon_path("  ").unwrap();
        assert!(!empty.is_fallback());
        assert_eq!(empty.path(), fallback.path());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_default_is_fatal() {
        let dir = icon_dir("nodefault", &["step.png"]);
        let mut icons = IconResolver::new(&dir, "compteur.png");

        assert!(icons.icon_path("step.png").is_ok());
        assert!(matches!(
            icons.icon_path("absent.png"),
            Err(CartoError::MissingDefaultIcon(_))
        ));
        assert!(matches!(
            icons.icon_path("compteur.png"),
            Err(CartoError::MissingDefaultIcon(_))
        ));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_data_uri() {
        let dir = icon_dir("datauri", &["compteur.png"]);
        std::fs::write(dir.join("pr.SVG"), b"<svg/>").unwrap();
        let mut icons = IconResolver::new(&dir, "compteur.png");

        let png = icons.icon_path("compteur.png").unwrap();
        assert_eq!(icons.data_uri(png.path()).unwrap(), "data:image/png;base64,cG5n");

        let svg = icons.icon_path("pr.SVG").unwrap();
        let uri = icons.data_uri(svg.path()).unwrap();
        assert_eq!(uri, format!("data:image/svg+xml;base64,{}", STANDARD.encode(b"<svg/>")));

        // lu une fois : la suppression du fichier ne change rien
        std::fs::remove_file(dir.join("pr.SVG")).unwrap();
        assert_eq!(icons.data_uri(svg.path()).unwrap(), uri);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_cache_keeps_first_resolution() {
        let dir = icon_dir("cache", &["compteur.png", "pr.png"]);
        let mut icons = IconResolver::new(&dir, "compteur.png");

        let first = icons.icon_path("pr.png").unwrap();
        std::fs::remove_file(dir.join("pr.png")).unwrap();
        assert_eq!(icons.icon_path("pr.png").unwrap(), first);

        std::fs::remove_dir_all(dir).ok();
    }
}
