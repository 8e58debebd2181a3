//! Erreurs de la génération de carte

use std::path::PathBuf;

use geodata::GeodataError;
use thiserror::Error;

/// Erreurs de génération.
///
/// Seules les erreurs de configuration et d'I/O remontent à l'appelant ;
/// les défauts d'un ouvrage isolé sont absorbés par le pipeline.
#[derive(Debug, Error)]
pub enum CartoError {
    /// Jeu de données absent, malformé ou de forme inattendue
    #[error(transparent)]
    Dataset(#[from] GeodataError),

    /// Icône absente (récupérable : remplacée par l'icône par défaut)
    #[error("Icon not found: {}", .0.display())]
    IconNotFound(PathBuf),

    /// L'icône par défaut elle-même est absente
    #[error("Default icon not found: {}", .0.display())]
    MissingDefaultIcon(PathBuf),

    /// Écriture du fichier HTML
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Gabarit mal formé ou incomplet
    #[error("Template error: {0}")]
    Template(String),
}

impl From<std::fmt::Error> for CartoError {
    fn from(err: std::fmt::Error) -> Self {
        Self::Template(format!("script generation failed: {}", err))
    }
}

impl CartoError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_error_becomes_template_error() {
        fn write_script() -> Result<(), CartoError> {
            Err::<(), _>(std::fmt::Error)?;
            Ok(())
        }
        let err = write_script().unwrap_err();
        assert!(matches!(err, CartoError::Template(ref m) if m.contains("script generation failed")));
    }
}
