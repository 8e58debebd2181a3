//! Types d'erreurs pour le crate geodata

use std::path::PathBuf;

use thiserror::Error;

/// Erreurs pouvant survenir lors du chargement des jeux de données
#[derive(Debug, Error)]
pub enum GeodataError {
    /// Fichier absent
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Erreur d'I/O lors de la lecture ou de l'écriture
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON malformé
    #[error("Malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON valide mais de forme inattendue
    #[error("Unexpected content in {}: expected {expected}", path.display())]
    InvalidShape { path: PathBuf, expected: String },

    /// Aucun site ne porte cet INDEX
    #[error("No record found with INDEX {0}")]
    RecordNotFound(u64),
}

impl GeodataError {
    /// Crée une erreur de forme avec contexte
    pub fn invalid_shape(path: impl Into<PathBuf>, expected: impl Into<String>) -> Self {
        Self::InvalidShape {
            path: path.into(),
            expected: expected.into(),
        }
    }

    /// Crée une erreur d'I/O, en isolant le cas "fichier absent"
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// Vrai si l'erreur signale un fichier absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
