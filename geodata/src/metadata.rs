//! Registre des types d'ouvrage (type_site.json)

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::datasets::read_json;
use crate::normalize::normalize_label;
use crate::types::{TypeMetadata, TypeMetadataRecord};
use crate::GeodataError;

/// Métadonnées indexées par libellé normalisé.
///
/// L'ordre d'insertion est conservé ; une clé en doublon remplace la valeur
/// précédente à la même position.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: IndexMap<String, TypeMetadata>,
}

impl TypeRegistry {
    /// Construit le registre depuis des enregistrements bruts.
    ///
    /// Les entrées sans type ou sans icône sont ignorées.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a TypeMetadataRecord>,
        show_default: bool,
    ) -> Self {
        let mut entries = IndexMap::new();
        for record in records {
            match TypeMetadata::from_record(record, show_default) {
                Some(meta) => {
                    entries.insert(meta.key(), meta);
                }
                None => debug!(record = ?record.type_name, "Skipping type entry without type or icon"),
            }
        }
        Self { entries }
    }

    /// Construit le registre depuis le contenu JSON de type_site.json
    pub fn from_value(path: &Path, value: Value, show_default: bool) -> Result<Self, GeodataError> {
        let Value::Array(items) = value else {
            return Err(GeodataError::invalid_shape(path, "a JSON array of type entries"));
        };
        let records: Vec<TypeMetadataRecord> = items
            .into_iter()
            .filter(|item| item.is_object())
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        Ok(Self::from_records(&records, show_default))
    }

    /// Charge type_site.json (visibilité par défaut : affichée)
    pub fn load(path: &Path) -> Result<Self, GeodataError> {
        let value = read_json(path)?;
        let registry = Self::from_value(path, value, true)?;
        debug!(path = %path.display(), types = registry.len(), "Type metadata loaded");
        Ok(registry)
    }

    /// Recherche par libellé libre (normalisé avant recherche)
    pub fn get(&self, label: &str) -> Option<&TypeMetadata> {
        self.entries.get(&normalize_label(label))
    }

    /// Recherche par clé déjà normalisée
    pub fn get_key(&self, key: &str) -> Option<&TypeMetadata> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeMetadata)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clés des types désactivés
    pub fn disabled_keys(&self) -> impl Iterator<Item = &String> {
        self.entries
            .iter()
            .filter(|(_, meta)| !meta.enabled)
            .map(|(key, _)| key)
    }

    /// Table clé normalisée → nom de couche (tous types confondus)
    pub fn type_to_group(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(key, meta)| (key.clone(), meta.group.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(value: Value) -> TypeRegistry {
        TypeRegistry::from_value(Path::new("type_site.json"), value, true).unwrap()
    }

    #[test]
    fn test_last_wins_on_collision() {
        let reg = registry(json!([
            {"type": "Château d'eau", "icon": "a.png", "group": "Premier"},
            {"type": "STEP", "icon": "step.png"},
            {"type": "chateau-d-eau", "icon": "b.png", "group": "Second"}
        ]));

        assert_eq!(reg.len(), 2);
        let meta = reg.get("CHATEAU D EAU").unwrap();
        assert_eq!(meta.icon, "b.png");
        assert_eq!(meta.group, "Second");
        // position d'origine conservée
        assert_eq!(reg.iter().next().unwrap().0, "chateau d eau");
    }

    #[test]
    fn test_skips_incomplete_and_non_objects() {
        let reg = registry(json!([
            {"type": "STEP"},
            "garbage",
            {"icon": "x.png"},
            {"type": "PR", "icon": "pr.png", "enabled": false}
        ]));

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.disabled_keys().collect::<Vec<_>>(), vec!["pr"]);
    }

    #[test]
    fn test_wrong_shape() {
        let err = TypeRegistry::from_value(Path::new("t.json"), json!({"type": "STEP"}), true)
            .unwrap_err();
        assert!(matches!(err, GeodataError::InvalidShape { .. }));
    }

    #[test]
    fn test_type_to_group() {
        let reg = registry(json!([
            {"type": "STEP", "icon": "step.png", "group": "Stations"},
            {"type": "Poste de relevage", "icon": "pr.png"}
        ]));
        let table = reg.type_to_group();
        assert_eq!(table.get("step").map(String::as_str), Some("Stations"));
        assert_eq!(
            table.get("poste de relevage").map(String::as_str),
            Some("Poste de relevage")
        );
    }
}
