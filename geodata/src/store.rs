//! Opérations sur la liste des ouvrages (INDEX, état, écriture)

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::types::{SiteIndex, SiteRecord};
use crate::GeodataError;

/// États d'exploitation acceptés par défaut
pub const DEFAULT_SITE_STATES: [&str; 2] = ["ES", "HS"];

/// Prochain INDEX libre : `max + 1`, 1 pour une liste vide.
///
/// Les index textuels numériques comptent ; un index supprimé n'est
/// jamais réattribué tant qu'un index supérieur existe.
pub fn next_index(records: &[SiteRecord]) -> u64 {
    records
        .iter()
        .filter_map(|r| r.index.as_ref().and_then(SiteIndex::as_u64))
        .max()
        .unwrap_or(0)
        + 1
}

/// Ajoute un ouvrage avec un nouvel INDEX et retourne cet INDEX
pub fn add_site(records: &mut Vec<SiteRecord>, mut site: SiteRecord) -> u64 {
    let index = next_index(records);
    site.index = Some(SiteIndex::Number(index));
    records.push(site);
    index
}

/// Modifie l'ouvrage portant cet INDEX. L'INDEX lui-même est préservé.
pub fn update_site<F>(records: &mut [SiteRecord], index: u64, update: F) -> Result<(), GeodataError>
where
    F: FnOnce(&mut SiteRecord),
{
    let record = records
        .iter_mut()
        .find(|r| r.index.as_ref().and_then(SiteIndex::as_u64) == Some(index))
        .ok_or(GeodataError::RecordNotFound(index))?;

    let original = record.index.clone();
    update(record);
    record.index = original;
    debug!(index, "Site record updated");
    Ok(())
}

/// Ramène un état saisi à l'un des états autorisés (insensible à la casse).
///
/// Retourne le premier état autorisé si aucun ne correspond.
pub fn normalize_state<'a, S: AsRef<str>>(value: Option<&str>, allowed: &'a [S]) -> &'a str {
    let cleaned = value.unwrap_or("").trim();
    allowed
        .iter()
        .map(AsRef::as_ref)
        .find(|state| state.eq_ignore_ascii_case(cleaned))
        .or_else(|| allowed.first().map(AsRef::as_ref))
        .unwrap_or(DEFAULT_SITE_STATES[0])
}

/// Écrit `value` en JSON indenté, via un fichier temporaire renommé
/// sur la cible.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), GeodataError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir).map_err(|e| GeodataError::io(dir, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data.json".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let json = serde_json::to_vec_pretty(value).map_err(|source| GeodataError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut file = std::fs::File::create(&tmp).map_err(|e| GeodataError::io(&tmp, e))?;
    file.write_all(&json)
        .and_then(|_| file.sync_all())
        .map_err(|e| GeodataError::io(&tmp, e))?;
    drop(file);

    std::fs::rename(&tmp, path).map_err(|e| GeodataError::io(path, e))?;
    debug!(path = %path.display(), "JSON saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(index: Option<SiteIndex>, nom: &str) -> SiteRecord {
        SiteRecord {
            index,
            nom: nom.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_next_index() {
        assert_eq!(next_index(&[]), 1);
        let records = vec![
            site(Some(SiteIndex::Number(2)), "a"),
            site(Some(SiteIndex::Text("7".into())), "b"),
            site(Some(SiteIndex::Text("x".into())), "c"),
            site(None, "d"),
        ];
        assert_eq!(next_index(&records), 8);
    }

    #[test]
    fn test_add_site_never_reuses() {
        let mut records = vec![site(Some(SiteIndex::Number(1)), "a")];
        assert_eq!(add_site(&mut records, site(None, "b")), 2);
        assert_eq!(add_site(&mut records, site(None, "c")), 3);

        records.retain(|r| r.nom != "b");
        assert_eq!(add_site(&mut records, site(None, "d")), 4);
    }

    #[test]
    fn test_update_site_keeps_index() {
        let mut records = vec![site(Some(SiteIndex::Number(5)), "old")];
        update_site(&mut records, 5, |r| {
            r.nom = "new".into();
            r.index = Some(SiteIndex::Number(99));
        })
        .unwrap();
        assert_eq!(records[0].nom, "new");
        assert_eq!(records[0].index, Some(SiteIndex::Number(5)));

        let err = update_site(&mut records, 42, |_| {}).unwrap_err();
        assert!(matches!(err, GeodataError::RecordNotFound(42)));
    }

    #[test]
    fn test_normalize_state() {
        assert_eq!(normalize_state(Some(" hs "), &DEFAULT_SITE_STATES), "HS");
        assert_eq!(normalize_state(Some("??"), &DEFAULT_SITE_STATES), "ES");
        assert_eq!(normalize_state(None, &["EN SERVICE".to_string()]), "EN SERVICE");
    }

    #[test]
    fn test_save_json_replaces_file() {
        let dir = std::env::temp_dir().join(format!("geodata_store_{}", std::process::id()));
        let path = dir.join("recap.json");

        save_json(&path, &vec![site(Some(SiteIndex::Number(1)), "a")]).unwrap();
        save_json(&path, &vec![site(Some(SiteIndex::Number(2)), "b")]).unwrap();

        let reloaded = crate::datasets::load_sites(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].nom, "b");

        std::fs::remove_dir_all(dir).ok();
    }
}
