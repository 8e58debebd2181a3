//! Normalisation des libellés libres (types d'ouvrage, communes)
//!
//! Deux orthographes d'un même libellé ("Réseaux d'Eau", "reseaux-d-eau")
//! produisent la même clé.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Calcule la clé canonique d'un libellé.
///
/// Étapes : trim, apostrophes typographiques et `œ` ramenés à l'ASCII,
/// apostrophe / slash / tiret remplacés par un espace, décomposition NFKD
/// sans marques combinantes, suppression de tout ce qui n'est ni
/// alphanumérique ni blanc, espaces consécutifs fusionnés, passage en
/// minuscules.
///
/// Totale et idempotente : une entrée vide donne une chaîne vide.
pub fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut replaced = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '\u{2019}' | '\u{00B4}' | '\'' | '/' | '-' => replaced.push(' '),
            '\u{0153}' => replaced.push_str("oe"),
            '\u{0152}' => replaced.push_str("OE"),
            c => replaced.push(c),
        }
    }

    let stripped: String = replaced
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    let mut key = String::with_capacity(stripped.len());
    for word in stripped.split_whitespace() {
        if !key.is_empty() {
            key.push(' ');
        }
        key.push_str(word);
    }

    key.to_lowercase().replace('ß', "ss")
}

/// Variante acceptant une valeur absente
pub fn normalize_opt(value: Option<&str>) -> String {
    value.map(normalize_label).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accents_case_punctuation() {
        assert_eq!(normalize_label("Réseaux d'Eau"), "reseaux d eau");
        assert_eq!(
            normalize_label("Réseaux d'Eau"),
            normalize_label("reseaux-d-eau")
        );
        assert_eq!(normalize_label("Poste / Relevage"), "poste relevage");
        assert_eq!(normalize_label("d\u{2019}épuration"), "d epuration");
    }

    #[test]
    fn test_ligature_and_symbols() {
        assert_eq!(normalize_label("Œuvre  Cœur"), "oeuvre coeur");
        assert_eq!(normalize_label("STEP (boues)!"), "step boues");
        assert_eq!(normalize_label("  Château\td'eau  "), "chateau d eau");
    }

    #[test]
    fn test_separators_become_single_space() {
        assert_eq!(normalize_label("Bassin d'orage"), "bassin d orage");
        assert_eq!(normalize_label("eau_potable"), "eaupotable");
        assert_eq!(normalize_label("Poste -- Relevage"), "poste relevage");
        assert!(!normalize_label("Station / Épuration").contains('_'));
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(normalize_label(""), "");
        assert_eq!(normalize_label("   "), "");
        assert_eq!(normalize_label("'-/"), "");
        assert_eq!(normalize_opt(None), "");
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "Réseaux d'Eau",
            "ÉCOLE Maternelle",
            "Straße",
            "ﬁltre à sable",
            "PR n°12",
            "Œil-de-bœuf",
        ] {
            let once = normalize_label(raw);
            assert_eq!(normalize_label(&once), once, "raw={raw}");
        }
    }
}
