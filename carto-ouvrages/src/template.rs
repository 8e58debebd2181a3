//! Gabarits Tera de la page et du script d'état de vue
//!
//! Les gabarits sont embarqués dans le binaire. Une variable absente du
//! contexte fait échouer le rendu : un gabarit incomplet ne doit pas
//! produire de page.

use std::collections::HashMap;

use serde::Serialize;
use tera::{Context, Tera, Value};

use crate::error::CartoError;

pub const PAGE: &str = "page.html";
pub const VIEW_STATE: &str = "view_state.js";

const PAGE_SOURCE: &str = include_str!("../templates/page.html");
const VIEW_STATE_SOURCE: &str = include_str!("../templates/view_state.js");

/// JSON insérable dans une balise `<script>`
pub fn json_for_script<T: Serialize + ?Sized>(value: &T) -> Result<String, CartoError> {
    let json = serde_json::to_string(value).map_err(|e| CartoError::Template(e.to_string()))?;
    Ok(json.replace("</", "<\\/"))
}

/// Filtre `json_script` : sérialise la valeur pour un bloc `<script>`
fn json_script_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    json_for_script(value)
        .map(Value::String)
        .map_err(|e| tera::Error::msg(e.to_string()))
}

/// Moteur chargé avec les gabarits embarqués.
///
/// L'échappement automatique est coupé : les valeurs sont du JS ou du HTML
/// déjà préparés par l'appelant.
pub fn engine() -> Result<Tera, CartoError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.register_filter("json_script", json_script_filter);
    tera.add_raw_templates(vec![(PAGE, PAGE_SOURCE), (VIEW_STATE, VIEW_STATE_SOURCE)])
        .map_err(template_error)?;
    Ok(tera)
}

/// Rend un gabarit embarqué
pub fn render(name: &str, context: &Context) -> Result<String, CartoError> {
    engine()?.render(name, context).map_err(template_error)
}

/// Message Tera complet (la cause utile est souvent dans la source)
fn template_error(err: tera::Error) -> CartoError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    CartoError::Template(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_templates_parse() {
        let tera = engine().unwrap();
        let names: Vec<_> = tera.get_template_names().collect();
        assert!(names.contains(&PAGE));
        assert!(names.contains(&VIEW_STATE));
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let mut context = Context::new();
        context.insert("title", "Ouvrages");
        let err = render(PAGE, &context).unwrap_err();
        assert!(matches!(err, CartoError::Template(_)));
    }

    #[test]
    fn test_json_script_filter() {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_filter("json_script", json_script_filter);
        tera.add_raw_template("t", "var x = {{ value | json_script }};").unwrap();

        let mut context = Context::new();
        context.insert("value", &["</script><b>"]);
        let out = tera.render("t", &context).unwrap();
        assert_eq!(out, r#"var x = ["<\/script><b>"];"#);
    }

    #[test]
    fn test_json_for_script() {
        let json = json_for_script(&["</script><b>"]).unwrap();
        assert_eq!(json, r#"["<\/script><b>"]"#);
    }
}
