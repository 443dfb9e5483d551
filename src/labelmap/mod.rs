// src/labelmap/mod.rs
// ============================================================================
// LABEL MAP - Clase canónica → id entero del detector
// ============================================================================
//
// Formatos aceptados:
//   *.pbtxt  StringIntLabelMap en texto:  item { id: 1 name: 'green' }
//   *.json   objeto plano:                { "green": 1, "red": 2 }
//
// El id 0 está reservado para "background". Los comentarios `#` solo cuentan
// fuera de comillas; los bloques anidados dentro de un item (keypoints, ...)
// se ignoran.
//
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ConvertError, Result};

static ITEM_START_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bitem\s*\{").unwrap());
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bname\s*:\s*(?:'([^']*)'|"([^"]*)")"#).unwrap());
static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bid\s*:\s*(-?\d+)").unwrap());

const BACKGROUND: &str = "background";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    ids: BTreeMap<String, i64>,
}

impl LabelMap {
    /// Carga el label map; el formato se decide por la extensión.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json(&text)
        } else {
            Self::from_pbtxt(&text)
        };

        parsed.map_err(|message| ConvertError::LabelMap {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_pbtxt(text: &str) -> std::result::Result<Self, String> {
        let text = strip_comments(text);
        let mut ids = BTreeMap::new();

        for (idx, body) in item_bodies(&text)?.iter().enumerate() {
            let name = NAME_RE
                .captures(body)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| format!("item #{} has no name", idx))?;

            let id = ID_RE
                .captures(body)
                .ok_or_else(|| format!("item '{}' has no id", name))?[1]
                .parse::<i64>()
                .map_err(|e| format!("item '{}' has an invalid id: {}", name, e))?;

            ids.insert(name, id);
        }

        Self::from_ids(ids)
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, String> {
        let ids: BTreeMap<String, i64> =
            serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
        Self::from_ids(ids)
    }

    fn from_ids(ids: BTreeMap<String, i64>) -> std::result::Result<Self, String> {
        if ids.is_empty() {
            return Err("no items".to_string());
        }
        for (name, &id) in &ids {
            if id < 0 {
                return Err(format!("label '{}' has negative id {}", name, id));
            }
            if id == 0 && name != BACKGROUND {
                return Err(format!("id 0 is reserved for '{}', found '{}'", BACKGROUND, name));
            }
        }
        Ok(Self { ids })
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.ids.get(name).copied()
    }

    /// Como `get`, pero un nombre ausente es fatal
    pub fn resolve(&self, name: &str) -> Result<i64> {
        self.get(name)
            .ok_or_else(|| ConvertError::UnknownLabel(name.to_string()))
    }

    /// Clases de `required` sin entrada
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.ids.contains_key(*name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.ids.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// Estado de comillas al recorrer el texto carácter a carácter
#[derive(Default)]
struct Quotes {
    open: Option<char>,
    escaped: bool,
}

impl Quotes {
    /// Avanza un carácter; true si pertenece a un literal entre comillas
    fn step(&mut self, c: char) -> bool {
        match self.open {
            Some(q) => {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == q {
                    self.open = None;
                }
                true
            }
            None if c == '\'' || c == '"' => {
                self.open = Some(c);
                true
            }
            None => false,
        }
    }
}

/// Quita los comentarios `#` que no están dentro de comillas
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quotes = Quotes::default();
    let mut in_comment = false;

    for c in text.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
            continue;
        }
        if !quotes.step(c) && c == '#' {
            in_comment = true;
            continue;
        }
        out.push(c);
    }
    out
}

/// Texto de nivel superior de cada `item { ... }`, sin sus bloques anidados
fn item_bodies(text: &str) -> std::result::Result<Vec<String>, String> {
    let mut bodies = Vec::new();
    let mut pos = 0;

    while let Some(start) = ITEM_START_RE.find_at(text, pos) {
        let mut body = String::new();
        let mut quotes = Quotes::default();
        let mut depth = 1usize;
        let mut end = None;

        for (offset, c) in text[start.end()..].char_indices() {
            let top_level = depth == 1;
            if !quotes.step(c) {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(start.end() + offset + 1);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            if top_level && depth == 1 {
                body.push(c);
            }
        }

        pos = end.ok_or_else(|| format!("unterminated item at byte {}", start.start()))?;
        bodies.push(body);
    }

    Ok(bodies)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISA_PBTXT: &str = r#"
# LISA traffic lights
item {
  id: 1
  name: 'green'
}

item {
  id: 2
  name: "red"
  display_name: 'Red light'
}

item { id: 3 name: 'yellow' }
"#;

    #[test]
    fn test_parse_pbtxt() {
        let map = LabelMap::from_pbtxt(LISA_PBTXT).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("green"), Some(1));
        assert_eq!(map.get("red"), Some(2));
        assert_eq!(map.get("yellow"), Some(3));
        assert_eq!(map.get("Red light"), None);
    }

    #[test]
    fn test_parse_json() {
        let map = LabelMap::from_json(r#"{"green": 1, "red": 2}"#).unwrap();
        assert_eq!(map.get("red"), Some(2));
        assert_eq!(map.missing(&["green", "red", "yellow"]), vec!["yellow"]);
    }

    #[test]
    fn test_resolve_unknown_label() {
        let map = LabelMap::from_json(r#"{"green": 1}"#).unwrap();
        assert_eq!(map.resolve("green").unwrap(), 1);
        assert!(matches!(
            map.resolve("yellow"),
            Err(ConvertError::UnknownLabel(name)) if name == "yellow"
        ));
    }

    #[test]
    fn test_duplicate_name_last_wins() {
        let map = LabelMap::from_pbtxt("item { id: 1 name: 'a' } item { id: 4 name: 'a' }").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(4));
    }

    #[test]
    fn test_comments_and_nested_blocks() {
        let text = r#"
# cabecera
item {
  name: 'red#1'  # comentario
  id: 4
  keypoints { id: 9 name: 'nose' }
}
item { name: "green" display_name: "Green" id: 1 }
"#;
        let map = LabelMap::from_pbtxt(text).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("red#1"), Some(4));
        assert_eq!(map.get("green"), Some(1));
        assert_eq!(map.get("nose"), None);

        assert!(LabelMap::from_pbtxt("item { id: 1 name: 'a' ").is_err());
    }

    #[test]
    fn test_invalid_ids() {
        assert!(LabelMap::from_pbtxt("item { id: 0 name: 'green' }").is_err());
        assert!(LabelMap::from_pbtxt("item { id: -2 name: 'green' }").is_err());
        assert!(LabelMap::from_pbtxt("item { id: 0 name: 'background' }").is_ok());
        assert!(LabelMap::from_pbtxt("item { name: 'green' }").is_err());
        assert!(LabelMap::from_pbtxt("item { id: 1 }").is_err());
        assert!(LabelMap::from_pbtxt("").is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let pbtxt = dir.path().join("map.pbtxt");
        let json = dir.path().join("map.json");
        std::fs::write(&pbtxt, LISA_PBTXT).unwrap();
        std::fs::write(&json, r#"{"green": 7}"#).unwrap();

        assert_eq!(LabelMap::load(&pbtxt).unwrap().get("yellow"), Some(3));
        assert_eq!(LabelMap::load(&json).unwrap().get("green"), Some(7));
        assert!(matches!(
            LabelMap::load(dir.path().join("absent.pbtxt")),
            Err(ConvertError::Io { .. })
        ));
    }

    #[test]
    fn test_bundled_label_map() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(crate::config::DEFAULT_LABEL_MAP_PATH);
        let map = LabelMap::load(path).unwrap();
        assert!(map.missing(crate::annotation::CANONICAL_CLASSES).is_empty());
    }
}
