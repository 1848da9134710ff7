use std::collections::BTreeMap;

use crate::animation::state::AnimationSpec;
use crate::foundation::error::{StageError, StageResult};
use crate::input::interactive::Interactive;

/// Raw, untyped props as declared on an element.
pub type PropMap = BTreeMap<String, PropValue>;

/// A single declared prop value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
        }
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Declarative description of one node of the scene tree.
///
/// Elements are cheap, throwaway values: the host rebuilds the whole tree whenever its state
/// changes and hands it to [`crate::Stage::render`], which diffs it against the live instances.
/// The kind stays a string until instance creation so unknown kinds surface as
/// [`StageError::UnsupportedComponentKind`] at reconcile time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub props: PropMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<AnimationSpec>,
    #[serde(skip)]
    pub interactive: Option<Interactive>,
}

impl Element {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: None,
            props: PropMap::new(),
            children: Vec::new(),
            animation: None,
            interactive: None,
        }
    }

    /// Root element; exactly one per stage.
    pub fn game() -> Self {
        Self::new("game")
    }

    /// Named render layer (`background`, `gameplay`, `foreground`, `ui`, `debug` or custom).
    pub fn layer(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self::new("layer").prop("name", name)
    }

    pub fn scene() -> Self {
        Self::new("scene")
    }

    pub fn sprite() -> Self {
        Self::new("sprite")
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn animate(mut self, spec: AnimationSpec) -> Self {
        self.animation = Some(spec);
        self
    }

    pub fn interactive(mut self, interactive: Interactive) -> Self {
        self.interactive = Some(interactive);
        self
    }

    pub fn from_json_str(s: &str) -> StageResult<Self> {
        serde_json::from_str(s).map_err(|e| StageError::serde(format!("element json: {e}")))
    }

    pub fn from_reader(r: impl std::io::Read) -> StageResult<Self> {
        serde_json::from_reader(r).map_err(|e| StageError::serde(format!("element json: {e}")))
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> StageResult<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path).map_err(|e| {
            StageError::validation(format!("open element json '{}': {e}", path.display()))
        })?;
        Self::from_reader(std::io::BufReader::new(f))
    }

    /// Number of elements in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Element::subtree_len).sum::<usize>()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/element.rs"]
mod tests;
