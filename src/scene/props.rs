use crate::foundation::core::{Rect, Rgba8};
use crate::foundation::error::{StageError, StageResult};
use crate::scene::element::{PropMap, PropValue};

/// The closed set of component kinds the reconciler knows how to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    Game,
    Layer,
    Scene,
    Sprite,
}

impl InstanceKind {
    pub fn parse(kind: &str) -> StageResult<Self> {
        match kind {
            "game" => Ok(Self::Game),
            "layer" => Ok(Self::Layer),
            "scene" => Ok(Self::Scene),
            "sprite" => Ok(Self::Sprite),
            other => Err(StageError::unsupported_kind(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Layer => "layer",
            Self::Scene => "scene",
            Self::Sprite => "sprite",
        }
    }

    /// Containment rules of the tree. A scene directly under the root is the single-scene
    /// layout that predates layers.
    pub fn accepts(self, child: InstanceKind) -> bool {
        matches!(
            (self, child),
            (Self::Game, Self::Layer)
                | (Self::Game, Self::Scene)
                | (Self::Layer, Self::Scene)
                | (Self::Layer, Self::Sprite)
                | (Self::Scene, Self::Sprite)
        )
    }

    /// The root is purely logical and owns no backend object.
    pub fn has_native(self) -> bool {
        !matches!(self, Self::Game)
    }
}

impl std::fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameProps {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerProps {
    pub name: String,
    pub z_index: i32,
    pub visible: bool,
    pub alpha: f64,
}

impl LayerProps {
    /// Z-index used when a layer of this name omits `zIndex`.
    pub fn default_z_index(name: &str) -> i32 {
        match name {
            "background" => 0,
            "gameplay" => 100,
            "foreground" => 200,
            "ui" => 300,
            "debug" => 400,
            _ => 0,
        }
    }

    /// The `debug` layer starts hidden unless `visible` is set explicitly.
    pub fn default_visible(name: &str) -> bool {
        name != "debug"
    }

    pub fn is_drawable(&self) -> bool {
        self.visible && self.alpha > 0.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneProps {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// `None` means the scene paints no background of its own.
    pub background: Option<Rgba8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteProps {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees, clockwise, around the sprite center.
    pub rotation: f64,
    pub alpha: f64,
    pub visible: bool,
    /// Image reference; an empty string is treated as absent.
    pub texture: Option<String>,
}

impl Default for SpriteProps {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 32.0,
            height: 32.0,
            rotation: 0.0,
            alpha: 1.0,
            visible: true,
            texture: None,
        }
    }
}

impl SpriteProps {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Invisible or fully transparent sprites are neither drawn nor hit.
    pub fn is_drawable(&self) -> bool {
        self.visible && self.alpha > 0.0
    }
}

/// Typed props of a live instance, built from an element's [`PropMap`].
#[derive(Clone, Debug, PartialEq)]
pub enum InstanceProps {
    Game(GameProps),
    Layer(LayerProps),
    Scene(SceneProps),
    Sprite(SpriteProps),
}

impl InstanceProps {
    pub fn kind(&self) -> InstanceKind {
        match self {
            Self::Game(_) => InstanceKind::Game,
            Self::Layer(_) => InstanceKind::Layer,
            Self::Scene(_) => InstanceKind::Scene,
            Self::Sprite(_) => InstanceKind::Sprite,
        }
    }

    /// Convert raw props into the typed form for `kind`, applying defaults.
    ///
    /// Unknown prop names are ignored; known names with the wrong value type are rejected.
    pub fn from_props(kind: InstanceKind, props: &PropMap) -> StageResult<Self> {
        let p = Props { kind, props };
        Ok(match kind {
            InstanceKind::Game => Self::Game(GameProps {
                width: p.dimension("width")?,
                height: p.dimension("height")?,
            }),
            InstanceKind::Layer => {
                let name = p.text("name")?.unwrap_or("gameplay").to_owned();
                let z_index = match p.number("zIndex")? {
                    Some(z) => z.round() as i32,
                    None => LayerProps::default_z_index(&name),
                };
                Self::Layer(LayerProps {
                    visible: p
                        .flag("visible")?
                        .unwrap_or_else(|| LayerProps::default_visible(&name)),
                    alpha: p.number("alpha")?.unwrap_or(1.0),
                    name,
                    z_index,
                })
            }
            InstanceKind::Scene => {
                let background = match p.text("backgroundColor")? {
                    Some(c) => {
                        let c = Rgba8::parse(c)?;
                        (!c.is_transparent()).then_some(c)
                    }
                    None => None,
                };
                Self::Scene(SceneProps {
                    width: p.dimension("width")?,
                    height: p.dimension("height")?,
                    background,
                })
            }
            InstanceKind::Sprite => {
                let d = SpriteProps::default();
                Self::Sprite(SpriteProps {
                    x: p.number("x")?.unwrap_or(d.x),
                    y: p.number("y")?.unwrap_or(d.y),
                    width: p.number("width")?.unwrap_or(d.width),
                    height: p.number("height")?.unwrap_or(d.height),
                    rotation: p.number("rotation")?.unwrap_or(d.rotation),
                    alpha: p.number("alpha")?.unwrap_or(d.alpha),
                    visible: p.flag("visible")?.unwrap_or(d.visible),
                    texture: p
                        .text("texture")?
                        .filter(|t| !t.is_empty())
                        .map(str::to_owned),
                })
            }
        })
    }
}

struct Props<'a> {
    kind: InstanceKind,
    props: &'a PropMap,
}

impl<'a> Props<'a> {
    fn mismatch(&self, name: &str, want: &str, got: &PropValue) -> StageError {
        StageError::validation(format!(
            "{}.{name} must be a {want}, got {}",
            self.kind,
            got.type_name()
        ))
    }

    fn number(&self, name: &str) -> StageResult<Option<f64>> {
        match self.props.get(name) {
            None => Ok(None),
            Some(PropValue::Number(v)) if v.is_finite() => Ok(Some(*v)),
            Some(PropValue::Number(_)) => Err(StageError::validation(format!(
                "{}.{name} must be finite",
                self.kind
            ))),
            Some(other) => Err(self.mismatch(name, "number", other)),
        }
    }

    fn dimension(&self, name: &str) -> StageResult<Option<u32>> {
        match self.number(name)? {
            None => Ok(None),
            Some(v) if v >= 1.0 && v <= f64::from(u32::MAX) => Ok(Some(v.round() as u32)),
            Some(v) => Err(StageError::validation(format!(
                "{}.{name} must be a positive pixel size, got {v}",
                self.kind
            ))),
        }
    }

    fn flag(&self, name: &str) -> StageResult<Option<bool>> {
        match self.props.get(name) {
            None => Ok(None),
            Some(PropValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(self.mismatch(name, "bool", other)),
        }
    }

    fn text(&self, name: &str) -> StageResult<Option<&'a str>> {
        match self.props.get(name) {
            None => Ok(None),
            Some(PropValue::Text(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(self.mismatch(name, "string", other)),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/props.rs"]
mod tests;
