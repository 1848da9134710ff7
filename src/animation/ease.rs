/// Easing functions used to map normalized animation progress.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    /// Linear interpolation.
    #[default]
    Linear,
    /// Quadratic ease-in.
    #[serde(alias = "easeInQuad")]
    InQuad,
    /// Quadratic ease-out.
    #[serde(alias = "easeOutQuad")]
    OutQuad,
    /// Quadratic ease-in/out.
    #[serde(alias = "easeInOutQuad")]
    InOutQuad,
    /// Cubic ease-in.
    #[serde(alias = "easeInCubic")]
    InCubic,
    /// Cubic ease-out.
    #[serde(alias = "easeOutCubic")]
    OutCubic,
    /// Cubic ease-in/out.
    #[serde(alias = "easeInOutCubic")]
    InOutCubic,
    /// Host-supplied curve; only available from code, never from JSON.
    #[serde(skip)]
    Custom(fn(f64) -> f64),
}

impl Ease {
    /// Apply this easing function to normalized progress `t` in `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::Custom(f) => f(t),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
