use std::collections::BTreeSet;

/// Held keys plus keys released during the current frame.
///
/// Keys are host key names (`"ArrowLeft"`, `"a"`, `" "`...). Released keys are a one-frame event
/// cleared by [`KeyboardState::end_frame`].
#[derive(Clone, Debug, Default)]
pub struct KeyboardState {
    pressed: BTreeSet<String>,
    released: BTreeSet<String>,
}

impl KeyboardState {
    pub fn key_down(&mut self, key: impl Into<String>) {
        self.pressed.insert(key.into());
    }

    pub fn key_up(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.pressed.remove(&key);
        self.released.insert(key);
    }

    /// Window lost focus: everything held counts as released.
    pub fn blur(&mut self) {
        let held = std::mem::take(&mut self.pressed);
        self.released.extend(held);
    }

    pub fn is_pressed(&self, key: &str) -> bool {
        self.pressed.contains(key)
    }

    pub fn was_released(&self, key: &str) -> bool {
        self.released.contains(key)
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = &str> {
        self.pressed.iter().map(String::as_str)
    }

    pub fn end_frame(&mut self) {
        self.released.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/input/keyboard.rs"]
mod tests;
