use std::time::Duration;

use crate::foundation::core::{Point, Vec2};
use crate::foundation::ids::InstanceId;
use crate::foundation::math::distance;
use crate::render::adapter::{ComponentInfo, HitTest};

/// Pointer button index, as reported by the host.
pub type Button = u8;

/// Conventional button indices.
pub mod buttons {
    use super::Button;

    pub const LEFT: Button = 0;
    pub const MIDDLE: Button = 1;
    pub const RIGHT: Button = 2;
    pub const BACK: Button = 3;
    pub const FORWARD: Button = 4;
}

/// Thresholds for gesture recognition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureConfig {
    /// Maximum time between two presses of a double-click.
    pub double_click_ms: u64,
    /// Maximum distance in pixels between the two presses of a double-click.
    pub double_click_distance: f64,
    /// Distance in pixels the pointer must travel from the press before a drag begins.
    pub drag_threshold: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            double_click_ms: 300,
            double_click_distance: 10.0,
            drag_threshold: 5.0,
        }
    }
}

impl GestureConfig {
    pub fn with_double_click_ms(mut self, ms: u64) -> Self {
        self.double_click_ms = ms;
        self
    }

    pub fn with_drag_threshold(mut self, px: f64) -> Self {
        self.drag_threshold = px;
        self
    }
}

/// Net pointer motion since the previous frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Movement {
    pub from: Point,
    pub to: Point,
    pub delta: Vec2,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragEvent {
    pub button: Button,
    pub start: Point,
    pub current: Point,
    /// `current - start`.
    pub delta: Vec2,
}

impl DragEvent {
    fn new(button: Button, start: Point, current: Point) -> Self {
        Self {
            button,
            start,
            current,
            delta: current - start,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DoubleClick {
    pub button: Button,
    pub position: Point,
}

#[derive(Clone, Copy, Debug)]
struct LastClick {
    at: Duration,
    button: Button,
    position: Point,
}

/// Turns raw pointer events into per-frame gesture state.
///
/// Raw events may arrive at any time between frames. Continuous state (position, pressed
/// buttons, the current drag, what is under the pointer) persists; one-frame events (releases,
/// movement, double-clicks, drag start/end) stay observable until [`PointerPipeline::end_frame`]
/// runs at the end of the next frame tick.
#[derive(Debug, Default)]
pub struct PointerPipeline {
    config: GestureConfig,
    surface_origin: Option<Point>,

    position: Point,
    pressed: Vec<Button>,
    under_pointer: Option<ComponentInfo>,
    press_target: Option<InstanceId>,
    current_drag: Option<DragEvent>,
    drag_origin: Option<(Point, Button)>,
    last_click: Option<LastClick>,

    newly_pressed: Vec<Button>,
    released: Vec<Button>,
    movement: Option<Movement>,
    double_click: Option<DoubleClick>,
    drag_start: Option<DragEvent>,
    drag_end: Option<DragEvent>,
    drag_moved: bool,
}

impl PointerPipeline {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Register the drawing surface's top-left corner in host coordinates. Without one, host
    /// positions pass through untranslated.
    pub fn set_surface_origin(&mut self, origin: Option<Point>) {
        self.surface_origin = origin;
    }

    fn to_surface(&self, host: Point) -> Point {
        match self.surface_origin {
            Some(o) => Point::new(host.x - o.x, host.y - o.y),
            None => host,
        }
    }

    /// Pointer moved to `host` (host coordinates).
    pub fn pointer_move(&mut self, host: Point, hits: &dyn HitTest) {
        let to = self.to_surface(host);
        let from = self.position;

        if to != from {
            let first = self.movement.map_or(from, |m| m.from);
            self.movement = (to != first).then(|| Movement {
                from: first,
                to,
                delta: to - first,
            });
        }

        if let Some((start, button)) = self.drag_origin {
            if self.current_drag.is_none() && distance(start, to) > self.config.drag_threshold {
                let ev = DragEvent::new(button, start, to);
                tracing::debug!(button, "drag start");
                self.drag_start = Some(ev);
                self.current_drag = Some(ev);
                self.drag_moved = true;
            } else if self.current_drag.is_some() {
                self.current_drag = Some(DragEvent::new(button, start, to));
                self.drag_moved = true;
            }
        }

        self.position = to;
        self.refresh_under_pointer(hits);
    }

    /// Button pressed at `host`. `at` is the host timestamp of the event.
    pub fn pointer_down(&mut self, button: Button, host: Point, at: Duration, hits: &dyn HitTest) {
        let pos = self.to_surface(host);

        let window = Duration::from_millis(self.config.double_click_ms);
        match self.last_click {
            Some(last)
                if last.button == button
                    && at.saturating_sub(last.at) < window
                    && distance(last.position, pos) < self.config.double_click_distance =>
            {
                self.double_click = Some(DoubleClick {
                    button,
                    position: pos,
                });
                self.last_click = None;
            }
            _ => {
                self.last_click = Some(LastClick {
                    at,
                    button,
                    position: pos,
                });
            }
        }

        if !self.pressed.contains(&button) {
            self.pressed.push(button);
            self.newly_pressed.push(button);
        }
        self.drag_origin = Some((pos, button));
        self.press_target = hits.hit_test(pos.x, pos.y).map(|c| c.id);
    }

    /// Button released at `host`.
    pub fn pointer_up(&mut self, button: Button, host: Point) {
        let pos = self.to_surface(host);

        if let Some(drag) = self.current_drag
            && drag.button == button
        {
            tracing::debug!(button, "drag end");
            self.drag_end = Some(DragEvent::new(button, drag.start, pos));
            self.current_drag = None;
        }
        if self.drag_origin.is_some_and(|(_, b)| b == button) {
            self.drag_origin = None;
        }

        self.release(button);
    }

    /// The pointer left the surface: every held button is released and any drag ends at the
    /// last known position.
    pub fn pointer_leave(&mut self) {
        for button in std::mem::take(&mut self.pressed) {
            if !self.released.contains(&button) {
                self.released.push(button);
            }
        }
        if let Some(drag) = self.current_drag.take() {
            self.drag_end = Some(DragEvent::new(drag.button, drag.start, self.position));
        }
        self.drag_origin = None;
        self.under_pointer = None;
    }

    fn release(&mut self, button: Button) {
        self.pressed.retain(|b| *b != button);
        if !self.released.contains(&button) {
            self.released.push(button);
        }
    }

    fn refresh_under_pointer(&mut self, hits: &dyn HitTest) {
        let hit = hits.hit_test(self.position.x, self.position.y);
        let same = match (&self.under_pointer, &hit) {
            (Some(a), Some(b)) => a.id == b.id,
            (None, None) => true,
            _ => false,
        };
        if !same {
            self.under_pointer = hit;
        } else if let (Some(cur), Some(new)) = (&mut self.under_pointer, hit) {
            cur.bounds = new.bounds;
        }
    }

    /// Drop hover/press references to an instance that no longer exists.
    pub(crate) fn forget(&mut self, id: InstanceId) {
        if self.under_pointer.as_ref().is_some_and(|c| c.id == id) {
            self.under_pointer = None;
        }
        if self.press_target == Some(id) {
            self.press_target = None;
        }
    }

    /// Clear one-frame events. Runs once at the end of every frame tick.
    pub fn end_frame(&mut self) {
        self.newly_pressed.clear();
        self.released.clear();
        self.movement = None;
        self.double_click = None;
        self.drag_start = None;
        self.drag_end = None;
        self.drag_moved = false;
    }

    /// Pointer position in surface coordinates.
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn pressed_buttons(&self) -> &[Button] {
        &self.pressed
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed.contains(&button)
    }

    /// Buttons that went down during the current frame.
    pub fn newly_pressed(&self) -> &[Button] {
        &self.newly_pressed
    }

    /// Buttons that went up during the current frame.
    pub fn released_buttons(&self) -> &[Button] {
        &self.released
    }

    pub fn movement(&self) -> Option<Movement> {
        self.movement
    }

    pub fn double_click(&self) -> Option<DoubleClick> {
        self.double_click
    }

    pub fn is_dragging(&self) -> bool {
        self.current_drag.is_some()
    }

    pub fn current_drag(&self) -> Option<DragEvent> {
        self.current_drag
    }

    pub fn drag_start(&self) -> Option<DragEvent> {
        self.drag_start
    }

    pub fn drag_end(&self) -> Option<DragEvent> {
        self.drag_end
    }

    /// The current drag advanced during this frame.
    pub fn drag_moved(&self) -> bool {
        self.drag_moved
    }

    pub fn component_under_pointer(&self) -> Option<&ComponentInfo> {
        self.under_pointer.as_ref()
    }

    /// Instance hit by the most recent press.
    pub fn press_target(&self) -> Option<InstanceId> {
        self.press_target
    }
}

#[cfg(test)]
#[path = "../../tests/unit/input/pointer.rs"]
mod tests;
