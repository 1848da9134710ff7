use std::rc::Rc;

use crate::foundation::core::Point;
use crate::foundation::hook::Hook;
use crate::input::pointer::{Button, DragEvent, PointerPipeline, buttons};
use crate::reconcile::arena::InstanceArena;

type PointHook = Hook<dyn Fn(Point)>;
type ButtonHook = Hook<dyn Fn(Button, Point)>;
type DragHook = Hook<dyn Fn(&DragEvent)>;

/// Pointer callbacks attached to an element's subtree.
///
/// An instance counts as hovered while the component under the pointer is the instance itself
/// or one of its descendants.
#[derive(Clone, Debug)]
pub struct Interactive {
    pub(crate) enabled: bool,
    on_left_click: Option<PointHook>,
    on_right_click: Option<PointHook>,
    on_middle_click: Option<PointHook>,
    on_double_click: Option<ButtonHook>,
    on_drag_start: Option<DragHook>,
    on_drag: Option<DragHook>,
    on_drag_end: Option<DragHook>,
    on_mouse_enter: Option<PointHook>,
    on_mouse_leave: Option<PointHook>,
    on_mouse_move: Option<PointHook>,
    on_button_press: Option<ButtonHook>,
    on_button_release: Option<ButtonHook>,
    on_buttons_change: Option<Hook<dyn Fn(&[Button], Point)>>,
}

impl Default for Interactive {
    fn default() -> Self {
        Self {
            enabled: true,
            on_left_click: None,
            on_right_click: None,
            on_middle_click: None,
            on_double_click: None,
            on_drag_start: None,
            on_drag: None,
            on_drag_end: None,
            on_mouse_enter: None,
            on_mouse_leave: None,
            on_mouse_move: None,
            on_button_press: None,
            on_button_release: None,
            on_buttons_change: None,
        }
    }
}

fn point_hook(f: impl Fn(Point) + 'static) -> Option<PointHook> {
    let f: Rc<dyn Fn(Point)> = Rc::new(f);
    Some(Hook(f))
}

fn button_hook(f: impl Fn(Button, Point) + 'static) -> Option<ButtonHook> {
    let f: Rc<dyn Fn(Button, Point)> = Rc::new(f);
    Some(Hook(f))
}

fn drag_hook(f: impl Fn(&DragEvent) + 'static) -> Option<DragHook> {
    let f: Rc<dyn Fn(&DragEvent)> = Rc::new(f);
    Some(Hook(f))
}

impl Interactive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disabled handlers receive nothing except a final mouse-leave.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn on_left_click(mut self, f: impl Fn(Point) + 'static) -> Self {
        self.on_left_click = point_hook(f);
        self
    }

    pub fn on_right_click(mut self, f: impl Fn(Point) + 'static) -> Self {
        self.on_right_click = point_hook(f);
        self
    }

    pub fn on_middle_click(mut self, f: impl Fn(Point) + 'static) -> Self {
        self.on_middle_click = point_hook(f);
        self
    }

    pub fn on_double_click(mut self, f: impl Fn(Button, Point) + 'static) -> Self {
        self.on_double_click = button_hook(f);
        self
    }

    pub fn on_drag_start(mut self, f: impl Fn(&DragEvent) + 'static) -> Self {
        self.on_drag_start = drag_hook(f);
        self
    }

    pub fn on_drag(mut self, f: impl Fn(&DragEvent) + 'static) -> Self {
        self.on_drag = drag_hook(f);
        self
    }

    pub fn on_drag_end(mut self, f: impl Fn(&DragEvent) + 'static) -> Self {
        self.on_drag_end = drag_hook(f);
        self
    }

    pub fn on_mouse_enter(mut self, f: impl Fn(Point) + 'static) -> Self {
        self.on_mouse_enter = point_hook(f);
        self
    }

    pub fn on_mouse_leave(mut self, f: impl Fn(Point) + 'static) -> Self {
        self.on_mouse_leave = point_hook(f);
        self
    }

    pub fn on_mouse_move(mut self, f: impl Fn(Point) + 'static) -> Self {
        self.on_mouse_move = point_hook(f);
        self
    }

    pub fn on_button_press(mut self, f: impl Fn(Button, Point) + 'static) -> Self {
        self.on_button_press = button_hook(f);
        self
    }

    pub fn on_button_release(mut self, f: impl Fn(Button, Point) + 'static) -> Self {
        self.on_button_release = button_hook(f);
        self
    }

    pub fn on_buttons_change(mut self, f: impl Fn(&[Button], Point) + 'static) -> Self {
        let f: Rc<dyn Fn(&[Button], Point)> = Rc::new(f);
        self.on_buttons_change = Some(Hook(f));
        self
    }
}

/// Per-instance routing state, kept across frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InteractionState {
    pub hovered: bool,
    /// A drag began inside this instance's subtree and has not ended yet.
    pub dragging: bool,
}

fn call(hook: &Option<PointHook>, at: Point) {
    if let Some(f) = hook {
        f(at);
    }
}

/// Deliver the current frame's pointer state to every interactive instance.
///
/// Returns how many instances received at least one callback.
pub(crate) fn dispatch(arena: &mut InstanceArena, pointer: &PointerPipeline) -> usize {
    let under = pointer.component_under_pointer().map(|c| c.id);
    let pos = pointer.position();
    let targets: Vec<_> = arena
        .iter()
        .filter(|(_, inst)| inst.interactive.is_some())
        .map(|(id, _)| id)
        .collect();

    let mut touched = 0;
    for id in targets {
        let over = under.is_some_and(|hit| arena.is_self_or_ancestor(id, hit));
        let press_inside = pointer
            .press_target()
            .is_some_and(|hit| arena.is_self_or_ancestor(id, hit));
        let Some(inst) = arena.get_mut(id) else {
            continue;
        };
        let Some(handlers) = inst.interactive.clone() else {
            continue;
        };
        let mut state = inst.interaction;
        let mut fired = false;

        // Hover transitions.
        if !handlers.enabled || !over {
            if state.hovered {
                state.hovered = false;
                call(&handlers.on_mouse_leave, pos);
                fired = true;
            }
        } else if !state.hovered {
            state.hovered = true;
            call(&handlers.on_mouse_enter, pos);
            fired = true;
        }

        if handlers.enabled {
            if state.hovered {
                if pointer.movement().is_some() {
                    call(&handlers.on_mouse_move, pos);
                    fired = true;
                }

                for &button in pointer.released_buttons() {
                    let hook = match button {
                        buttons::LEFT => handlers.on_left_click.as_ref(),
                        buttons::RIGHT => handlers.on_right_click.as_ref(),
                        buttons::MIDDLE => handlers.on_middle_click.as_ref(),
                        _ => None,
                    };
                    if let Some(f) = hook {
                        f(pos);
                    }
                    fired = true;
                }

                if let Some(f) = &handlers.on_button_press {
                    for &button in pointer.newly_pressed() {
                        f(button, pos);
                        fired = true;
                    }
                }
                if let Some(f) = &handlers.on_button_release {
                    for &button in pointer.released_buttons() {
                        f(button, pos);
                        fired = true;
                    }
                }
                if let Some(f) = &handlers.on_buttons_change
                    && !(pointer.newly_pressed().is_empty()
                        && pointer.released_buttons().is_empty())
                {
                    f(pointer.pressed_buttons(), pos);
                    fired = true;
                }

                if let Some(dc) = pointer.double_click()
                    && let Some(f) = &handlers.on_double_click
                {
                    f(dc.button, dc.position);
                    fired = true;
                }
            }

            if let Some(ev) = pointer.drag_start()
                && press_inside
            {
                state.dragging = true;
                if let Some(f) = &handlers.on_drag_start {
                    f(&ev);
                }
                fired = true;
            }

            if let Some(ev) = pointer.drag_end()
                && state.dragging
            {
                state.dragging = false;
                if let Some(f) = &handlers.on_drag_end {
                    f(&ev);
                }
                fired = true;
            }

            if state.dragging
                && pointer.drag_moved()
                && let Some(ev) = pointer.current_drag()
                && let Some(f) = &handlers.on_drag
            {
                f(&ev);
                fired = true;
            }
        } else {
            state.dragging = false;
        }

        if let Some(inst) = arena.get_mut(id) {
            inst.interaction = state;
        }
        if fired {
            touched += 1;
        }
    }
    touched
}

#[cfg(test)]
#[path = "../../tests/unit/input/interactive.rs"]
mod tests;
