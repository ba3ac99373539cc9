//! Drag-with-modifier gesture tracking
//!
//! [`GestureStateMachine`] consumes one input event at a time and answers
//! with the side effects the event loop must carry out: showing or hiding the
//! overlay, moving the hover highlight, and snapping a window on release.
//! It never talks to the X server itself; window lookups go through
//! [`WindowQuery`] so the whole path runs against fakes in tests.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::constants::mouse;
use crate::keysym::{Keysym, keysym_name};
use crate::types::{Point, WindowHandle, Zone};
use crate::zones::ZoneProfile;

/// Which point decides the target zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasisPoint {
    /// The pointer position
    #[default]
    Cursor,
    /// Midpoint of the dragged window frame's top edge
    Window,
}

impl FromStr for BasisPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cursor" => Ok(BasisPoint::Cursor),
            "window" => Ok(BasisPoint::Window),
            other => Err(format!("unknown basis point `{other}`, expected `cursor` or `window`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    pub trigger_keys: Vec<Keysym>,
    pub wait_for_window_movement: bool,
    pub basis_point: BasisPoint,
    pub highlight_hover_zone: bool,
}

/// One global input event, already translated to keysyms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyPress(Keysym),
    KeyRelease(Keysym),
    ButtonPress { button: u8, root: Point },
    ButtonRelease { button: u8, root: Point },
    Motion { root: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    ShowOverlay,
    HideOverlay,
    /// The highlighted snap target changed; `None` clears the highlight
    Hover(Option<Zone>),
    /// Snap `window` to whatever zone `basis` falls into
    Snap {
        window: Option<WindowHandle>,
        basis: Point,
    },
}

/// Window-system lookups the gesture path needs while an event is processed
pub trait WindowQuery {
    /// The focused client window, or `None` for the root or a desktop window
    fn active_window(&self) -> Option<WindowHandle>;

    /// Midpoint of the top edge of `window`'s frame in root coordinates.
    /// `None` when the window can no longer be queried.
    fn window_anchor(&self, window: WindowHandle) -> Option<Point>;
}

/// Everything a single event may consult besides the gesture state
pub struct GestureContext<'a, W: WindowQuery> {
    pub windows: &'a W,
    pub profile: &'a ZoneProfile,
    pub desktop: usize,
}

#[derive(Debug)]
pub struct GestureStateMachine {
    config: GestureConfig,
    active_keys: HashMap<Keysym, bool>,
    all_keys_down: bool,
    mouse_down: bool,
    active_window: Option<WindowHandle>,
    last_basis: Option<Point>,
    window_has_moved: bool,
    overlay_visible: bool,
    hover: Option<Zone>,
}

impl GestureStateMachine {
    pub fn new(config: GestureConfig) -> Self {
        let active_keys = config.trigger_keys.iter().map(|key| (*key, false)).collect();
        Self {
            config,
            active_keys,
            all_keys_down: false,
            mouse_down: false,
            active_window: None,
            last_basis: None,
            window_has_moved: false,
            overlay_visible: false,
            hover: None,
        }
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn all_keys_down(&self) -> bool {
        self.all_keys_down
    }

    pub fn active_window(&self) -> Option<WindowHandle> {
        self.active_window
    }

    /// Process one event to completion and return the resulting actions in
    /// the order they must be applied.
    pub fn handle<W: WindowQuery>(
        &mut self,
        event: InputEvent,
        ctx: &GestureContext<'_, W>,
    ) -> Vec<GestureAction> {
        let mut actions = Vec::new();

        match event {
            InputEvent::KeyPress(keysym) => self.update_key(keysym, true),
            InputEvent::KeyRelease(keysym) => self.update_key(keysym, false),
            InputEvent::ButtonPress { button, root } if button == mouse::BUTTON_LEFT => {
                self.mouse_down = true;
                // Taken before the window is recorded, so the drag starts from the pointer
                self.last_basis = Some(self.basis_point(root, ctx.windows));
                self.active_window = ctx.windows.active_window();
                debug!(window = ?self.active_window, basis = ?self.last_basis, "Drag started");
            }
            InputEvent::Motion { root } if self.active_window.is_some() => {
                let basis = self.basis_point(root, ctx.windows);
                if self.last_basis != Some(basis) {
                    self.last_basis = Some(basis);
                    self.window_has_moved = true;

                    if self.config.highlight_hover_zone {
                        let hover = ctx.profile.find_zone(ctx.desktop, basis).map(|hit| hit.target());
                        self.set_hover(hover, &mut actions);
                    }
                }
            }
            InputEvent::ButtonRelease { button, root } if button == mouse::BUTTON_LEFT => {
                self.mouse_down = false;
                let basis = self.basis_point(root, ctx.windows);

                if self.all_keys_down && (self.window_has_moved || !self.config.wait_for_window_movement) {
                    // The press reaches us before the window manager focuses the
                    // clicked window, so the target is read again now
                    let window = ctx.windows.active_window();
                    debug!(window = ?window, pressed = ?self.active_window, basis = ?basis, "Gesture completed, snapping");
                    actions.push(GestureAction::Snap { window, basis });
                }

                self.active_window = None;
                self.window_has_moved = false;
                self.last_basis = None;
                if self.config.highlight_hover_zone {
                    self.set_hover(None, &mut actions);
                }
            }
            _ => {}
        }

        self.update_overlay(&mut actions);
        actions
    }

    fn update_key(&mut self, keysym: Keysym, pressed: bool) {
        if let Some(down) = self.active_keys.get_mut(&keysym) {
            *down = pressed;
            self.all_keys_down = self.active_keys.values().all(|down| *down);
            trace!(
                key = keysym_name(keysym).unwrap_or("?"),
                pressed = pressed,
                all_keys_down = self.all_keys_down,
                "Trigger key"
            );
        }
    }

    /// The pointer, or the dragged window's anchor once a window is recorded
    /// and can still be queried
    fn basis_point<W: WindowQuery>(&self, root: Point, windows: &W) -> Point {
        match (self.config.basis_point, self.active_window) {
            (BasisPoint::Window, Some(window)) => windows.window_anchor(window).unwrap_or(root),
            _ => root,
        }
    }

    fn set_hover(&mut self, hover: Option<Zone>, actions: &mut Vec<GestureAction>) {
        if self.hover != hover {
            self.hover = hover;
            actions.push(GestureAction::Hover(hover));
        }
    }

    fn update_overlay(&mut self, actions: &mut Vec<GestureAction>) {
        let armed = self.mouse_down
            && self.all_keys_down
            && !(self.config.wait_for_window_movement && !self.window_has_moved);

        if armed && !self.overlay_visible {
            self.overlay_visible = true;
            actions.push(GestureAction::ShowOverlay);
        } else if !armed && self.overlay_visible {
            self.overlay_visible = false;
            actions.push(GestureAction::HideOverlay);
        }
    }
}
