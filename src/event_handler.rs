use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;

use tracing::{trace, warn};

use crate::gesture::{GestureAction, GestureContext, GestureStateMachine, InputEvent, WindowQuery};
use crate::overlay::OverlayCommand;
use crate::snap::{self, SnapConfig, SnapOutcome, WindowMover};
use crate::zones::SharedProfile;

/// Drives the gesture state machine from recorded input and carries out
/// the actions it returns. Runs on the input thread; the overlay is only
/// ever reached through its command channel.
pub struct GestureHandler<W> {
    machine: GestureStateMachine,
    windows: W,
    profile: Arc<SharedProfile>,
    desktop: Arc<AtomicUsize>,
    overlay: Sender<OverlayCommand>,
    snap: SnapConfig,
}

impl<W: WindowQuery + WindowMover> GestureHandler<W> {
    pub fn new(
        machine: GestureStateMachine,
        windows: W,
        profile: Arc<SharedProfile>,
        desktop: Arc<AtomicUsize>,
        overlay: Sender<OverlayCommand>,
        snap: SnapConfig,
    ) -> Self {
        Self {
            machine,
            windows,
            profile,
            desktop,
            overlay,
            snap,
        }
    }

    /// Handle one input event. Returns the snap result when the event
    /// finished a gesture.
    pub fn handle_event(&mut self, event: InputEvent) -> Option<SnapOutcome> {
        // One snapshot per event; a concurrent rebuild takes effect on the
        // next event
        let profile = self.profile.load();
        let desktop = self.desktop.load(Ordering::Acquire);
        let ctx = GestureContext {
            windows: &self.windows,
            profile: &profile,
            desktop,
        };

        let mut outcome = None;
        for action in self.machine.handle(event, &ctx) {
            trace!(action = ?action, "Gesture action");
            match action {
                GestureAction::ShowOverlay => self.send(OverlayCommand::Show),
                GestureAction::HideOverlay => self.send(OverlayCommand::Hide),
                GestureAction::Hover(zone) => self.send(OverlayCommand::SetHover(zone)),
                GestureAction::Snap { window, basis } => {
                    outcome = Some(snap::resolve(&profile, desktop, window, basis, &self.windows, &self.snap));
                }
            }
        }
        outcome
    }

    fn send(&self, command: OverlayCommand) {
        if let Err(e) = self.overlay.send(command) {
            warn!(command = ?e.0, "Overlay thread is gone, dropping command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DisplaySpec, ZoneSpec};
    use crate::gesture::{BasisPoint, GestureConfig};
    use crate::keysym::Keysym;
    use crate::types::{FrameExtents, Monitor, Orientation, Point, Rect, WindowHandle, WorkArea, Zone};
    use crate::zones::ZoneProfile;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::sync::mpsc::{Receiver, channel};

    const ALT_L: Keysym = 0xffe9;
    const WINDOW: WindowHandle = 0x0260_0003;

    #[derive(Default)]
    struct FakeWindows {
        moves: RefCell<Vec<(WindowHandle, Rect)>>,
    }

    impl WindowQuery for FakeWindows {
        fn active_window(&self) -> Option<WindowHandle> {
            Some(WINDOW)
        }

        fn window_anchor(&self, _window: WindowHandle) -> Option<Point> {
            None
        }
    }

    impl WindowMover for FakeWindows {
        fn frame_extents(&self, _window: WindowHandle) -> Result<FrameExtents> {
            Ok(FrameExtents::default())
        }

        fn move_resize(&self, window: WindowHandle, client: Rect) -> Result<()> {
            self.moves.borrow_mut().push((window, client));
            Ok(())
        }

        fn maximize_axis(&self, _window: WindowHandle, _orientation: Orientation) -> Result<()> {
            Ok(())
        }
    }

    fn profile(weights: Vec<f64>) -> ZoneProfile {
        let monitor = Monitor {
            virtual_x: 0,
            virtual_y: 0,
            virtual_width: 1000,
            virtual_height: 500,
            width: 1000,
            height: 500,
            scale: 1.0,
            rotation: 1,
        };
        ZoneProfile::build(
            &[monitor],
            &[vec![WorkArea::new(0, 0, 1000, 500)], vec![WorkArea::new(0, 0, 1000, 500)]],
            &ZoneSpec::new(vec![DisplaySpec::landscape(weights)]),
            10.0,
        )
        .unwrap()
    }

    fn handler(profile: Arc<SharedProfile>, desktop: Arc<AtomicUsize>) -> (GestureHandler<FakeWindows>, Receiver<OverlayCommand>) {
        let (sender, receiver) = channel();
        let machine = GestureStateMachine::new(GestureConfig {
            trigger_keys: vec![ALT_L],
            wait_for_window_movement: false,
            basis_point: BasisPoint::Cursor,
            highlight_hover_zone: true,
        });
        let handler = GestureHandler::new(
            machine,
            FakeWindows::default(),
            profile,
            desktop,
            sender,
            SnapConfig::default(),
        );
        (handler, receiver)
    }

    fn press(x: i32, y: i32) -> InputEvent {
        InputEvent::ButtonPress { button: 1, root: Point::new(x, y) }
    }

    fn release(x: i32, y: i32) -> InputEvent {
        InputEvent::ButtonRelease { button: 1, root: Point::new(x, y) }
    }

    #[test]
    fn test_full_gesture_snaps_and_drives_overlay() {
        let shared = Arc::new(SharedProfile::new(profile(vec![10.0, 80.0, 10.0])));
        let (mut handler, overlay) = handler(shared, Arc::new(AtomicUsize::new(0)));

        assert_eq!(handler.handle_event(InputEvent::KeyPress(ALT_L)), None);
        assert_eq!(handler.handle_event(press(300, 200)), None);
        assert_eq!(handler.handle_event(InputEvent::Motion { root: Point::new(120, 10) }), None);
        let outcome = handler.handle_event(release(120, 10));

        // (120, 10) lies in the merge zone between the first two zones
        let merged = Zone::new(0, 0, 900, 500, Orientation::Landscape);
        assert_eq!(outcome, Some(SnapOutcome::Applied { window: WINDOW, target: merged }));
        assert_eq!(*handler.windows.moves.borrow(), vec![(WINDOW, Rect::new(0, 0, 900, 500))]);

        let commands: Vec<_> = overlay.try_iter().collect();
        assert_eq!(
            commands,
            vec![
                OverlayCommand::Show,
                OverlayCommand::SetHover(Some(merged)),
                OverlayCommand::SetHover(None),
                OverlayCommand::Hide,
            ]
        );
    }

    #[test]
    fn test_release_without_keys_does_not_snap() {
        let shared = Arc::new(SharedProfile::new(profile(vec![50.0, 50.0])));
        let (mut handler, overlay) = handler(shared, Arc::new(AtomicUsize::new(0)));

        handler.handle_event(press(300, 200));
        assert_eq!(handler.handle_event(release(700, 200)), None);
        assert!(handler.windows.moves.borrow().is_empty());
        assert!(!overlay.try_iter().any(|c| c == OverlayCommand::Show));
    }

    #[test]
    fn test_uses_swapped_profile_and_current_desktop() {
        let shared = Arc::new(SharedProfile::new(profile(vec![50.0, 50.0])));
        let desktop = Arc::new(AtomicUsize::new(0));
        let (mut handler, _overlay) = handler(Arc::clone(&shared), Arc::clone(&desktop));

        shared.store(profile(vec![25.0, 75.0]));
        desktop.store(1, Ordering::Release);

        handler.handle_event(InputEvent::KeyPress(ALT_L));
        handler.handle_event(press(500, 200));
        let outcome = handler.handle_event(release(500, 200));
        assert_eq!(
            outcome,
            Some(SnapOutcome::Applied {
                window: WINDOW,
                target: Zone::new(250, 0, 750, 500, Orientation::Landscape),
            })
        );
    }

    #[test]
    fn test_dead_overlay_does_not_stop_snapping() {
        let shared = Arc::new(SharedProfile::new(profile(vec![50.0, 50.0])));
        let (mut handler, overlay) = handler(shared, Arc::new(AtomicUsize::new(0)));
        drop(overlay);

        handler.handle_event(InputEvent::KeyPress(ALT_L));
        handler.handle_event(press(100, 200));
        let outcome = handler.handle_event(release(100, 200));
        assert!(matches!(outcome, Some(SnapOutcome::Applied { .. })));
    }
}
