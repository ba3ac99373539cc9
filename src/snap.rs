//! Resolve a finished gesture into a window move

use anyhow::Result;
use tracing::{debug, info};

use crate::types::{FrameExtents, Orientation, Point, Rect, WindowHandle, Zone};
use crate::zones::ZoneProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapConfig {
    /// Also ask the window manager to maximize along the axis the zone spans
    /// fully, which keeps stubborn windows from rounding their size down
    pub maximize_perpendicular_axis: bool,
}

/// Window-system operations needed to place a window
pub trait WindowMover {
    /// Decoration insets of `window`; all zero when the window manager
    /// doesn't report any
    fn frame_extents(&self, window: WindowHandle) -> Result<FrameExtents>;

    /// Move the frame's top-left corner to `(x, y)` and resize the client
    /// area to `width` x `height`
    fn move_resize(&self, window: WindowHandle, client: Rect) -> Result<()>;

    /// Request `_NET_WM_STATE` maximization perpendicular to a zone of
    /// `orientation`
    fn maximize_axis(&self, window: WindowHandle, orientation: Orientation) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapOutcome {
    Applied { window: WindowHandle, target: Zone },
    Noop,
}

/// Place `window` into the zone containing `basis` on `desktop`.
///
/// A hit on a merge zone places the window over the merged surface. Window
/// system failures are logged at debug level and reported as a no-op, since
/// the window may legitimately have gone away during the drag.
pub fn resolve<M: WindowMover>(
    profile: &ZoneProfile,
    desktop: usize,
    window: Option<WindowHandle>,
    basis: Point,
    mover: &M,
    config: &SnapConfig,
) -> SnapOutcome {
    let Some(window) = window else {
        debug!(basis = ?basis, "No window to snap");
        return SnapOutcome::Noop;
    };
    let Some(hit) = profile.find_zone(desktop, basis) else {
        debug!(desktop = desktop, basis = ?basis, "Basis point outside every zone");
        return SnapOutcome::Noop;
    };
    let target = hit.target();
    debug!(window = window, probe = ?hit.probe(), target = ?target.rect, "Resolved snap target");

    match apply(window, target, mover, config) {
        Ok(()) => {
            info!(window = window, zone = ?target.rect, "Snapped window to zone");
            SnapOutcome::Applied { window, target }
        }
        Err(e) => {
            debug!(window = window, error = %e, "Failed to snap window, ignoring");
            SnapOutcome::Noop
        }
    }
}

fn apply<M: WindowMover>(window: WindowHandle, target: Zone, mover: &M, config: &SnapConfig) -> Result<()> {
    let extents = mover.frame_extents(window).unwrap_or_else(|e| {
        debug!(window = window, error = %e, "No frame extents, assuming none");
        FrameExtents::default()
    });

    mover.move_resize(window, client_rect(target.rect, extents))?;

    if config.maximize_perpendicular_axis {
        mover.maximize_axis(window, target.orientation)?;
    }
    Ok(())
}

/// Client geometry whose frame exactly covers `zone`
pub fn client_rect(zone: Rect, extents: FrameExtents) -> Rect {
    Rect::new(
        zone.x,
        zone.y,
        (zone.width - extents.left - extents.right).max(1),
        (zone.height - extents.top - extents.bottom).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DisplaySpec, ZoneSpec};
    use crate::types::{Monitor, WorkArea};
    use anyhow::anyhow;
    use std::cell::RefCell;

    #[derive(Debug, PartialEq)]
    enum Call {
        MoveResize(WindowHandle, Rect),
        Maximize(WindowHandle, Orientation),
    }

    #[derive(Default)]
    struct FakeMover {
        extents: Option<FrameExtents>,
        fail_move: bool,
        calls: RefCell<Vec<Call>>,
    }

    impl WindowMover for FakeMover {
        fn frame_extents(&self, _window: WindowHandle) -> Result<FrameExtents> {
            self.extents.ok_or_else(|| anyhow!("BadWindow"))
        }

        fn move_resize(&self, window: WindowHandle, client: Rect) -> Result<()> {
            if self.fail_move {
                return Err(anyhow!("BadWindow"));
            }
            self.calls.borrow_mut().push(Call::MoveResize(window, client));
            Ok(())
        }

        fn maximize_axis(&self, window: WindowHandle, orientation: Orientation) -> Result<()> {
            self.calls.borrow_mut().push(Call::Maximize(window, orientation));
            Ok(())
        }
    }

    fn profile() -> ZoneProfile {
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
            &[vec![WorkArea::new(0, 0, 1000, 500)]],
            &ZoneSpec::new(vec![DisplaySpec::landscape(vec![10.0, 80.0, 10.0])]),
            10.0,
        )
        .unwrap()
    }

    #[test]
    fn test_snaps_to_primary_zone() {
        let mover = FakeMover { extents: Some(FrameExtents::default()), ..Default::default() };
        let outcome = resolve(&profile(), 0, Some(7), Point::new(500, 250), &mover, &SnapConfig::default());

        assert_eq!(
            outcome,
            SnapOutcome::Applied { window: 7, target: Zone::new(100, 0, 800, 500, Orientation::Landscape) }
        );
        assert_eq!(*mover.calls.borrow(), vec![Call::MoveResize(7, Rect::new(100, 0, 800, 500))]);
    }

    #[test]
    fn test_merge_zone_snaps_to_surface() {
        let mover = FakeMover { extents: Some(FrameExtents::default()), ..Default::default() };
        resolve(&profile(), 0, Some(7), Point::new(120, 10), &mover, &SnapConfig::default());

        assert_eq!(*mover.calls.borrow(), vec![Call::MoveResize(7, Rect::new(0, 0, 900, 500))]);
    }

    #[test]
    fn test_frame_extents_shrink_client() {
        let extents = FrameExtents { left: 2, right: 2, top: 30, bottom: 4 };
        let mover = FakeMover { extents: Some(extents), ..Default::default() };
        resolve(&profile(), 0, Some(7), Point::new(500, 250), &mover, &SnapConfig::default());

        assert_eq!(*mover.calls.borrow(), vec![Call::MoveResize(7, Rect::new(100, 0, 796, 466))]);
    }

    #[test]
    fn test_missing_extents_treated_as_zero() {
        let mover = FakeMover::default();
        let outcome = resolve(&profile(), 0, Some(7), Point::new(950, 10), &mover, &SnapConfig::default());

        assert!(matches!(outcome, SnapOutcome::Applied { .. }));
        assert_eq!(*mover.calls.borrow(), vec![Call::MoveResize(7, Rect::new(100, 0, 900, 500))]);
    }

    #[test]
    fn test_maximize_hint_follows_zone_orientation() {
        let mover = FakeMover { extents: Some(FrameExtents::default()), ..Default::default() };
        let config = SnapConfig { maximize_perpendicular_axis: true };
        resolve(&profile(), 0, Some(7), Point::new(500, 250), &mover, &config);

        assert_eq!(
            *mover.calls.borrow(),
            vec![
                Call::MoveResize(7, Rect::new(100, 0, 800, 500)),
                Call::Maximize(7, Orientation::Landscape),
            ]
        );
    }

    #[test]
    fn test_noop_without_window_or_zone() {
        let mover = FakeMover::default();
        let profile = profile();

        assert_eq!(
            resolve(&profile, 0, None, Point::new(500, 250), &mover, &SnapConfig::default()),
            SnapOutcome::Noop
        );
        assert_eq!(
            resolve(&profile, 0, Some(7), Point::new(5000, 250), &mover, &SnapConfig::default()),
            SnapOutcome::Noop
        );
        assert!(mover.calls.borrow().is_empty());
    }

    #[test]
    fn test_window_errors_are_swallowed() {
        let mover = FakeMover { fail_move: true, ..Default::default() };
        let config = SnapConfig { maximize_perpendicular_axis: true };

        assert_eq!(
            resolve(&profile(), 0, Some(7), Point::new(500, 250), &mover, &config),
            SnapOutcome::Noop
        );
        assert!(mover.calls.borrow().is_empty());
    }

    #[test]
    fn test_client_rect_never_collapses() {
        let extents = FrameExtents { left: 50, right: 50, top: 50, bottom: 50 };
        assert_eq!(client_rect(Rect::new(0, 0, 60, 60), extents), Rect::new(0, 0, 1, 1));
    }
}
