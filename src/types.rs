//! Geometry and zone records shared by the layout engine, the gesture path
//! and the X11 adapters.

use serde::{Deserialize, Serialize};

/// X11 window id of a client window
pub type WindowHandle = x11rb::protocol::xproto::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in root-window pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Inclusive on all four edges, so a point on a shared edge matches both
    /// neighbours and the caller's iteration order decides.
    pub fn contains(&self, point: Point) -> bool {
        self.left() <= point.x
            && point.x <= self.right()
            && self.top() <= point.y
            && point.y <= self.bottom()
    }

    /// Area of the overlap with `other`, zero when disjoint
    pub fn intersection_area(&self, other: &Rect) -> i64 {
        let width = (self.right().min(other.right()) - self.left().max(other.left())).max(0);
        let height = (self.bottom().min(other.bottom()) - self.top().max(other.top())).max(0);
        width as i64 * height as i64
    }

    /// Shrink by `inset` on every side, never below zero size
    pub fn inset(&self, inset: i32) -> Rect {
        Rect {
            x: self.x + inset,
            y: self.y + inset,
            width: (self.width - inset * 2).max(0),
            height: (self.height - inset * 2).max(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Orientation implied by resolved dimensions. Rotation flags are not
    /// consulted since virtual outputs can report portrait modes with a
    /// landscape rotation.
    pub fn from_dimensions(width: i32, height: i32) -> Self {
        if width >= height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Landscape => f.write_str("landscape"),
            Orientation::Portrait => f.write_str("portrait"),
        }
    }
}

/// A primary snap target occupying part of one display's work area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Zone {
    #[serde(flatten)]
    pub rect: Rect,
    /// Orientation of the monitor the zone was cut from
    pub orientation: Orientation,
}

impl Zone {
    pub fn new(x: i32, y: i32, width: i32, height: i32, orientation: Orientation) -> Self {
        Self {
            rect: Rect::new(x, y, width, height),
            orientation,
        }
    }
}

/// Index of a primary zone within one desktop's zone list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ZoneId(pub usize);

/// Probe region straddling the boundary of two adjacent zones. Hitting the
/// probe snaps to `surface`, the union of both zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeZone {
    pub probe: Rect,
    pub orientation: Orientation,
    pub zones: (ZoneId, ZoneId),
    pub surface: Zone,
}

/// Result of a point query against a desktop's zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ZoneHit {
    Primary(Zone),
    Merge(MergeZone),
}

impl ZoneHit {
    /// The rectangle that matched the query
    pub fn probe(&self) -> Rect {
        match self {
            ZoneHit::Primary(zone) => zone.rect,
            ZoneHit::Merge(merge) => merge.probe,
        }
    }

    /// The rectangle a window should be snapped to
    pub fn target(&self) -> Zone {
        match self {
            ZoneHit::Primary(zone) => *zone,
            ZoneHit::Merge(merge) => merge.surface,
        }
    }
}

/// One enabled RandR output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Monitor {
    pub virtual_x: i32,
    pub virtual_y: i32,
    pub virtual_width: i32,
    pub virtual_height: i32,
    /// Native mode resolution, already corrected for rotation
    pub width: i32,
    pub height: i32,
    /// `virtual_width / width`
    pub scale: f64,
    /// Raw RandR rotation bits, informational only
    pub rotation: u16,
}

impl Monitor {
    pub fn orientation(&self) -> Orientation {
        Orientation::from_dimensions(self.width, self.height)
    }

    pub fn virtual_rect(&self) -> Rect {
        Rect::new(
            self.virtual_x,
            self.virtual_y,
            self.virtual_width,
            self.virtual_height,
        )
    }
}

/// Usable rectangle of one monitor on one virtual desktop, panels excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkArea {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WorkArea {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// `_NET_FRAME_EXTENTS` insets; all zero when the property is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameExtents {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive_on_edges() {
        let rect = Rect::new(10, 20, 100, 50);
        assert!(rect.contains(Point::new(10, 20)));
        assert!(rect.contains(Point::new(110, 70)));
        assert!(rect.contains(Point::new(110, 20)));
        assert!(!rect.contains(Point::new(111, 20)));
        assert!(!rect.contains(Point::new(9, 40)));
        assert!(!rect.contains(Point::new(50, 71)));
    }

    #[test]
    fn test_orientation_from_dimensions() {
        assert_eq!(Orientation::from_dimensions(1920, 1080), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(1080, 1920), Orientation::Portrait);
        // Square displays count as landscape
        assert_eq!(Orientation::from_dimensions(1000, 1000), Orientation::Landscape);
    }

    #[test]
    fn test_zone_hit_target_uses_surface_for_merge() {
        let left = Zone::new(0, 0, 100, 500, Orientation::Landscape);
        let merge = MergeZone {
            probe: Rect::new(50, 0, 100, 500),
            orientation: Orientation::Landscape,
            zones: (ZoneId(0), ZoneId(1)),
            surface: Zone::new(0, 0, 900, 500, Orientation::Landscape),
        };

        assert_eq!(ZoneHit::Primary(left).target(), left);
        assert_eq!(ZoneHit::Merge(merge).target(), merge.surface);
        assert_eq!(ZoneHit::Merge(merge).probe(), merge.probe);
    }

    #[test]
    fn test_intersection_area() {
        let a = Rect::new(0, 0, 100, 100);
        assert_eq!(a.intersection_area(&Rect::new(50, 50, 100, 100)), 2500);
        assert_eq!(a.intersection_area(&Rect::new(100, 0, 100, 100)), 0);
        assert_eq!(a.intersection_area(&Rect::new(300, 300, 10, 10)), 0);
    }

    #[test]
    fn test_inset_never_goes_negative() {
        let rect = Rect::new(0, 0, 6, 40);
        assert_eq!(rect.inset(5), Rect::new(5, 5, 0, 30));
    }
}
