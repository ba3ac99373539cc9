//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// X11 protocol constants
pub mod x11 {
    /// ARGB color depth (32-bit: 8 bits each for Alpha, Red, Green, Blue)
    pub const ARGB_DEPTH: u8 = 32;

    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// Source indication for EWMH client messages (2 = pager/direct user action)
    pub const SOURCE_INDICATION_PAGER: u32 = 2;

    /// `_NET_WM_STATE` action: add the property
    pub const NET_WM_STATE_ADD: u32 = 1;

    /// Opacity used when no ARGB visual is available for the overlay
    pub const FALLBACK_OVERLAY_OPACITY: u32 = 0x9999_9999;

    /// Number of CARDINALs per work area entry (x, y, width, height)
    pub const WORK_AREA_STRIDE: usize = 4;

    /// Number of CARDINALs in `_NET_FRAME_EXTENTS` (left, right, top, bottom)
    pub const FRAME_EXTENTS_LEN: usize = 4;
}

/// EWMH / GTK property names
pub mod atoms {
    pub const NET_CURRENT_DESKTOP: &str = "_NET_CURRENT_DESKTOP";
    pub const NET_NUMBER_OF_DESKTOPS: &str = "_NET_NUMBER_OF_DESKTOPS";
    pub const NET_WORKAREA: &str = "_NET_WORKAREA";
    pub const GTK_WORKAREAS_PREFIX: &str = "_GTK_WORKAREAS_D";
    pub const NET_WORKAREAS_PREFIX: &str = "_NET_WORKAREAS_D";
}

/// Mouse button constants
pub mod mouse {
    /// Left mouse button number
    pub const BUTTON_LEFT: u8 = 1;
}

/// Merge zone sizing limits (percent of the work area)
pub mod merge {
    pub const MIN_SIZE_PERCENT: f64 = 2.0;
    pub const MAX_SIZE_PERCENT: f64 = 25.0;
}

/// Configuration file location
pub mod config {
    /// Application directory name under the XDG config/runtime dirs
    pub const APP_DIR: &str = "snapzones";

    /// Settings filename
    pub const FILENAME: &str = "config.toml";

    /// PID filename
    pub const PID_FILENAME: &str = "snapzones.pid";

    /// Environment variable prefix for overrides
    pub const ENV_PREFIX: &str = "SNAPZONES_";
}

/// Validation limits applied after loading settings
pub mod validation {
    pub const MAX_MERGE_ZONE_SIZE: f64 = 25.0;
    pub const MIN_DEBOUNCE_MS: u64 = 50;
    pub const MAX_DEBOUNCE_MS: u64 = 2000;
    pub const MAX_BORDER_THICKNESS: u16 = 100;
    pub const MAX_INSET: u16 = 500;
}

/// Layout watcher tuning
pub mod watcher {
    /// Capacity of the "layout dirty" channel; a full channel means a rebuild
    /// is already pending
    pub const SIGNAL_CAPACITY: usize = 8;
}

/// Overlay thread tuning
pub mod overlay {
    /// How long the overlay thread waits for a command before checking for
    /// Expose events
    pub const EVENT_POLL_MS: u64 = 30;

    /// WM_CLASS of the overlay window
    pub const WM_CLASS: &[u8] = b"snapzones\0snapzones\0";
}
