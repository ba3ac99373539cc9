//! Zone layout engine: primary zones, merge zones and the per-desktop profile

mod layout;
mod merge;
mod profile;

pub use layout::compute_zones;
pub use merge::compute_merge_zones;
pub use profile::{DesktopZones, SharedProfile, ZoneProfile};
