//! Configuration: the settings file and the zone layout it declares

pub mod settings;
pub mod zone_spec;

pub use settings::{OverlaySettings, Settings};
pub use zone_spec::{DisplaySpec, ZoneSpec, default_displays};
