//! User settings file
//!
//! Every key has a default, so a partial file is fine. Values are resolved
//! in three layers: file, then `SNAPZONES_*` environment overrides, then
//! validation with clamping. The result is turned once into the immutable
//! per-component configs; nothing reads [`Settings`] at event time.

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use x11rb::protocol::render::Color;

use crate::color::HexColor;
use crate::config::zone_spec::{DisplaySpec, ZoneSpec, default_displays};
use crate::constants::config::{APP_DIR, ENV_PREFIX, FILENAME};
use crate::error::ConfigError;
use crate::gesture::{BasisPoint, GestureConfig};
use crate::keysym::resolve_trigger_keys;
use crate::overlay::{OverlayStyle, RegionStyle};
use crate::snap::SnapConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    /// Keysym names that must all be held while dragging
    pub trigger_keys: Vec<String>,
    pub wait_for_window_movement: bool,
    pub snap_basis_point: BasisPoint,
    /// Merge probe size in percent of the work area, `0` disables
    pub merge_zone_size_preference: f64,
    pub highlight_hover_zone: bool,
    pub maximize_perpendicular_axis_on_snap: bool,
    pub layout_debounce_ms: u64,
    pub overlay: OverlaySettings,
    pub displays: Vec<DisplaySpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            trigger_keys: vec!["Alt_L".to_string()],
            wait_for_window_movement: true,
            snap_basis_point: BasisPoint::Cursor,
            merge_zone_size_preference: 7.0,
            highlight_hover_zone: true,
            maximize_perpendicular_axis_on_snap: false,
            layout_debounce_ms: 200,
            overlay: OverlaySettings::default(),
            displays: default_displays(),
        }
    }
}

/// Overlay colours as `#AARRGGBB` strings, sizes in pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub backdrop: String,
    pub zone_background: String,
    pub zone_background_inset: u16,
    pub zone_border: String,
    pub zone_border_inset: u16,
    pub zone_border_thickness: u16,
    pub hover_background: String,
    pub hover_background_inset: u16,
    pub hover_border: String,
    pub hover_border_inset: u16,
    pub hover_border_thickness: u16,
}

const DEFAULT_BACKDROP: u32 = 0x3333_3333;
const DEFAULT_ZONE_BACKGROUND: u32 = 0x3399_99FF;
const DEFAULT_ZONE_BORDER: u32 = 0xCC66_66CC;
const DEFAULT_HOVER_BACKGROUND: u32 = 0x99CC_0099;
const DEFAULT_HOVER_BORDER: u32 = 0xE6CC_0099;

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            backdrop: HexColor::from_argb32(DEFAULT_BACKDROP).to_hex_string(),
            zone_background: HexColor::from_argb32(DEFAULT_ZONE_BACKGROUND).to_hex_string(),
            zone_background_inset: 0,
            zone_border: HexColor::from_argb32(DEFAULT_ZONE_BORDER).to_hex_string(),
            zone_border_inset: 5,
            zone_border_thickness: 5,
            hover_background: HexColor::from_argb32(DEFAULT_HOVER_BACKGROUND).to_hex_string(),
            hover_background_inset: 0,
            hover_border: HexColor::from_argb32(DEFAULT_HOVER_BORDER).to_hex_string(),
            hover_border_inset: 5,
            hover_border_thickness: 5,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    /// Load `path`, writing a default file there if none exists.
    ///
    /// A file that fails to parse is an error and is left untouched.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents, path)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let settings = Self::default();
                match settings.save(path) {
                    Ok(()) => info!(path = %path.display(), "Generated config file for user to edit (env vars still override)"),
                    Err(e) => error!(error = ?e, "Failed to save default config"),
                }
                settings
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        settings.apply_overrides(|name| env::var(name).ok());
        settings.validate_and_clamp();
        Ok(settings)
    }

    fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(path, contents).context(format!("Failed to write config file to {}", path.display()))?;
        Ok(())
    }

    /// Apply `SNAPZONES_*` overrides. `lookup` maps a full variable name to
    /// its value.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

        if let Some(keys) = var("TRIGGER_KEYS") {
            self.trigger_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(basis) = var("BASIS_POINT") {
            match basis.parse() {
                Ok(basis) => self.snap_basis_point = basis,
                Err(e) => error!(var = "BASIS_POINT", error = %e, "failed to parse env var"),
            }
        }
        if let Some(size) = var("MERGE_ZONE_SIZE") {
            match size.trim().parse() {
                Ok(size) => self.merge_zone_size_preference = size,
                Err(e) => error!(var = "MERGE_ZONE_SIZE", error = ?e, "failed to parse env var"),
            }
        }
        if let Some(wait) = var("WAIT_FOR_MOVEMENT") {
            match parse_bool(&wait) {
                Some(wait) => self.wait_for_window_movement = wait,
                None => error!(var = "WAIT_FOR_MOVEMENT", value = %wait, "failed to parse env var"),
            }
        }
        if let Some(highlight) = var("HIGHLIGHT_HOVER") {
            match parse_bool(&highlight) {
                Some(highlight) => self.highlight_hover_zone = highlight,
                None => error!(var = "HIGHLIGHT_HOVER", value = %highlight, "failed to parse env var"),
            }
        }
    }

    /// Clamp numeric values to safe ranges
    fn validate_and_clamp(&mut self) {
        use crate::constants::validation::*;

        let size = self.merge_zone_size_preference;
        if !size.is_finite() {
            warn!(merge_zone_size_preference = size, using = 7.0, "merge_zone_size_preference is not a number, using default");
            self.merge_zone_size_preference = 7.0;
        } else if size < 0.0 {
            warn!(merge_zone_size_preference = size, "merge_zone_size_preference is negative, disabling merge zones");
            self.merge_zone_size_preference = 0.0;
        } else if size > MAX_MERGE_ZONE_SIZE {
            warn!(merge_zone_size_preference = size, max = MAX_MERGE_ZONE_SIZE, "merge_zone_size_preference exceeds maximum, clamping");
            self.merge_zone_size_preference = MAX_MERGE_ZONE_SIZE;
        }

        if !(MIN_DEBOUNCE_MS..=MAX_DEBOUNCE_MS).contains(&self.layout_debounce_ms) {
            let clamped = self.layout_debounce_ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS);
            warn!(layout_debounce_ms = self.layout_debounce_ms, using = clamped, "layout_debounce_ms out of range, clamping");
            self.layout_debounce_ms = clamped;
        }

        let overlay = &mut self.overlay;
        for (name, thickness) in [
            ("zone_border_thickness", &mut overlay.zone_border_thickness),
            ("hover_border_thickness", &mut overlay.hover_border_thickness),
        ] {
            if *thickness > MAX_BORDER_THICKNESS {
                warn!(key = name, value = *thickness, max = MAX_BORDER_THICKNESS, "border thickness exceeds maximum, clamping");
                *thickness = MAX_BORDER_THICKNESS;
            }
        }
        for (name, inset) in [
            ("zone_background_inset", &mut overlay.zone_background_inset),
            ("zone_border_inset", &mut overlay.zone_border_inset),
            ("hover_background_inset", &mut overlay.hover_background_inset),
            ("hover_border_inset", &mut overlay.hover_border_inset),
        ] {
            if *inset > MAX_INSET {
                warn!(key = name, value = *inset, max = MAX_INSET, "inset exceeds maximum, clamping");
                *inset = MAX_INSET;
            }
        }
    }

    pub fn gesture_config(&self) -> Result<GestureConfig, ConfigError> {
        Ok(GestureConfig {
            trigger_keys: resolve_trigger_keys(&self.trigger_keys)?,
            wait_for_window_movement: self.wait_for_window_movement,
            basis_point: self.snap_basis_point,
            highlight_hover_zone: self.highlight_hover_zone,
        })
    }

    pub fn snap_config(&self) -> SnapConfig {
        SnapConfig {
            maximize_perpendicular_axis: self.maximize_perpendicular_axis_on_snap,
        }
    }

    /// Validated zone layout, checked before any X11 query is made
    pub fn zone_spec(&self) -> Result<ZoneSpec, ConfigError> {
        let spec = ZoneSpec::new(self.displays.clone());
        spec.validate()?;
        Ok(spec)
    }

    pub fn merge_zone_size(&self) -> f64 {
        self.merge_zone_size_preference
    }

    pub fn layout_debounce(&self) -> Duration {
        Duration::from_millis(self.layout_debounce_ms)
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        let overlay = &self.overlay;
        OverlayStyle {
            backdrop: parse_color("backdrop", &overlay.backdrop, DEFAULT_BACKDROP),
            zone: RegionStyle {
                background: parse_color("zone_background", &overlay.zone_background, DEFAULT_ZONE_BACKGROUND),
                background_inset: overlay.zone_background_inset as i32,
                border: parse_color("zone_border", &overlay.zone_border, DEFAULT_ZONE_BORDER),
                border_inset: overlay.zone_border_inset as i32,
                border_thickness: overlay.zone_border_thickness as i32,
            },
            hover: RegionStyle {
                background: parse_color("hover_background", &overlay.hover_background, DEFAULT_HOVER_BACKGROUND),
                background_inset: overlay.hover_background_inset as i32,
                border: parse_color("hover_border", &overlay.hover_border, DEFAULT_HOVER_BORDER),
                border_inset: overlay.hover_border_inset as i32,
                border_thickness: overlay.hover_border_thickness as i32,
            },
        }
    }
}

fn parse_color(key: &str, hex: &str, fallback: u32) -> Color {
    HexColor::parse(hex)
        .map(|c| c.to_x11_color())
        .unwrap_or_else(|| {
            error!(key = key, value = %hex, "Invalid colour hex, using default");
            HexColor::from_argb32(fallback).to_x11_color()
        })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
