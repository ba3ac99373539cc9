//! Startup-fatal error taxonomy
//!
//! Configuration and window-system query failures abort startup. Failures on
//! the per-event gesture path never use these types; they are logged and
//! degrade to a no-op where they happen.

use thiserror::Error;

use crate::types::Orientation;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("display {display} is {orientation} but has no `{expected}` weights")]
    MissingWeights {
        display: usize,
        orientation: Orientation,
        expected: &'static str,
    },
    #[error("display {display} has an empty `{key}` list")]
    EmptyWeights { display: usize, key: &'static str },
    #[error("display {display} has invalid weight {weight} (weights must be finite and > 0)")]
    InvalidWeight { display: usize, weight: f64 },
    #[error("display {display} weights sum to {total}, which is not a finite number")]
    WeightSumOverflow { display: usize, total: f64 },
    #[error("{configured} display(s) configured but {detected} monitor(s) detected")]
    DisplayCountMismatch { configured: usize, detected: usize },
    #[error("no trigger keys configured")]
    NoTriggerKeys,
    #[error("unknown trigger key `{0}`")]
    UnknownKeysym(String),
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("X server does not have the required {0} extension")]
    MissingExtension(&'static str),
    #[error("no enabled monitors reported by RandR")]
    NoMonitors,
    #[error("could not find work areas for desktop {desktop}, potentially unsupported by the window manager")]
    NoWorkAreas { desktop: usize },
    #[error("desktop {desktop} reports {work_areas} work area(s) for {monitors} monitor(s)")]
    WorkAreaMismatch {
        desktop: usize,
        work_areas: usize,
        monitors: usize,
    },
    #[error("RandR mode {0} referenced by a CRTC is not in the screen resources")]
    UnknownMode(u32),
}

/// Failure to build a zone profile from monitors, work areas and the zone spec
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Query(#[from] QueryError),
}
