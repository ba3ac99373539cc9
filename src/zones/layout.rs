//! Partition one display's work area into primary zones

use tracing::warn;

use crate::config::DisplaySpec;
use crate::error::ConfigError;
use crate::types::{Monitor, Orientation, WorkArea, Zone};

/// Split `work_area` along the axis of `spec.orientation` by the spec's
/// weights, left to right (landscape) or top to bottom (portrait).
///
/// Segment sizes are truncated, so the last segment may fall short of the
/// work area's far edge by up to `n - 1` pixels. Zones inherit the monitor's
/// detected orientation, not the spec's.
pub fn compute_zones(
    monitor: &Monitor,
    work_area: &WorkArea,
    spec: &DisplaySpec,
    display: usize,
) -> Result<Vec<Zone>, ConfigError> {
    let weights = spec.weights(display)?;
    let total: f64 = weights.iter().sum();
    let monitor_orientation = monitor.orientation();

    if monitor_orientation != spec.orientation {
        let index = display;
        warn!(
            display = index,
            monitor = %monitor_orientation,
            configured = %spec.orientation,
            "Configured orientation differs from detected monitor orientation"
        );
    }

    let mut zones = Vec::with_capacity(weights.len());
    let mut consumed = 0;

    for weight in weights {
        let zone = match spec.orientation {
            Orientation::Landscape => {
                let width = (weight / total * work_area.width as f64).floor() as i32;
                let zone = Zone::new(
                    work_area.x + consumed,
                    work_area.y,
                    width,
                    work_area.height,
                    monitor_orientation,
                );
                consumed += width;
                zone
            }
            Orientation::Portrait => {
                let height = (weight / total * work_area.height as f64).floor() as i32;
                let zone = Zone::new(
                    work_area.x,
                    work_area.y + consumed,
                    work_area.width,
                    height,
                    monitor_orientation,
                );
                consumed += height;
                zone
            }
        };
        zones.push(zone);
    }

    Ok(zones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn monitor(width: i32, height: i32) -> Monitor {
        Monitor {
            virtual_x: 0,
            virtual_y: 0,
            virtual_width: width,
            virtual_height: height,
            width,
            height,
            scale: 1.0,
            rotation: 1,
        }
    }

    #[test]
    fn test_landscape_columns_scenario() {
        let zones = compute_zones(
            &monitor(1000, 500),
            &WorkArea::new(0, 0, 1000, 500),
            &DisplaySpec::landscape(vec![10.0, 80.0, 10.0]),
            0,
        )
        .unwrap();

        assert_eq!(
            zones,
            vec![
                Zone::new(0, 0, 100, 500, Orientation::Landscape),
                Zone::new(100, 0, 800, 500, Orientation::Landscape),
                Zone::new(900, 0, 100, 500, Orientation::Landscape),
            ]
        );
    }

    #[test]
    fn test_portrait_rows_offset_by_work_area() {
        let zones = compute_zones(
            &monitor(1080, 1920),
            &WorkArea::new(2560, 32, 1080, 1888),
            &DisplaySpec::portrait(vec![35.0, 40.0, 25.0]),
            1,
        )
        .unwrap();

        assert_eq!(
            zones,
            vec![
                Zone::new(2560, 32, 1080, 660, Orientation::Portrait),
                Zone::new(2560, 692, 1080, 755, Orientation::Portrait),
                Zone::new(2560, 1447, 1080, 472, Orientation::Portrait),
            ]
        );
    }

    #[test]
    fn test_truncation_drift_is_not_corrected() {
        let zones = compute_zones(
            &monitor(1000, 500),
            &WorkArea::new(0, 0, 1000, 500),
            &DisplaySpec::landscape(vec![1.0, 1.0, 1.0]),
            0,
        )
        .unwrap();

        assert_eq!(zones.iter().map(|z| z.rect.width).collect::<Vec<_>>(), vec![333, 333, 333]);
        assert_eq!(zones[2].rect.right(), 999);
    }

    #[test]
    fn test_zone_orientation_comes_from_monitor() {
        // A portrait-sized monitor configured with columns still yields portrait zones
        let zones = compute_zones(
            &monitor(1080, 1920),
            &WorkArea::new(0, 0, 1080, 1920),
            &DisplaySpec::landscape(vec![50.0, 50.0]),
            0,
        )
        .unwrap();

        assert!(zones.iter().all(|z| z.orientation == Orientation::Portrait));
        assert_eq!(zones[1].rect, crate::types::Rect::new(540, 0, 540, 1920));
    }

    #[test]
    fn test_wrong_key_yields_error_not_empty_list() {
        let spec = DisplaySpec {
            orientation: Orientation::Portrait,
            columns: Some(vec![50.0, 50.0]),
            rows: None,
        };
        let result = compute_zones(&monitor(1920, 1080), &WorkArea::new(0, 0, 1920, 1080), &spec, 2);
        assert!(matches!(result, Err(ConfigError::MissingWeights { display: 2, .. })));
    }

    proptest! {
        #[test]
        fn prop_landscape_zones_tile_the_work_area(
            weights in prop::collection::vec(1u32..200, 1..8),
            x in -4000i32..4000,
            y in -4000i32..4000,
            width in 200i32..8000,
            height in 100i32..4000,
        ) {
            let weights: Vec<f64> = weights.into_iter().map(f64::from).collect();
            let n = weights.len() as i32;
            let area = WorkArea::new(x, y, width, height);
            let zones = compute_zones(&monitor(width, height), &area, &DisplaySpec::landscape(weights), 0).unwrap();

            prop_assert_eq!(zones.len() as i32, n);
            prop_assert_eq!(zones[0].rect.x, x);
            for pair in zones.windows(2) {
                // Adjacent, never overlapping
                prop_assert_eq!(pair[0].rect.right(), pair[1].rect.left());
            }
            for zone in &zones {
                prop_assert_eq!(zone.rect.y, y);
                prop_assert_eq!(zone.rect.height, height);
            }
            let drift = area.rect().right() - zones[zones.len() - 1].rect.right();
            prop_assert!(drift >= 0);
            prop_assert!(drift <= n - 1);
        }

        #[test]
        fn prop_portrait_zones_tile_the_work_area(
            weights in prop::collection::vec(1u32..200, 1..8),
            width in 100i32..4000,
            height in 200i32..8000,
        ) {
            let weights: Vec<f64> = weights.into_iter().map(f64::from).collect();
            let n = weights.len() as i32;
            let area = WorkArea::new(0, 0, width, height);
            let zones = compute_zones(&monitor(width, height), &area, &DisplaySpec::portrait(weights), 0).unwrap();

            for pair in zones.windows(2) {
                prop_assert_eq!(pair[0].rect.bottom(), pair[1].rect.top());
            }
            let drift = area.rect().bottom() - zones[zones.len() - 1].rect.bottom();
            prop_assert!((0..n).contains(&drift));
        }
    }
}
