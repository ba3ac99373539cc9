//! Merge zones bridging adjacent primary zones of one display

use crate::constants::merge::{MAX_SIZE_PERCENT, MIN_SIZE_PERCENT};
use crate::types::{MergeZone, Orientation, Rect, WorkArea, Zone, ZoneId};

/// Build one merge zone per adjacent pair of `zones`, which must come from a
/// single display partition in partition order.
///
/// `size_preference` is the probe size as a percentage of the work area
/// (half on each side of the boundary), clamped to `2..=25`. Zero disables
/// merge zones. Returned [`ZoneId`]s index into `zones`.
///
/// The boundary axis follows each zone's orientation, which is the monitor's.
/// When a display is split against its monitor's orientation (rows on a
/// landscape monitor, say), hit rectangles and surfaces are laid along the wrong
/// axis: the surface is then not the union of the pair and can reach past
/// the work area.
pub fn compute_merge_zones(
    zones: &[Zone],
    work_area: &WorkArea,
    size_preference: f64,
) -> Vec<MergeZone> {
    if !(size_preference > 0.0) || zones.len() < 2 {
        return Vec::new();
    }

    let fraction = size_preference.clamp(MIN_SIZE_PERCENT, MAX_SIZE_PERCENT) / 100.0;

    zones
        .windows(2)
        .enumerate()
        .map(|(index, pair)| {
            let (zone, next) = (pair[0], pair[1]);
            let (probe, surface) = match zone.orientation {
                Orientation::Landscape => {
                    let size = work_area.width as f64 * fraction;
                    let probe = Rect::new(
                        (zone.rect.right() as f64 - size / 2.0) as i32,
                        zone.rect.y,
                        size as i32,
                        zone.rect.height,
                    );
                    let mut surface = zone;
                    surface.rect.width = zone.rect.width + next.rect.width;
                    (probe, surface)
                }
                Orientation::Portrait => {
                    let size = work_area.height as f64 * fraction;
                    let probe = Rect::new(
                        zone.rect.x,
                        (zone.rect.bottom() as f64 - size / 2.0) as i32,
                        zone.rect.width,
                        size as i32,
                    );
                    let mut surface = zone;
                    surface.rect.height = zone.rect.height + next.rect.height;
                    (probe, surface)
                }
            };

            MergeZone {
                probe,
                orientation: zone.orientation,
                zones: (ZoneId(index), ZoneId(index + 1)),
                surface,
            }
        })
        .collect()
}
