//! Zones and merge zones for every virtual desktop, plus point queries

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ZoneSpec;
use crate::error::{ProfileError, QueryError};
use crate::types::{MergeZone, Monitor, Point, WorkArea, Zone, ZoneHit, ZoneId};
use crate::zones::{compute_merge_zones, compute_zones};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DesktopZones {
    pub zones: Vec<Zone>,
    pub merge_zones: Vec<MergeZone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoneProfile {
    desktops: Vec<DesktopZones>,
}

impl ZoneProfile {
    /// Lay out every monitor on every desktop.
    ///
    /// `work_areas[desktop]` holds either one combined work area shared by all
    /// monitors, or one work area per monitor. Monitors are taken in
    /// `(virtual_x, virtual_y)` order, which is the order `spec.displays` is
    /// written in.
    pub fn build(
        monitors: &[Monitor],
        work_areas: &[Vec<WorkArea>],
        spec: &ZoneSpec,
        merge_zone_size: f64,
    ) -> Result<Self, ProfileError> {
        spec.check_monitor_count(monitors.len())?;

        let mut monitors = monitors.to_vec();
        monitors.sort_by_key(|m| (m.virtual_x, m.virtual_y));

        let mut desktops = Vec::with_capacity(work_areas.len());
        for (desktop, areas) in work_areas.iter().enumerate() {
            let mut desktop_zones = DesktopZones::default();

            for (index, (monitor, display)) in monitors.iter().zip(&spec.displays).enumerate() {
                let work_area = resolve_work_area(monitor, index, areas).ok_or(
                    QueryError::WorkAreaMismatch {
                        desktop,
                        work_areas: areas.len(),
                        monitors: monitors.len(),
                    },
                )?;

                let zones = compute_zones(monitor, &work_area, display, index)?;
                let offset = desktop_zones.zones.len();
                desktop_zones.merge_zones.extend(
                    compute_merge_zones(&zones, &work_area, merge_zone_size)
                        .into_iter()
                        .map(|mut merge| {
                            merge.zones = (
                                ZoneId(merge.zones.0.0 + offset),
                                ZoneId(merge.zones.1.0 + offset),
                            );
                            merge
                        }),
                );
                desktop_zones.zones.extend(zones);
            }

            desktops.push(desktop_zones);
        }

        Ok(Self { desktops })
    }

    pub fn desktop_count(&self) -> usize {
        self.desktops.len()
    }

    /// Primary zones of `desktop` in partition order; empty for unknown desktops
    pub fn zones(&self, desktop: usize) -> &[Zone] {
        self.desktops.get(desktop).map_or(&[], |d| d.zones.as_slice())
    }

    pub fn merge_zones(&self, desktop: usize) -> &[MergeZone] {
        self.desktops.get(desktop).map_or(&[], |d| d.merge_zones.as_slice())
    }

    pub fn zone(&self, desktop: usize, id: ZoneId) -> Option<&Zone> {
        self.zones(desktop).get(id.0)
    }

    /// Merge zones are checked before primary zones, each in generation
    /// order; the first region containing the point wins.
    pub fn find_zone(&self, desktop: usize, point: Point) -> Option<ZoneHit> {
        if let Some(merge) = self
            .merge_zones(desktop)
            .iter()
            .find(|merge| merge.probe.contains(point))
        {
            return Some(ZoneHit::Merge(*merge));
        }

        self.zones(desktop)
            .iter()
            .find(|zone| zone.rect.contains(point))
            .map(|zone| ZoneHit::Primary(*zone))
    }

    pub fn log_summary(&self) {
        for (desktop, zones) in self.desktops.iter().enumerate() {
            info!(
                desktop = desktop,
                zones = zones.zones.len(),
                merge_zones = zones.merge_zones.len(),
                "Computed zones for desktop"
            );
            for zone in &zones.zones {
                info!(desktop = desktop, zone = ?zone.rect, orientation = %zone.orientation, "zone");
            }
            for merge in &zones.merge_zones {
                debug!(desktop = desktop, probe = ?merge.probe, surface = ?merge.surface.rect, "merge zone");
            }
        }
    }
}

/// One work area means a single combined area every monitor shares.
/// Otherwise prefer the area overlapping the monitor the most, since window
/// managers do not promise monitor order, then fall back to the same index.
fn resolve_work_area(monitor: &Monitor, index: usize, areas: &[WorkArea]) -> Option<WorkArea> {
    if let [shared] = areas {
        return Some(*shared);
    }

    let bounds = monitor.virtual_rect();
    areas
        .iter()
        .map(|area| (area, area.rect().intersection_area(&bounds)))
        .filter(|(_, overlap)| *overlap > 0)
        .max_by_key(|(_, overlap)| *overlap)
        .map(|(area, _)| *area)
        .or_else(|| areas.get(index).copied())
}

/// Published profile, replaced wholesale by the layout watcher. Readers see
/// either the old or the new profile, never a partial rebuild.
pub struct SharedProfile {
    inner: ArcSwap<ZoneProfile>,
}

impl SharedProfile {
    pub fn new(profile: ZoneProfile) -> Self {
        Self {
            inner: ArcSwap::from_pointee(profile),
        }
    }

    pub fn load(&self) -> Arc<ZoneProfile> {
        self.inner.load_full()
    }

    pub fn store(&self, profile: ZoneProfile) {
        self.inner.store(Arc::new(profile));
    }
}
