use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::randr::{self, ConnectionExt as RandrExt, Rotation};
use x11rb::protocol::record;
use x11rb::protocol::render::{ConnectionExt as RenderExt, Pictformat};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::ZoneSpec;
use crate::constants::atoms::{
    GTK_WORKAREAS_PREFIX, NET_CURRENT_DESKTOP, NET_NUMBER_OF_DESKTOPS, NET_WORKAREA, NET_WORKAREAS_PREFIX,
};
use crate::constants::x11;
use crate::error::QueryError;
use crate::gesture::WindowQuery;
use crate::keysym::KeycodeMap;
use crate::snap::WindowMover;
use crate::types::{FrameExtents, Monitor, Orientation, Point, Rect, WindowHandle, WorkArea};
use crate::zones::ZoneProfile;

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_active_window: Atom,
    pub net_current_desktop: Atom,
    pub net_number_of_desktops: Atom,
    pub net_workarea: Atom,
    pub net_frame_extents: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_desktop: Atom,
    pub net_wm_window_opacity: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            net_active_window: intern(conn, "_NET_ACTIVE_WINDOW")?,
            net_current_desktop: intern(conn, NET_CURRENT_DESKTOP)?,
            net_number_of_desktops: intern(conn, NET_NUMBER_OF_DESKTOPS)?,
            net_workarea: intern(conn, NET_WORKAREA)?,
            net_frame_extents: intern(conn, "_NET_FRAME_EXTENTS")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_maximized_vert: intern(conn, "_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern(conn, "_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_wm_window_type: intern(conn, "_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_desktop: intern(conn, "_NET_WM_WINDOW_TYPE_DESKTOP")?,
            net_wm_window_opacity: intern(conn, "_NET_WM_WINDOW_OPACITY")?,
        })
    }
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .context(format!("Failed to intern {} atom", name))?
        .reply()
        .context(format!("Failed to get reply for {} atom", name))?
        .atom)
}

/// Atom for `name` only if some client already created it
fn existing_atom(conn: &RustConnection, name: &str) -> Result<Option<Atom>> {
    let atom = conn
        .intern_atom(true, name.as_bytes())
        .context(format!("Failed to look up {} atom", name))?
        .reply()
        .context(format!("Failed to get reply for {} atom lookup", name))?
        .atom;
    Ok((atom != x11rb::NONE).then_some(atom))
}

pub fn atom_name(conn: &RustConnection, atom: Atom) -> Result<String> {
    let reply = conn
        .get_atom_name(atom)
        .context(format!("Failed to query name of atom {}", atom))?
        .reply()
        .context(format!("Failed to get name reply for atom {}", atom))?;
    Ok(String::from_utf8_lossy(&reply.name).into_owned())
}

/// RandR answers monitor geometry and RECORD carries global input
pub fn check_required_extensions(conn: &RustConnection) -> Result<()> {
    for name in [randr::X11_EXTENSION_NAME, record::X11_EXTENSION_NAME] {
        if conn
            .extension_information(name)
            .context(format!("Failed to query {} extension", name))?
            .is_none()
        {
            return Err(QueryError::MissingExtension(name).into());
        }
    }
    Ok(())
}

fn cardinals(conn: &RustConnection, window: Window, property: Atom) -> Result<Option<Vec<u32>>> {
    let reply = conn
        .get_property(false, window, property, AtomEnum::CARDINAL, 0, 1024)
        .context(format!("Failed to query property {} on window {}", property, window))?
        .reply()
        .context(format!("Failed to get property {} reply for window {}", property, window))?;
    Ok(reply.value32().map(|values| values.collect::<Vec<_>>()).filter(|values| !values.is_empty()))
}

fn work_areas_from(values: &[u32]) -> Vec<WorkArea> {
    values
        .chunks_exact(x11::WORK_AREA_STRIDE)
        .map(|area| WorkArea::new(area[0] as i32, area[1] as i32, area[2] as i32, area[3] as i32))
        .collect()
}

/// Enabled RandR outputs, sorted left to right then top to bottom
#[tracing::instrument(skip(conn))]
pub fn query_monitors(conn: &RustConnection, root: Window) -> Result<Vec<Monitor>> {
    let resources = conn
        .randr_get_screen_resources_current(root)
        .context("Failed to query RandR screen resources")?
        .reply()
        .context("Failed to get reply for RandR screen resources")?;

    let mut monitors = Vec::new();
    for output in &resources.outputs {
        let info = conn
            .randr_get_output_info(*output, resources.config_timestamp)
            .context(format!("Failed to query RandR output {}", output))?
            .reply()
            .context(format!("Failed to get reply for RandR output {}", output))?;
        if info.crtc == x11rb::NONE {
            continue;
        }

        let crtc = conn
            .randr_get_crtc_info(info.crtc, resources.config_timestamp)
            .context(format!("Failed to query RandR crtc {}", info.crtc))?
            .reply()
            .context(format!("Failed to get reply for RandR crtc {}", info.crtc))?;
        let mode = resources
            .modes
            .iter()
            .find(|mode| mode.id == crtc.mode)
            .ok_or(QueryError::UnknownMode(crtc.mode))?;

        let rotation = u16::from(crtc.rotation);
        let sideways = rotation & (u16::from(Rotation::ROTATE90) | u16::from(Rotation::ROTATE270)) != 0;
        let (width, height) = if sideways {
            (mode.height as i32, mode.width as i32)
        } else {
            (mode.width as i32, mode.height as i32)
        };

        let scale = crtc.width as f64 / width as f64;
        if (scale - crtc.height as f64 / height as f64).abs() > f64::EPSILON {
            warn!(output = output, "Uneven horizontal/vertical scaling on output, using horizontal scale");
        }

        monitors.push(Monitor {
            virtual_x: crtc.x as i32,
            virtual_y: crtc.y as i32,
            virtual_width: crtc.width as i32,
            virtual_height: crtc.height as i32,
            width,
            height,
            scale,
            rotation,
        });
    }

    if monitors.is_empty() {
        return Err(QueryError::NoMonitors.into());
    }
    monitors.sort_by_key(|m| (m.virtual_x, m.virtual_y));
    debug!(monitors = ?monitors, "Queried monitors");
    Ok(monitors)
}

pub fn desktop_count(conn: &RustConnection, root: Window, atoms: &CachedAtoms) -> Result<usize> {
    match cardinals(conn, root, atoms.net_number_of_desktops)? {
        Some(values) => Ok((values[0] as usize).max(1)),
        None => {
            warn!("_NET_NUMBER_OF_DESKTOPS not set, assuming a single desktop");
            Ok(1)
        }
    }
}

pub fn current_desktop(conn: &RustConnection, root: Window, atoms: &CachedAtoms) -> Result<usize> {
    Ok(cardinals(conn, root, atoms.net_current_desktop)?
        .map(|values| values[0] as usize)
        .unwrap_or(0))
}

/// Work areas of `desktop`, from the most to the least specific source:
/// GTK's per-monitor areas, the proposed EWMH per-monitor areas, then the
/// single combined `_NET_WORKAREA` entry
pub fn query_work_areas(
    conn: &RustConnection,
    root: Window,
    atoms: &CachedAtoms,
    desktop: usize,
) -> Result<Vec<WorkArea>> {
    for prefix in [GTK_WORKAREAS_PREFIX, NET_WORKAREAS_PREFIX] {
        let name = format!("{prefix}{desktop}");
        if let Some(atom) = existing_atom(conn, &name)?
            && let Some(values) = cardinals(conn, root, atom)?
        {
            let areas = work_areas_from(&values);
            if !areas.is_empty() {
                debug!(desktop = desktop, source = %name, areas = ?areas, "Work areas");
                return Ok(areas);
            }
        }
    }

    if let Some(values) = cardinals(conn, root, atoms.net_workarea)?
        && let Some(area) = work_areas_from(&values).get(desktop)
    {
        warn!(
            desktop = desktop,
            "Using combined _NET_WORKAREA, work areas may be wrong with multiple monitors"
        );
        return Ok(vec![*area]);
    }

    Err(QueryError::NoWorkAreas { desktop }.into())
}

/// Query monitors and work areas and lay out zones for every desktop
pub fn build_profile(
    conn: &RustConnection,
    root: Window,
    atoms: &CachedAtoms,
    spec: &ZoneSpec,
    merge_zone_size: f64,
) -> Result<ZoneProfile> {
    let monitors = query_monitors(conn, root)?;
    let desktops = desktop_count(conn, root, atoms)?;
    let work_areas = (0..desktops)
        .map(|desktop| query_work_areas(conn, root, atoms, desktop))
        .collect::<Result<Vec<_>>>()?;

    if work_areas.first().is_some_and(|areas| areas.len() != monitors.len()) {
        info!("Operating on a single combined work area");
    }

    let profile = ZoneProfile::build(&monitors, &work_areas, spec, merge_zone_size)?;
    profile.log_summary();
    Ok(profile)
}

pub fn keycode_map(conn: &RustConnection) -> Result<KeycodeMap> {
    let setup = conn.setup();
    let (min, max) = (setup.min_keycode, setup.max_keycode);
    let mapping = conn
        .get_keyboard_mapping(min, max - min + 1)
        .context("Failed to query keyboard mapping")?
        .reply()
        .context("Failed to get reply for keyboard mapping")?;
    Ok(KeycodeMap::from_mapping(min, mapping.keysyms_per_keycode, &mapping.keysyms))
}

#[tracing::instrument(skip(conn))]
pub fn get_pictformat(conn: &RustConnection, depth: u8, alpha: bool) -> Result<Pictformat> {
    if let Some(format) = conn
        .render_query_pict_formats()
        .context("Failed to query RENDER picture formats")?
        .reply()
        .context("Failed to get reply for RENDER picture formats query")?
        .formats
        .iter()
        .find(|format| {
            format.depth == depth
                && if alpha {
                    format.direct.alpha_mask != 0
                } else {
                    format.direct.alpha_mask == 0
                }
        })
    {
        debug!(
            "using Pictformat: {}, {}",
            format.depth, format.direct.alpha_mask
        );
        Ok(format.id)
    } else {
        anyhow::bail!("Could not find suitable picture format (depth={}, alpha={}). Check RENDER extension support.", depth, alpha)
    }
}

/// Client windows seen through one connection
pub struct X11Windows<'a> {
    pub conn: &'a RustConnection,
    pub root: Window,
    pub atoms: &'a CachedAtoms,
}

impl X11Windows<'_> {
    fn focused_window(&self) -> Result<Option<Window>> {
        let reply = self
            .conn
            .get_property(false, self.root, self.atoms.net_active_window, AtomEnum::WINDOW, 0, 1)
            .context("Failed to query _NET_ACTIVE_WINDOW property")?
            .reply()
            .context("Failed to get reply for _NET_ACTIVE_WINDOW query")?;

        let Some(window) = reply.value32().and_then(|mut values| values.next()) else {
            return Ok(None);
        };
        if window == x11rb::NONE || window == self.root || self.is_desktop(window)? {
            return Ok(None);
        }
        Ok(Some(window))
    }

    fn is_desktop(&self, window: Window) -> Result<bool> {
        let reply = self
            .conn
            .get_property(false, window, self.atoms.net_wm_window_type, AtomEnum::ATOM, 0, 32)
            .context(format!("Failed to query _NET_WM_WINDOW_TYPE for window {}", window))?
            .reply()
            .context(format!("Failed to get _NET_WM_WINDOW_TYPE reply for window {}", window))?;
        Ok(reply
            .value32()
            .is_some_and(|mut types| types.any(|t| t == self.atoms.net_wm_window_type_desktop)))
    }

    fn anchor(&self, window: Window) -> Result<Point> {
        let geometry = self
            .conn
            .get_geometry(window)
            .context(format!("Failed to query geometry of window {}", window))?
            .reply()
            .context(format!("Failed to get geometry reply for window {}", window))?;
        let position = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)
            .context(format!("Failed to translate coordinates of window {}", window))?
            .reply()
            .context(format!("Failed to get coordinates reply for window {}", window))?;
        let extents = self.frame_extents(window)?;

        Ok(Point::new(
            position.dst_x as i32 - extents.left + (extents.left + extents.right + geometry.width as i32) / 2,
            position.dst_y as i32 - extents.top,
        ))
    }
}

impl WindowQuery for X11Windows<'_> {
    fn active_window(&self) -> Option<WindowHandle> {
        self.focused_window()
            .inspect_err(|e| debug!(error = %e, "Failed to query active window"))
            .ok()
            .flatten()
    }

    fn window_anchor(&self, window: WindowHandle) -> Option<Point> {
        self.anchor(window)
            .inspect_err(|e| debug!(window = window, error = %e, "Failed to query window anchor"))
            .ok()
    }
}

impl WindowMover for X11Windows<'_> {
    fn frame_extents(&self, window: WindowHandle) -> Result<FrameExtents> {
        Ok(match cardinals(self.conn, window, self.atoms.net_frame_extents)? {
            Some(values) if values.len() >= x11::FRAME_EXTENTS_LEN => FrameExtents {
                left: values[0] as i32,
                right: values[1] as i32,
                top: values[2] as i32,
                bottom: values[3] as i32,
            },
            _ => FrameExtents::default(),
        })
    }

    fn move_resize(&self, window: WindowHandle, client: Rect) -> Result<()> {
        debug!(window = window, rect = ?client, "ConfigureWindow");
        self.conn
            .configure_window(
                window,
                &ConfigureWindowAux::new()
                    .x(client.x)
                    .y(client.y)
                    .width(client.width as u32)
                    .height(client.height as u32)
                    .stack_mode(StackMode::ABOVE),
            )
            .context(format!("Failed to send ConfigureWindow for window {}", window))?
            .check()
            .context(format!("Failed to move window {}", window))?;
        Ok(())
    }

    fn maximize_axis(&self, window: WindowHandle, orientation: Orientation) -> Result<()> {
        // Landscape zones span the full height, portrait zones the full width
        let axis = match orientation {
            Orientation::Landscape => self.atoms.net_wm_state_maximized_vert,
            Orientation::Portrait => self.atoms.net_wm_state_maximized_horz,
        };

        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_: self.atoms.net_wm_state,
            data: ClientMessageData::from([
                x11::NET_WM_STATE_ADD,
                axis,
                0,
                x11::SOURCE_INDICATION_PAGER,
                0,
            ]),
        };

        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                event,
            )
            .context(format!("Failed to send _NET_WM_STATE event for window {}", window))?;
        self.conn
            .flush()
            .context("Failed to flush X11 connection after _NET_WM_STATE request")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_areas_from_quadruples() {
        let areas = work_areas_from(&[0, 0, 1920, 1050, 1920, 0, 1080, 1920, 7]);
        assert_eq!(
            areas,
            vec![WorkArea::new(0, 0, 1920, 1050), WorkArea::new(1920, 0, 1080, 1920)]
        );
    }

    #[test]
    fn test_work_areas_from_short_input() {
        assert!(work_areas_from(&[0, 0, 1920]).is_empty());
    }
}
