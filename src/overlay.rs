//! Full-screen zone overlay drawn on its own thread and connection
//!
//! The gesture path only ever sends [`OverlayCommand`]s; it never waits for
//! the overlay to draw.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::render::{Color, ConnectionExt as RenderExt, CreatePictureAux, PictOp, Picture};
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::constants::{overlay, x11};
use crate::types::{Rect, Zone};
use crate::x11_utils::{CachedAtoms, get_pictformat};

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCommand {
    Show,
    Hide,
    /// Zones of the current desktop
    SetZones(Vec<Zone>),
    SetHover(Option<Zone>),
    Shutdown,
}

/// Fill and outline of one zone, colours premultiplied
#[derive(Debug, Clone, Copy)]
pub struct RegionStyle {
    pub background: Color,
    pub background_inset: i32,
    pub border: Color,
    pub border_inset: i32,
    pub border_thickness: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub backdrop: Color,
    pub zone: RegionStyle,
    pub hover: RegionStyle,
}

/// One fill pass: a colour and the rectangles painted with it
type Layer = (Color, Vec<Rect>);

/// Layers to paint over the backdrop, bottom to top. The hover zone is
/// drawn last so a merged surface covers both zones underneath.
fn scene(zones: &[Zone], hover: Option<Zone>, style: &OverlayStyle) -> Vec<Layer> {
    let mut layers = Vec::with_capacity(zones.len() * 2 + 2);
    for zone in zones {
        layers.extend(region_layers(zone.rect, &style.zone));
    }
    if let Some(hover) = hover {
        layers.extend(region_layers(hover.rect, &style.hover));
    }
    layers
}

fn region_layers(rect: Rect, style: &RegionStyle) -> [Layer; 2] {
    let background = rect.inset(style.background_inset);
    [
        (style.background, vec![background]),
        (style.border, outline(rect.inset(style.border_inset), style.border_thickness)),
    ]
}

/// Four bars of `thickness` along the inside of `rect`
fn outline(rect: Rect, thickness: i32) -> Vec<Rect> {
    let thickness = thickness.min(rect.width / 2).min(rect.height / 2);
    if thickness <= 0 {
        return Vec::new();
    }
    let inner_height = rect.height - thickness * 2;
    vec![
        Rect::new(rect.x, rect.y, rect.width, thickness),
        Rect::new(rect.x, rect.bottom() - thickness, rect.width, thickness),
        Rect::new(rect.x, rect.y + thickness, thickness, inner_height),
        Rect::new(rect.right() - thickness, rect.y + thickness, thickness, inner_height),
    ]
}

/// Zones are in root coordinates and the overlay sits at the root origin
fn to_rectangle(rect: Rect) -> Rectangle {
    Rectangle {
        x: rect.x.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
        y: rect.y.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
        width: rect.width.clamp(0, u16::MAX as i32) as u16,
        height: rect.height.clamp(0, u16::MAX as i32) as u16,
    }
}

/// The running overlay thread
#[derive(Debug, Clone)]
pub struct OverlayThread {
    handle: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
}

impl OverlayThread {
    fn new(handle: thread::JoinHandle<()>) -> Self {
        Self {
            handle: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Send `Shutdown` and wait until the thread has destroyed its window.
    /// Only the first call waits.
    pub fn shutdown(&self, commands: &Sender<OverlayCommand>) {
        let _ = commands.send(OverlayCommand::Shutdown);
        let handle = self.handle.lock().ok().and_then(|mut handle| handle.take());
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("Overlay thread panicked");
        }
    }
}

/// Start the overlay thread. It opens its own connection so drawing never
/// interleaves with requests from the gesture path.
pub fn spawn(style: OverlayStyle, zones: Vec<Zone>) -> Result<(Sender<OverlayCommand>, OverlayThread)> {
    let (sender, receiver) = channel();
    let handle = thread::Builder::new()
        .name("overlay".to_string())
        .spawn(move || {
            info!("Overlay thread started");
            if let Err(e) = run(style, zones, receiver) {
                error!(error = ?e, "Overlay thread failed");
            }
        })
        .context("Failed to spawn overlay thread")?;
    Ok((sender, OverlayThread::new(handle)))
}

fn run(style: OverlayStyle, zones: Vec<Zone>, commands: Receiver<OverlayCommand>) -> Result<()> {
    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 server for overlay")?;
    let screen = conn.setup().roots[screen_num].clone();
    let atoms = CachedAtoms::new(&conn).context("Failed to cache X11 atoms for overlay")?;
    let mut overlay = Overlay::new(&conn, &screen, &atoms, style, zones)?;
    let poll = Duration::from_millis(overlay::EVENT_POLL_MS);

    loop {
        match commands.recv_timeout(poll) {
            Ok(OverlayCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => {
                if let Err(e) = overlay.apply(command) {
                    warn!(error = ?e, "Overlay command failed");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        while let Some(event) = conn.poll_for_event().context("Overlay connection failed")? {
            if let Event::Expose(expose) = event
                && expose.count == 0
            {
                overlay.draw()?;
            }
        }
    }

    info!("Overlay thread stopped");
    Ok(())
}

struct Overlay<'a> {
    conn: &'a RustConnection,
    root: Window,
    window: Window,
    colormap: Option<Colormap>,
    picture: Picture,
    size: (u16, u16),
    visible: bool,
    zones: Vec<Zone>,
    hover: Option<Zone>,
    style: OverlayStyle,
}

impl<'a> Overlay<'a> {
    fn new(
        conn: &'a RustConnection,
        screen: &Screen,
        atoms: &CachedAtoms,
        style: OverlayStyle,
        zones: Vec<Zone>,
    ) -> Result<Self> {
        let size = (screen.width_in_pixels, screen.height_in_pixels);
        let window = conn.generate_id().context("Failed to generate X11 window ID")?;
        let aux = CreateWindowAux::new()
            .override_redirect(x11::OVERRIDE_REDIRECT)
            .event_mask(EventMask::EXPOSURE);

        // Prefer a translucent ARGB window; without one fall back to the
        // root visual and ask the compositor for window opacity
        let argb_visual = argb_visual(screen);
        let colormap = match argb_visual {
            Some(visual) => {
                let colormap = conn.generate_id().context("Failed to generate colormap ID")?;
                conn.create_colormap(ColormapAlloc::NONE, colormap, screen.root, visual)
                    .context("Failed to create ARGB colormap for overlay")?;
                Some(colormap)
            }
            None => None,
        };

        // Free whatever exists so far if setup fails past this point
        let window_guard = SetupGuard::new(|| {
            if let Err(e) = conn.destroy_window(window) {
                error!("Failed to cleanup overlay window {} after initialization failure: {}", window, e);
            }
            if let Some(colormap) = colormap {
                let _ = conn.free_colormap(colormap);
            }
            let _ = conn.flush();
        });

        let picture_format = if let (Some(visual), Some(colormap)) = (argb_visual, colormap) {
            conn.create_window(
                x11::ARGB_DEPTH,
                window,
                screen.root,
                0,
                0,
                size.0,
                size.1,
                0,
                WindowClass::INPUT_OUTPUT,
                visual,
                &aux.colormap(colormap).border_pixel(0).background_pixel(0),
            )
            .context("Failed to create ARGB overlay window")?;
            get_pictformat(conn, x11::ARGB_DEPTH, true).context("Failed to get ARGB picture format for overlay")?
        } else {
            warn!("No 32-bit visual available, overlay uses window opacity instead");
            conn.create_window(
                screen.root_depth,
                window,
                screen.root,
                0,
                0,
                size.0,
                size.1,
                0,
                WindowClass::INPUT_OUTPUT,
                screen.root_visual,
                &aux,
            )
            .context("Failed to create overlay window")?;
            conn.change_property32(
                PropMode::REPLACE,
                window,
                atoms.net_wm_window_opacity,
                AtomEnum::CARDINAL,
                &[x11::FALLBACK_OVERLAY_OPACITY],
            )
            .context("Failed to set overlay window opacity")?;
            get_pictformat(conn, screen.root_depth, false).context("Failed to get picture format for overlay")?
        };

        // Empty input region: clicks fall through to the windows below
        conn.shape_rectangles(SO::SET, SK::INPUT, ClipOrdering::UNSORTED, window, 0, 0, &[])
            .context("Failed to make overlay window click-through")?;
        conn.change_property8(PropMode::REPLACE, window, AtomEnum::WM_CLASS, AtomEnum::STRING, overlay::WM_CLASS)
            .context("Failed to set WM_CLASS for overlay")?;

        let picture = conn.generate_id().context("Failed to generate ID for overlay picture")?;
        conn.render_create_picture(picture, window, picture_format, &CreatePictureAux::new())
            .context("Failed to create overlay picture")?;
        conn.flush().context("Failed to flush overlay setup")?;

        window_guard.disarm();
        info!(window = window, width = size.0, height = size.1, argb = argb_visual.is_some(), "Created overlay window");

        Ok(Self {
            conn,
            root: screen.root,
            window,
            colormap,
            picture,
            size,
            visible: false,
            zones,
            hover: None,
            style,
        })
    }

    fn apply(&mut self, command: OverlayCommand) -> Result<()> {
        match command {
            OverlayCommand::Show => {
                if self.visible {
                    return Ok(());
                }
                self.visible = true;
                self.conn.map_window(self.window).context("Failed to map overlay window")?;
                self.draw()?;
            }
            OverlayCommand::Hide => {
                if !self.visible {
                    return Ok(());
                }
                self.visible = false;
                self.conn.unmap_window(self.window).context("Failed to unmap overlay window")?;
                self.conn.flush().context("Failed to flush overlay hide")?;
            }
            OverlayCommand::SetZones(zones) => {
                debug!(zones = zones.len(), "Overlay zones updated");
                self.zones = zones;
                self.fit_to_root()?;
                self.draw()?;
            }
            OverlayCommand::SetHover(hover) => {
                if self.hover != hover {
                    self.hover = hover;
                    self.draw()?;
                }
            }
            OverlayCommand::Shutdown => {}
        }
        Ok(())
    }

    /// Monitor changes can grow or shrink the root window
    fn fit_to_root(&mut self) -> Result<()> {
        let geometry = self
            .conn
            .get_geometry(self.root)
            .context("Failed to send geometry query for root window")?
            .reply()
            .context("Failed to get root window geometry")?;
        let size = (geometry.width, geometry.height);
        if size != self.size {
            info!(width = size.0, height = size.1, "Resizing overlay to root window");
            self.size = size;
            self.conn
                .configure_window(
                    self.window,
                    &ConfigureWindowAux::new().width(size.0 as u32).height(size.1 as u32),
                )
                .context("Failed to resize overlay window")?;
        }
        Ok(())
    }

    fn draw(&self) -> Result<()> {
        if !self.visible {
            return Ok(());
        }

        let full = Rectangle {
            x: 0,
            y: 0,
            width: self.size.0,
            height: self.size.1,
        };
        self.conn
            .render_fill_rectangles(PictOp::SRC, self.picture, self.style.backdrop, &[full])
            .context("Failed to clear overlay")?;

        for (color, rects) in scene(&self.zones, self.hover, &self.style) {
            let rects: Vec<Rectangle> = rects.into_iter().map(to_rectangle).collect();
            self.conn
                .render_fill_rectangles(PictOp::OVER, self.picture, color, &rects)
                .context("Failed to draw overlay zones")?;
        }

        self.conn.flush().context("Failed to flush overlay drawing")?;
        Ok(())
    }
}

impl Drop for Overlay<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.conn.render_free_picture(self.picture) {
            error!("Failed to free overlay picture {}: {}", self.picture, e);
        }

        if let Err(e) = self.conn.destroy_window(self.window) {
            error!("Failed to destroy overlay window {}: {}", self.window, e);
        }

        if let Some(colormap) = self.colormap
            && let Err(e) = self.conn.free_colormap(colormap)
        {
            error!("Failed to free overlay colormap {}: {}", colormap, e);
        }

        if let Err(e) = self.conn.flush() {
            error!("Failed to flush X11 connection during overlay cleanup: {}", e);
        }
    }
}

/// Runs `cleanup` when dropped unless disarmed
struct SetupGuard<F: FnOnce()> {
    cleanup: Option<F>,
}

impl<F: FnOnce()> SetupGuard<F> {
    fn new(cleanup: F) -> Self {
        Self { cleanup: Some(cleanup) }
    }

    fn disarm(mut self) {
        self.cleanup = None;
    }
}

impl<F: FnOnce()> Drop for SetupGuard<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

fn argb_visual(screen: &Screen) -> Option<Visualid> {
    screen
        .allowed_depths
        .iter()
        .filter(|depth| depth.depth == x11::ARGB_DEPTH)
        .flat_map(|depth| depth.visuals.iter())
        .find(|visual| visual.class == VisualClass::TRUE_COLOR)
        .map(|visual| visual.visual_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Orientation;
    use std::cell::RefCell;

    fn color(alpha: u16) -> Color {
        Color {
            red: 0,
            green: 0,
            blue: 0,
            alpha,
        }
    }

    fn style() -> OverlayStyle {
        OverlayStyle {
            backdrop: color(1),
            zone: RegionStyle {
                background: color(2),
                background_inset: 0,
                border: color(3),
                border_inset: 5,
                border_thickness: 5,
            },
            hover: RegionStyle {
                background: color(4),
                background_inset: 0,
                border: color(5),
                border_inset: 5,
                border_thickness: 5,
            },
        }
    }

    #[test]
    fn test_outline_bars() {
        let bars = outline(Rect::new(5, 5, 90, 490), 5);
        assert_eq!(
            bars,
            vec![
                Rect::new(5, 5, 90, 5),
                Rect::new(5, 490, 90, 5),
                Rect::new(5, 10, 5, 480),
                Rect::new(90, 10, 5, 480),
            ]
        );
    }

    #[test]
    fn test_outline_of_tiny_rect() {
        assert!(outline(Rect::new(0, 0, 1, 100), 5).is_empty());
        // Thickness limited to half the smaller side
        let bars = outline(Rect::new(0, 0, 6, 100), 5);
        assert_eq!(bars[2].width, 3);
    }

    #[test]
    fn test_scene_draws_hover_last() {
        let zones = vec![
            Zone::new(0, 0, 100, 500, Orientation::Landscape),
            Zone::new(100, 0, 800, 500, Orientation::Landscape),
        ];
        let hover = Zone::new(0, 0, 900, 500, Orientation::Landscape);
        let layers = scene(&zones, Some(hover), &style());

        assert_eq!(layers.len(), 6);
        assert_eq!(layers[0].1, vec![Rect::new(0, 0, 100, 500)]);
        assert_eq!(layers[2].1, vec![Rect::new(100, 0, 800, 500)]);
        assert_eq!(layers[4].0.alpha, 4);
        assert_eq!(layers[4].1, vec![Rect::new(0, 0, 900, 500)]);
        assert_eq!(layers[5].0.alpha, 5);
        assert_eq!(layers[5].1[0], Rect::new(5, 5, 890, 5));
    }

    #[test]
    fn test_scene_without_hover() {
        let zones = vec![Zone::new(0, 0, 100, 500, Orientation::Landscape)];
        let layers = scene(&zones, None, &style());
        assert_eq!(layers.len(), 2);
        assert!(layers.iter().all(|(color, _)| color.alpha == 2 || color.alpha == 3));
    }

    fn setup_steps(fail_at: usize, log: &RefCell<Vec<&'static str>>) -> Result<()> {
        log.borrow_mut().push("create window");
        let guard = SetupGuard::new(|| log.borrow_mut().push("destroy window"));
        for (step, name) in ["picture format", "opacity", "picture"].into_iter().enumerate() {
            if step == fail_at {
                anyhow::bail!("{name} failed");
            }
            log.borrow_mut().push(name);
        }
        guard.disarm();
        Ok(())
    }

    #[test]
    fn test_failed_setup_after_window_creation_destroys_window() {
        let log = RefCell::new(Vec::new());
        assert!(setup_steps(0, &log).is_err());
        assert_eq!(*log.borrow(), vec!["create window", "destroy window"]);

        let log = RefCell::new(Vec::new());
        assert!(setup_steps(2, &log).is_err());
        assert_eq!(log.borrow().last(), Some(&"destroy window"));
    }

    #[test]
    fn test_completed_setup_keeps_window() {
        let log = RefCell::new(Vec::new());
        assert!(setup_steps(usize::MAX, &log).is_ok());
        assert!(!log.borrow().contains(&"destroy window"));
    }

    #[test]
    fn test_shutdown_waits_for_overlay_thread() {
        let (sender, receiver) = channel();
        let cleaned_up = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&cleaned_up);
        let handle = thread::spawn(move || {
            while let Ok(command) = receiver.recv() {
                if command == OverlayCommand::Shutdown {
                    thread::sleep(Duration::from_millis(50));
                    *flag.lock().unwrap() = true;
                    return;
                }
            }
        });

        let overlay = OverlayThread::new(handle);
        overlay.clone().shutdown(&sender);
        assert!(*cleaned_up.lock().unwrap());

        // Already joined; a second call only sends
        overlay.shutdown(&sender);
    }

    #[test]
    fn test_to_rectangle_clamps() {
        let rect = to_rectangle(Rect::new(-40000, 10, 70000, -3));
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (i16::MIN, 10, u16::MAX, 0));
    }
}
