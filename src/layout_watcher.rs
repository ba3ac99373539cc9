//! Keeps the published zone profile in step with the window system
//!
//! A listener thread turns root-window property changes and RandR screen
//! changes into [`LayoutSignal`]s. A single debouncer thread coalesces each
//! burst, rebuilds, and swaps the shared profile in one step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError, sync_channel};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::randr::{ConnectionExt as RandrExt, NotifyMask};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::ZoneSpec;
use crate::constants::atoms::{
    GTK_WORKAREAS_PREFIX, NET_CURRENT_DESKTOP, NET_NUMBER_OF_DESKTOPS, NET_WORKAREA, NET_WORKAREAS_PREFIX,
};
use crate::constants::watcher::SIGNAL_CAPACITY;
use crate::overlay::OverlayCommand;
use crate::x11_utils::{self, CachedAtoms};
use crate::zones::{SharedProfile, ZoneProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutSignal {
    /// The current desktop changed
    Desktop,
    /// Monitors, work areas or the desktop count changed
    Rebuild,
}

/// Which signal a change of the root property `name` raises
pub fn classify(name: &str) -> Option<LayoutSignal> {
    match name {
        NET_CURRENT_DESKTOP => Some(LayoutSignal::Desktop),
        NET_WORKAREA | NET_NUMBER_OF_DESKTOPS => Some(LayoutSignal::Rebuild),
        _ if name.starts_with(GTK_WORKAREAS_PREFIX) || name.starts_with(NET_WORKAREAS_PREFIX) => {
            Some(LayoutSignal::Rebuild)
        }
        _ => None,
    }
}

/// Where the debouncer gets fresh layout data from
pub trait LayoutSource {
    fn build_profile(&self) -> Result<ZoneProfile>;
    fn current_desktop(&self) -> Result<usize>;
}

/// Layout data read over a dedicated connection
pub struct X11LayoutSource {
    conn: RustConnection,
    root: Window,
    atoms: CachedAtoms,
    spec: ZoneSpec,
    merge_zone_size: f64,
}

impl X11LayoutSource {
    pub fn connect(spec: ZoneSpec, merge_zone_size: f64) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 server for layout rebuilds")?;
        let root = conn.setup().roots[screen_num].root;
        let atoms = CachedAtoms::new(&conn).context("Failed to cache X11 atoms for layout rebuilds")?;
        Ok(Self {
            conn,
            root,
            atoms,
            spec,
            merge_zone_size,
        })
    }
}

impl LayoutSource for X11LayoutSource {
    fn build_profile(&self) -> Result<ZoneProfile> {
        x11_utils::build_profile(&self.conn, self.root, &self.atoms, &self.spec, self.merge_zone_size)
    }

    fn current_desktop(&self) -> Result<usize> {
        x11_utils::current_desktop(&self.conn, self.root, &self.atoms)
    }
}

/// Shared state the debouncer publishes into
pub struct LayoutTargets {
    pub profile: Arc<SharedProfile>,
    pub desktop: Arc<AtomicUsize>,
    pub overlay: Sender<OverlayCommand>,
}

/// Sending half of the "layout dirty" queue. Rebuild requests are also
/// latched in a flag the debouncer clears, so a queue filled with desktop
/// signals cannot swallow one.
struct SignalSender {
    sender: SyncSender<LayoutSignal>,
    rebuild: Arc<AtomicBool>,
}

impl SignalSender {
    fn new(sender: SyncSender<LayoutSignal>, rebuild: Arc<AtomicBool>) -> Self {
        Self { sender, rebuild }
    }

    /// Returns `false` once the debouncer is gone
    fn raise(&self, signal: LayoutSignal) -> bool {
        if signal == LayoutSignal::Rebuild {
            self.rebuild.store(true, Ordering::Release);
        }
        match self.sender.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(signal = ?signal, "Layout already dirty");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Start the listener and debouncer threads
pub fn spawn<S: LayoutSource + Send + 'static>(
    source: S,
    targets: LayoutTargets,
    debounce: Duration,
) -> Result<Vec<thread::JoinHandle<()>>> {
    let (sender, receiver) = sync_channel(SIGNAL_CAPACITY);
    let rebuild = Arc::new(AtomicBool::new(false));
    let signals = SignalSender::new(sender, Arc::clone(&rebuild));

    let listener = thread::Builder::new()
        .name("layout-listener".to_string())
        .spawn(move || {
            info!("Layout listener started");
            if let Err(e) = listen(signals) {
                error!(error = ?e, "Layout listener failed, zones will no longer follow display changes");
            }
        })
        .context("Failed to spawn layout listener thread")?;

    let debouncer = thread::Builder::new()
        .name("layout-debouncer".to_string())
        .spawn(move || {
            debounce_loop(&source, &targets, &receiver, &rebuild, debounce);
            debug!("Layout debouncer stopped");
        })
        .context("Failed to spawn layout debouncer thread")?;

    Ok(vec![listener, debouncer])
}

fn listen(signals: SignalSender) -> Result<()> {
    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 server for layout listener")?;
    let root = conn.setup().roots[screen_num].root;

    conn.change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE))
        .context("Failed to select property changes on root window")?;
    conn.randr_select_input(root, NotifyMask::SCREEN_CHANGE)
        .context("Failed to select RandR screen changes")?;
    conn.flush().context("Failed to flush layout listener setup")?;

    loop {
        let signal = match conn.wait_for_event().context("Layout listener connection failed")? {
            Event::PropertyNotify(event) => match x11_utils::atom_name(&conn, event.atom) {
                Ok(name) => {
                    trace!(property = %name, "Root property changed");
                    classify(&name)
                }
                Err(e) => {
                    warn!(atom = event.atom, error = ?e, "Failed to look up changed property");
                    None
                }
            },
            Event::RandrScreenChangeNotify(_) => Some(LayoutSignal::Rebuild),
            _ => None,
        };

        if let Some(signal) = signal
            && !signals.raise(signal)
        {
            return Ok(());
        }
    }
}

/// Wait for a signal, swallow everything that follows within `debounce`,
/// then refresh once. Whether to rebuild comes from the `rebuild` latch, not
/// from the signals that happened to fit in the queue.
fn debounce_loop<S: LayoutSource>(
    source: &S,
    targets: &LayoutTargets,
    receiver: &Receiver<LayoutSignal>,
    rebuild: &AtomicBool,
    debounce: Duration,
) {
    while receiver.recv().is_ok() {
        let disconnected = loop {
            match receiver.recv_timeout(debounce) {
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => break false,
                Err(RecvTimeoutError::Disconnected) => break true,
            }
        };
        refresh(source, targets, rebuild.swap(false, Ordering::AcqRel));
        if disconnected {
            return;
        }
    }
}

fn refresh<S: LayoutSource>(source: &S, targets: &LayoutTargets, rebuild: bool) {
    if rebuild {
        match source.build_profile() {
            Ok(profile) => {
                info!(desktops = profile.desktop_count(), "Zone profile rebuilt");
                targets.profile.store(profile);
            }
            Err(e) => error!(error = ?e, "Failed to rebuild zone profile, keeping the previous one"),
        }
    }

    match source.current_desktop() {
        Ok(desktop) => {
            let previous = targets.desktop.swap(desktop, Ordering::AcqRel);
            if previous != desktop {
                debug!(from = previous, to = desktop, "Current desktop changed");
            }
        }
        Err(e) => warn!(error = ?e, "Failed to read current desktop"),
    }

    let desktop = targets.desktop.load(Ordering::Acquire);
    let zones = targets.profile.load().zones(desktop).to_vec();
    if targets.overlay.send(OverlayCommand::SetZones(zones)).is_err() {
        warn!("Overlay thread is gone, zones not updated");
    }
}
