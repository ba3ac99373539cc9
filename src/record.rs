//! Global pointer and keyboard input through the RECORD extension
//!
//! RECORD needs two connections: one to create and tear down the context,
//! and one that is parked inside `EnableContext` receiving the intercepted
//! device events.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::record::{self, ConnectionExt as RecordExt};
use x11rb::protocol::xproto::{
    BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT, ButtonPressEvent, KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
    KeyPressEvent, MOTION_NOTIFY_EVENT, MotionNotifyEvent,
};
use x11rb::rust_connection::RustConnection;
use x11rb::x11_utils::TryParse;

use crate::gesture::InputEvent;
use crate::keysym::KeycodeMap;
use crate::types::Point;

/// Size of a core protocol event
const EVENT_SIZE: usize = 32;

/// `EnableContext` reply category carrying intercepted server data
const CATEGORY_FROM_SERVER: u8 = 0;

pub struct InputRecorder {
    ctrl: RustConnection,
    data: RustConnection,
    context: record::Context,
}

impl InputRecorder {
    /// Open both connections and register a context for key, button and
    /// motion events of every client
    pub fn new(display: Option<&str>) -> Result<Self> {
        let (ctrl, _) = x11rb::connect(display).context("Failed to open RECORD control connection")?;
        let (data, _) = x11rb::connect(display).context("Failed to open RECORD data connection")?;

        let context = ctrl.generate_id().context("Failed to generate RECORD context ID")?;
        let range = record::Range {
            device_events: record::Range8 {
                first: KEY_PRESS_EVENT,
                last: MOTION_NOTIFY_EVENT,
            },
            ..Default::default()
        };
        ctrl.record_create_context(context, 0, &[record::CS::ALL_CLIENTS.into()], &[range])
            .context("Failed to send RECORD CreateContext")?
            .check()
            .context("Failed to create RECORD context")?;

        info!(context = context, "Created RECORD context");
        Ok(Self { ctrl, data, context })
    }

    /// Block on the data connection, handing every decoded event to
    /// `on_event` in arrival order. Returns only when the connection fails.
    pub fn run(&self, keycodes: &KeycodeMap, mut on_event: impl FnMut(InputEvent)) -> Result<()> {
        let replies = self
            .data
            .record_enable_context(self.context)
            .context("Failed to enable RECORD context")?;

        for reply in replies {
            let reply = reply.context("RECORD data connection failed")?;
            if reply.client_swapped {
                warn!("Ignoring RECORD data with swapped byte order");
                continue;
            }
            if reply.category != CATEGORY_FROM_SERVER {
                continue;
            }
            for event in parse_events(&reply.data, keycodes) {
                on_event(event);
            }
        }
        Ok(())
    }
}

impl Drop for InputRecorder {
    fn drop(&mut self) {
        let result = self
            .ctrl
            .record_disable_context(self.context)
            .and_then(|_| self.ctrl.record_free_context(self.context))
            .and_then(|_| self.ctrl.flush());
        if let Err(e) = result {
            debug!(error = %e, "Failed to release RECORD context");
        }
    }
}

/// Decode the core events packed in one RECORD reply. Keys without a keysym
/// and event types outside the recorded range are skipped.
pub fn parse_events(mut data: &[u8], keycodes: &KeycodeMap) -> Vec<InputEvent> {
    let mut events = Vec::new();

    while data.len() >= EVENT_SIZE {
        let (chunk, rest) = data.split_at(EVENT_SIZE);
        data = rest;

        // High bit marks events sent with SendEvent
        let event = match chunk[0] & 0x7f {
            KEY_PRESS_EVENT | KEY_RELEASE_EVENT => KeyPressEvent::try_parse(chunk).ok().and_then(|(key, _)| {
                let keysym = keycodes.keysym(key.detail)?;
                Some(if key.response_type & 0x7f == KEY_PRESS_EVENT {
                    InputEvent::KeyPress(keysym)
                } else {
                    InputEvent::KeyRelease(keysym)
                })
            }),
            BUTTON_PRESS_EVENT | BUTTON_RELEASE_EVENT => {
                ButtonPressEvent::try_parse(chunk).ok().map(|(button, _)| {
                    let root = Point::new(button.root_x as i32, button.root_y as i32);
                    if button.response_type & 0x7f == BUTTON_PRESS_EVENT {
                        InputEvent::ButtonPress { button: button.detail, root }
                    } else {
                        InputEvent::ButtonRelease { button: button.detail, root }
                    }
                })
            }
            MOTION_NOTIFY_EVENT => MotionNotifyEvent::try_parse(chunk).ok().map(|(motion, _)| InputEvent::Motion {
                root: Point::new(motion.root_x as i32, motion.root_y as i32),
            }),
            _ => None,
        };

        if let Some(event) = event {
            events.push(event);
        }
    }

    events
}
