//! The mirror engine: display polling and inbound message classification.
//!
//! Two sides run concurrently against one [`MirrorEngine`]:
//!
//! 1. **Polling**: [`MirrorEngine::run`] on a dedicated thread. Each
//!    iteration ([`MirrorEngine::poll_once`]) may send the display request
//!    and counts it as unanswered until a reply resets the counter.
//! 2. **Receiving**: [`MirrorEngine::accept`], called by the input port's
//!    callback once per message. It deduplicates, decodes display dumps, and
//!    notifies the front end.
//!
//! Front ends read state through the getters and get change notifications
//! through [`MirrorEngine::set_on_update`].

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread;

use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::filename;
use crate::id::DeviceId;
use crate::profile::DeviceProfile;
use crate::protocol::Message;
use crate::state::{EngineState, Mode};
use crate::sysex::{self, Frame};
use crate::transport::{OutputPort, TransportError};

/// What changed, passed to the update callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// New display rows are available via [`MirrorEngine::decoded_lines`].
    Display,
    /// A new non-display message is available via
    /// [`MirrorEngine::last_plain_message`].
    Plain,
}

/// Result of one polling iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing to send this iteration.
    Idle,
    /// The display request went out.
    Sent,
    /// A fatal error was recorded; the loop must stop.
    Failed,
    /// Quit was requested.
    Quit,
}

type UpdateHook = Arc<dyn Fn(Update) + Send + Sync>;
type WireHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Display mirror for one instrument.
pub struct MirrorEngine {
    state: EngineState,
    profile: RwLock<DeviceProfile>,
    output: Mutex<Option<Box<dyn OutputPort>>>,
    config: EngineConfig,
    on_update: Mutex<Option<UpdateHook>>,
    /// Called after every successful send with the sent bytes.
    on_send: Mutex<Option<WireHook>>,
    /// Called for every message handed to `accept`, before classification.
    on_recv: Mutex<Option<WireHook>>,
}

impl MirrorEngine {
    pub fn new(profile: DeviceProfile, config: EngineConfig) -> Self {
        Self {
            state: EngineState::new(Mode::Direct),
            profile: RwLock::new(profile),
            output: Mutex::new(None),
            config,
            on_update: Mutex::new(None),
            on_send: Mutex::new(None),
            on_recv: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Hooks and ports
    // -----------------------------------------------------------------------

    /// Register the front end's change notification.
    pub fn set_on_update(&self, f: impl Fn(Update) + Send + Sync + 'static) {
        *lock(&self.on_update) = Some(Arc::new(f));
    }

    /// Register a callback invoked after every message sent to the device.
    pub fn set_on_send(&self, f: impl Fn(&[u8]) + Send + Sync + 'static) {
        *lock(&self.on_send) = Some(Arc::new(f));
    }

    /// Register a callback invoked for every message received.
    pub fn set_on_recv(&self, f: impl Fn(&[u8]) + Send + Sync + 'static) {
        *lock(&self.on_recv) = Some(Arc::new(f));
    }

    /// Use `port` for display requests, replacing any previous output.
    pub fn attach_output(&self, port: Box<dyn OutputPort>) {
        debug!(output = port.name(), "attach output");
        *lock(&self.output) = Some(port);
    }

    /// Close the current output, if any.
    pub fn detach_output(&self) {
        *lock(&self.output) = None;
    }

    /// Name of the attached output port.
    pub fn output_name(&self) -> Option<String> {
        lock(&self.output).as_ref().map(|p| p.name().to_string())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn set_mode(&self, mode: Mode) {
        let old = self.state.mode();
        if old != mode {
            debug!(?old, new = ?mode, "mode change");
        }
        self.state.set_mode(mode);
    }

    pub fn paused(&self) -> bool {
        self.state.paused()
    }

    pub fn set_paused(&self, paused: bool) {
        if self.state.set_paused(paused) {
            debug!(paused, "pause change");
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.state.quit_requested()
    }

    pub fn request_quit(&self) {
        self.state.request_quit();
    }

    /// Text of the fatal error that stopped the engine, if any.
    pub fn error(&self) -> Option<String> {
        self.state.error()
    }

    pub fn unanswered(&self) -> u32 {
        self.state.unanswered()
    }

    pub fn decoded_lines(&self) -> Vec<String> {
        self.state.decoded_lines()
    }

    pub fn last_plain_message(&self) -> Vec<u8> {
        self.state.last_plain()
    }

    /// One-line description of the last non-display message.
    pub fn describe_last_plain(&self) -> Option<String> {
        let msg = self.state.last_plain();
        if msg.is_empty() {
            return None;
        }
        let profile = read(&self.profile);
        Some(Message::decode(&msg, profile.catalog(), profile.display_dump_command()).to_string())
    }

    /// Dump type name of the last non-display message, if it is a known dump.
    pub fn last_type(&self) -> Option<&'static str> {
        let msg = self.state.last_plain();
        read(&self.profile).catalog().classify(&msg).map(|t| t.name)
    }

    /// Snapshot of the device profile.
    pub fn profile(&self) -> DeviceProfile {
        read(&self.profile).clone()
    }

    pub fn device_id(&self) -> DeviceId {
        read(&self.profile).device_id()
    }

    /// Change the device id; the next poll uses the rebuilt request.
    pub fn set_device_id(&self, device_id: DeviceId) {
        write(&self.profile).set_device_id(device_id);
        debug!(%device_id, "device id change");
    }

    // -----------------------------------------------------------------------
    // Dumps
    // -----------------------------------------------------------------------

    /// Suggested file name for the last non-display message.
    pub fn suggested_filename(&self) -> Result<String> {
        let msg = self.state.last_plain();
        filename::suggest(&msg, read(&self.profile).catalog())
    }

    /// Write the last non-display message verbatim to `path`.
    ///
    /// Only complete, savable catalogue dumps are written. Anything that is
    /// not a well-formed SysEx message, or is a display, mode or remote dump,
    /// is [`Error::NoDump`]; an unknown command byte is
    /// [`Error::UnknownCommand`].
    pub fn save_last_dump(&self, path: impl AsRef<Path>) -> Result<()> {
        let msg = self.state.last_plain();
        let frame = Frame::parse(&msg).map_err(|e| {
            trace!(error = %e, "last message is not a dump");
            Error::NoDump
        })?;
        let cmd = frame.get(sysex::CMD_OFFSET).ok_or(Error::NoDump)?;
        let savable = read(&self.profile)
            .catalog()
            .lookup(cmd)
            .ok_or(Error::UnknownCommand { cmd })?
            .is_savable();
        if !savable {
            return Err(Error::NoDump);
        }
        let path = path.as_ref();
        fs::write(path, frame.bytes())?;
        debug!(path = %path.display(), len = frame.len(), "saved dump");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Poll until quit is requested or a fatal error occurs.
    pub fn run(&self) {
        debug!(interval = ?self.config.poll_interval, "polling started");
        loop {
            match self.poll_once() {
                PollOutcome::Failed | PollOutcome::Quit => break,
                PollOutcome::Sent | PollOutcome::Idle => thread::sleep(self.config.poll_interval),
            }
        }
        debug!("polling stopped");
    }

    /// One polling iteration.
    pub fn poll_once(&self) -> PollOutcome {
        if self.state.quit_requested() {
            return PollOutcome::Quit;
        }
        if self.state.paused() {
            return PollOutcome::Idle;
        }
        let unanswered = self.state.unanswered();
        if unanswered > self.config.max_unanswered {
            let err = Error::Unresponsive { limit: self.config.max_unanswered };
            warn!(unanswered, "{err}");
            self.state.fail(err.to_string());
            return PollOutcome::Failed;
        }

        let due = match self.state.mode() {
            Mode::ContinuousDisplay => true,
            Mode::DisplayOnDemand => self.state.new_data(),
            Mode::Direct => false,
        };
        if !due {
            return PollOutcome::Idle;
        }

        // Counted before sending: a reply may arrive before `send` returns.
        let unanswered = self.state.count_unanswered();
        match self.send_display_request() {
            Ok(()) => {
                trace!(unanswered, "display request sent");
                PollOutcome::Sent
            }
            Err(e) => {
                self.state.uncount_unanswered();
                warn!(error = %e, "display request failed");
                self.state.fail(e.to_string());
                PollOutcome::Failed
            }
        }
    }

    fn send_display_request(&self) -> std::result::Result<(), TransportError> {
        let request = *read(&self.profile).display_request();
        let mut output = lock(&self.output);
        let port = output
            .as_mut()
            .ok_or_else(|| TransportError::Backend("no MIDI output port open".into()))?;
        port.send(&request)?;
        drop(output);
        if let Some(hook) = clone_hook(&self.on_send) {
            hook(&request);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// Handle one inbound message.
    pub fn accept(&self, msg: &[u8]) {
        if let Some(hook) = clone_hook(&self.on_recv) {
            hook(msg);
        }
        if self.state.paused() {
            // Identity replies during discovery go to the probe listener.
            return;
        }

        let (display_cmd, mode) = (read(&self.profile).display_dump_command(), self.state.mode());
        let is_display = sysex::command_byte(msg) == Some(display_cmd);
        trace!(len = msg.len(), is_display, ?mode, "accept");

        match (mode, is_display) {
            (Mode::ContinuousDisplay, true) => {
                self.state.reset_unanswered();
                self.take_display(msg);
            }
            (Mode::ContinuousDisplay, false) => {}
            (_, false) => {
                if self.state.replace_plain(msg) {
                    match mode {
                        Mode::Direct => self.notify(Update::Plain),
                        _ => self.state.set_new_data(true),
                    }
                }
            }
            (Mode::DisplayOnDemand, true) => {
                self.state.reset_unanswered();
                self.state.set_new_data(false);
                self.take_display(msg);
            }
            (Mode::Direct, true) => self.state.reset_unanswered(),
        }
    }

    fn take_display(&self, msg: &[u8]) {
        let replaced = {
            let profile = read(&self.profile);
            self.state.replace_display(msg, |m| profile.decode_display(m))
        };
        if replaced {
            self.notify(Update::Display);
        }
    }

    fn notify(&self, update: Update) {
        if let Some(hook) = clone_hook(&self.on_update) {
            hook(update);
        }
    }
}

impl Default for MirrorEngine {
    fn default() -> Self {
        Self::new(DeviceProfile::microwave(), EngineConfig::default())
    }
}

impl std::fmt::Debug for MirrorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorEngine")
            .field("state", &self.state)
            .field("device_id", &self.device_id())
            .field("output", &self.output_name())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Lock helpers (poison-tolerant)
// ---------------------------------------------------------------------------

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clone_hook<T: ?Sized>(slot: &Mutex<Option<Arc<T>>>) -> Option<Arc<T>> {
    lock(slot).clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
