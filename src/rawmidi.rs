//! Linux raw MIDI backend over ALSA device nodes (`/dev/snd/midiC*D*`).
//!
//! A device node can only be opened for reading once, so each device gets
//! one reader thread that lives as long as the backend. Opening an
//! [`InputPort`] installs a callback in that reader's slot; dropping the port
//! clears it again. Messages arriving with an empty slot are discarded.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use tracing::{debug, trace, warn};

use crate::sysex::{self, MessageSplitter};
use crate::transport::{Backend, InputPort, MessageCallback, OutputPort, TransportError};

/// Where ALSA puts its device nodes.
pub const DEVICE_DIR: &str = "/dev/snd";

/// One raw MIDI device node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub card: u32,
    pub device: u32,
    pub path: PathBuf,
    /// `hw:C,D`, followed by the card id when known.
    pub name: String,
}

/// Callback slot shared by a reader thread and the ports attached to it.
struct Slot {
    token: u64,
    callback: Option<MessageCallback>,
}

struct Reader {
    slot: Mutex<Slot>,
}

impl Reader {
    fn attach(&self, token: u64, callback: MessageCallback) {
        *lock(&self.slot) = Slot { token, callback: Some(callback) };
    }

    fn detach(&self, token: u64) {
        let mut slot = lock(&self.slot);
        if slot.token == token {
            slot.callback = None;
        }
    }

    fn deliver(&self, msg: &[u8]) {
        if let Some(cb) = lock(&self.slot).callback.as_mut() {
            cb(msg);
        }
    }
}

/// Raw MIDI backend. Every device node is both an input and an output, so
/// input and output indices refer to the same list.
pub struct RawMidi {
    devices: Vec<Device>,
    readers: Mutex<HashMap<PathBuf, Arc<Reader>>>,
    next_token: AtomicU64,
}

impl RawMidi {
    /// Scan [`DEVICE_DIR`] for device nodes.
    pub fn new() -> Result<Self, TransportError> {
        Self::scan(Path::new(DEVICE_DIR))
    }

    /// Scan `dir` for `midiC<card>D<device>` nodes, sorted by card and device.
    pub fn scan(dir: &Path) -> Result<Self, TransportError> {
        let mut devices = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some((card, device)) = file_name.to_str().and_then(parse_node_name) else {
                continue;
            };
            let mut name = format!("hw:{card},{device}");
            if let Ok(id) = fs::read_to_string(format!("/proc/asound/card{card}/id")) {
                name = format!("{name} {}", id.trim());
            }
            devices.push(Device { card, device, path: entry.path(), name });
        }
        devices.sort_by_key(|d| (d.card, d.device));
        debug!(count = devices.len(), "raw MIDI devices");
        Ok(Self {
            devices,
            readers: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    fn device(&self, index: usize) -> Result<&Device, TransportError> {
        self.devices.get(index).ok_or(TransportError::NoSuchPort {
            index,
            count: self.devices.len(),
        })
    }

    /// The reader for `dev`, starting its thread on first use.
    fn reader(&self, dev: &Device) -> Result<Arc<Reader>, TransportError> {
        let mut readers = lock(&self.readers);
        if let Some(reader) = readers.get(&dev.path) {
            return Ok(reader.clone());
        }
        let file = File::open(&dev.path)?;
        let reader = Arc::new(Reader {
            slot: Mutex::new(Slot { token: 0, callback: None }),
        });
        let shared = reader.clone();
        let name = dev.name.clone();
        thread::Builder::new()
            .name(format!("mwsd-rx {}", dev.name))
            .spawn(move || read_loop(file, &shared, &name))?;
        readers.insert(dev.path.clone(), reader.clone());
        Ok(reader)
    }
}

fn read_loop(mut file: File, reader: &Reader, name: &str) {
    let mut splitter = MessageSplitter::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => {
                debug!(device = name, "raw MIDI device closed");
                return;
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(device = name, error = %e, "raw MIDI read failed");
                return;
            }
        };
        for msg in splitter.feed(&buf[..n]) {
            trace!(device = name, "rx {}", sysex::hex(&msg, 16));
            reader.deliver(&msg);
        }
    }
}

/// Parse `midiC<card>D<device>`.
fn parse_node_name(name: &str) -> Option<(u32, u32)> {
    let rest = name.strip_prefix("midiC")?;
    let (card, device) = rest.split_once('D')?;
    Some((card.parse().ok()?, device.parse().ok()?))
}

impl Backend for RawMidi {
    type Input = RawInput;
    type Output = RawOutput;

    fn input_names(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.devices.iter().map(|d| d.name.clone()).collect())
    }

    fn output_names(&self) -> Result<Vec<String>, TransportError> {
        self.input_names()
    }

    fn open_input(
        &self,
        index: usize,
        client: &str,
        on_message: MessageCallback,
    ) -> Result<RawInput, TransportError> {
        let dev = self.device(index)?;
        let reader = self.reader(dev)?;
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        reader.attach(token, on_message);
        debug!(client, input = %dev.name, "input open");
        Ok(RawInput { name: dev.name.clone(), reader, token })
    }

    fn open_output(&self, index: usize, client: &str) -> Result<RawOutput, TransportError> {
        let dev = self.device(index)?;
        let file = OpenOptions::new().write(true).open(&dev.path)?;
        debug!(client, output = %dev.name, "output open");
        Ok(RawOutput { name: dev.name.clone(), file })
    }
}

/// Listener attached to a device's reader. Detaches on drop.
pub struct RawInput {
    name: String,
    reader: Arc<Reader>,
    token: u64,
}

impl InputPort for RawInput {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RawInput {
    fn drop(&mut self) {
        self.reader.detach(self.token);
    }
}

pub struct RawOutput {
    name: String,
    file: File,
}

impl OutputPort for RawOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, msg: &[u8]) -> Result<(), TransportError> {
        self.file.write_all(msg)?;
        self.file.flush()?;
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_names() {
        assert_eq!(parse_node_name("midiC1D0"), Some((1, 0)));
        assert_eq!(parse_node_name("midiC12D3"), Some((12, 3)));
        assert_eq!(parse_node_name("pcmC0D0p"), None);
        assert_eq!(parse_node_name("midiC1"), None);
        assert_eq!(parse_node_name("controlC0"), None);
    }

    #[test]
    fn scan_ignores_other_nodes() {
        let dir = std::env::temp_dir().join(format!("mwsd-snd-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["midiC1D0", "midiC0D1", "midiC0D0", "pcmC0D0p", "seq"] {
            File::create(dir.join(name)).unwrap();
        }
        let midi = RawMidi::scan(&dir).unwrap();
        let found: Vec<_> = midi.devices().iter().map(|d| (d.card, d.device)).collect();
        assert_eq!(found, vec![(0, 0), (0, 1), (1, 0)]);
        assert!(matches!(
            midi.open_output(7, "test"),
            Err(TransportError::NoSuchPort { index: 7, count: 3 })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn detach_only_clears_own_token() {
        let reader = Reader { slot: Mutex::new(Slot { token: 0, callback: None }) };
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        reader.attach(2, Box::new(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
        }));
        reader.detach(1);
        reader.deliver(&[0xF8]);
        reader.detach(2);
        reader.deliver(&[0xF8]);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
