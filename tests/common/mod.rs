//! In-memory MIDI backend with a simulated Microwave wired to chosen ports.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mwsd::protocol::identity::IDENTITY_REQUEST;
use mwsd::transport::{Backend, InputPort, MessageCallback, OutputPort, TransportError};

/// Synthesizer behaviour.
pub struct Synth {
    /// (input, output) pairs the synth is wired to. A request on `output` is
    /// answered on `input`.
    pub links: Vec<(usize, usize)>,
    pub manufacturer_id: u8,
    pub equipment_id: u8,
    pub device_id: u8,
    /// Reply to display requests with this dump; `None` stays silent.
    pub display: Option<Vec<u8>>,
}

impl Synth {
    pub fn microwave(links: Vec<(usize, usize)>) -> Self {
        Self {
            links,
            manufacturer_id: 0x3E,
            equipment_id: 0x0E,
            device_id: 0x05,
            display: None,
        }
    }

    pub fn identity_reply(&self) -> Vec<u8> {
        vec![
            0xF0,
            0x7E,
            0x06,
            0x02,
            self.manufacturer_id,
            self.equipment_id,
            self.device_id,
            0x00,
            0x00,
            0x00,
            0x02,
            0x00,
            0x00,
            0xF7,
        ]
    }
}

struct Listener {
    token: u64,
    callback: MessageCallback,
}

struct Inner {
    inputs: usize,
    outputs: usize,
    synth: Mutex<Synth>,
    listeners: Mutex<Vec<Option<Listener>>>,
    /// Outputs currently open. A second open of the same output fails, as
    /// it does on a single-client device node.
    busy_outputs: Mutex<Vec<bool>>,
    next_token: Mutex<u64>,
    sent: Mutex<Vec<(usize, Vec<u8>)>>,
}

/// Cloneable handle; clones share ports and synth.
#[derive(Clone)]
pub struct SimBackend {
    inner: Arc<Inner>,
}

impl SimBackend {
    pub fn new(inputs: usize, outputs: usize, synth: Synth) -> Self {
        Self {
            inner: Arc::new(Inner {
                inputs,
                outputs,
                synth: Mutex::new(synth),
                listeners: Mutex::new((0..inputs).map(|_| None).collect()),
                busy_outputs: Mutex::new(vec![false; outputs]),
                next_token: Mutex::new(1),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Everything sent so far, with the output index.
    pub fn sent(&self) -> Vec<(usize, Vec<u8>)> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn set_display(&self, dump: Option<Vec<u8>>) {
        self.inner.synth.lock().unwrap().display = dump;
    }

    /// Whether input `index` currently has a listener.
    pub fn listening(&self, index: usize) -> bool {
        self.inner.listeners.lock().unwrap()[index].is_some()
    }

    /// Whether output `index` is currently open.
    pub fn output_open(&self, index: usize) -> bool {
        self.inner.busy_outputs.lock().unwrap()[index]
    }

    /// Deliver `msg` on input `index` as if the synth had sent it.
    pub fn inject(&self, index: usize, msg: &[u8]) {
        let mut listeners = self.inner.listeners.lock().unwrap();
        if let Some(l) = listeners[index].as_mut() {
            (l.callback)(msg);
        }
    }

    fn answer(&self, output: usize, msg: &[u8]) {
        let replies: Vec<(usize, Vec<u8>)> = {
            let synth = self.inner.synth.lock().unwrap();
            let reply = if msg == IDENTITY_REQUEST {
                Some(synth.identity_reply())
            } else if msg.len() == 7
                && msg[1] == synth.manufacturer_id
                && msg[2] == synth.equipment_id
                && msg[4] == 0x05
            {
                synth.display.clone()
            } else {
                None
            };
            match reply {
                Some(r) => synth
                    .links
                    .iter()
                    .filter(|&&(_, o)| o == output)
                    .map(|&(i, _)| (i, r.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };
        for (input, reply) in replies {
            self.inject(input, &reply);
        }
    }
}

pub struct SimInput {
    name: String,
    index: usize,
    token: u64,
    backend: SimBackend,
}

impl InputPort for SimInput {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SimInput {
    fn drop(&mut self) {
        let mut listeners = self.backend.inner.listeners.lock().unwrap();
        if listeners[self.index].as_ref().is_some_and(|l| l.token == self.token) {
            listeners[self.index] = None;
        }
    }
}

pub struct SimOutput {
    name: String,
    index: usize,
    backend: SimBackend,
}

impl Drop for SimOutput {
    fn drop(&mut self) {
        self.backend.inner.busy_outputs.lock().unwrap()[self.index] = false;
    }
}

impl OutputPort for SimOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, msg: &[u8]) -> Result<(), TransportError> {
        self.backend.inner.sent.lock().unwrap().push((self.index, msg.to_vec()));
        self.backend.answer(self.index, msg);
        Ok(())
    }
}

impl Backend for SimBackend {
    type Input = SimInput;
    type Output = SimOutput;

    fn input_names(&self) -> Result<Vec<String>, TransportError> {
        Ok((0..self.inner.inputs).map(|i| format!("sim in {i}")).collect())
    }

    fn output_names(&self) -> Result<Vec<String>, TransportError> {
        Ok((0..self.inner.outputs).map(|i| format!("sim out {i}")).collect())
    }

    fn open_input(
        &self,
        index: usize,
        _client: &str,
        on_message: MessageCallback,
    ) -> Result<SimInput, TransportError> {
        if index >= self.inner.inputs {
            return Err(TransportError::NoSuchPort { index, count: self.inner.inputs });
        }
        let token = {
            let mut next = self.inner.next_token.lock().unwrap();
            *next += 1;
            *next
        };
        self.inner.listeners.lock().unwrap()[index] = Some(Listener { token, callback: on_message });
        Ok(SimInput {
            name: format!("sim in {index}"),
            index,
            token,
            backend: self.clone(),
        })
    }

    fn open_output(&self, index: usize, _client: &str) -> Result<SimOutput, TransportError> {
        if index >= self.inner.outputs {
            return Err(TransportError::NoSuchPort { index, count: self.inner.outputs });
        }
        let mut busy = self.inner.busy_outputs.lock().unwrap();
        if busy[index] {
            return Err(TransportError::Backend(format!("sim out {index} is busy")));
        }
        busy[index] = true;
        Ok(SimOutput {
            name: format!("sim out {index}"),
            index,
            backend: self.clone(),
        })
    }
}

/// Config with short waits for tests.
pub fn fast_config() -> mwsd::EngineConfig {
    mwsd::EngineConfig {
        poll_interval: Duration::from_millis(2),
        probe_window: Duration::from_millis(1),
        ..Default::default()
    }
}

/// Display dump carrying `text`.
pub fn display_dump(text: &str) -> Vec<u8> {
    let mut msg = vec![0xF0, 0x3E, 0x0E, 0x05, 0x15];
    msg.extend_from_slice(text.as_bytes());
    msg.push(0xF7);
    msg
}

/// Poll `cond` until it holds or two seconds pass.
pub fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}
