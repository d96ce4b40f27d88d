//! A mirror session: one backend, one engine, the open ports, and the
//! polling thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::discovery::{self, DiscoveryResult, PauseGuard, PortPair};
use crate::engine::MirrorEngine;
use crate::error::Result;
use crate::profile::DeviceProfile;
use crate::transport::{Backend, TransportError};

pub struct Session<B: Backend> {
    backend: B,
    engine: Arc<MirrorEngine>,
    input: Option<B::Input>,
    input_index: Option<usize>,
    output_index: Option<usize>,
    poller: Option<JoinHandle<()>>,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B, profile: DeviceProfile, config: EngineConfig) -> Self {
        Self {
            backend,
            engine: Arc::new(MirrorEngine::new(profile, config)),
            input: None,
            input_index: None,
            output_index: None,
            poller: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn engine(&self) -> &Arc<MirrorEngine> {
        &self.engine
    }

    /// Currently connected (input, output), if both are open.
    pub fn ports(&self) -> Option<PortPair> {
        Some(PortPair::new(self.input_index?, self.output_index?))
    }

    /// Open `pair`, replacing any ports opened earlier.
    pub fn connect(&mut self, pair: PortPair) -> Result<()> {
        self.connect_output(pair.output)?;
        self.connect_input(pair.input)
    }

    /// Open the input and output ports with these names.
    pub fn connect_by_name(&mut self, input: &str, output: &str) -> Result<()> {
        let input_index = self
            .backend
            .input_index_by_name(input)?
            .ok_or_else(|| TransportError::Backend(format!("no MIDI input called {input:?}")))?;
        let output_index = self
            .backend
            .output_index_by_name(output)?
            .ok_or_else(|| TransportError::Backend(format!("no MIDI output called {output:?}")))?;
        self.connect(PortPair::new(input_index, output_index))
    }

    /// Open input `index`, routing every message into the engine.
    pub fn connect_input(&mut self, index: usize) -> Result<()> {
        // Close first: some backends allow one listener per port.
        self.input = None;
        let engine = self.engine.clone();
        let port = self.backend.open_input(
            index,
            &self.engine.config().client_name,
            Box::new(move |msg| engine.accept(msg)),
        )?;
        debug!(input = index, "input connected");
        self.input = Some(port);
        self.input_index = Some(index);
        Ok(())
    }

    /// Open output `index` for display requests.
    pub fn connect_output(&mut self, index: usize) -> Result<()> {
        self.engine.detach_output();
        let port = self.backend.open_output(index, &self.engine.config().client_name)?;
        self.engine.attach_output(Box::new(port));
        self.output_index = Some(index);
        Ok(())
    }

    /// Spawn the polling thread. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.poller.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        let engine = self.engine.clone();
        let handle = thread::Builder::new()
            .name("mwsd-poll".into())
            .spawn(move || engine.run())?;
        self.poller = Some(handle);
        Ok(())
    }

    /// Find the instrument: probe every port pair, then read its device id.
    ///
    /// Regular processing is paused throughout. The session's own ports are
    /// closed while probing and reopened afterwards. The device id is read
    /// from the connected pair if it answered, otherwise from the first
    /// match, and applied to the engine.
    pub fn discover(&mut self) -> Result<DiscoveryResult> {
        let engine = self.engine.clone();
        let _pause = PauseGuard::new(&engine);

        let connected = self.ports();
        let (input, output) = (self.input_index, self.output_index);
        // Probes open every port; a port the session holds may block or fail.
        self.input = None;
        engine.detach_output();

        let found = self.probe(connected);
        let reopened = self.reopen(input, output);

        let result = found?;
        reopened?;
        if let Some(id) = result.suggested_device_id {
            engine.set_device_id(id);
        }
        debug!(pairs = result.pairs.len(), device_id = ?result.suggested_device_id, "discovery done");
        Ok(result)
    }

    fn probe(&self, connected: Option<PortPair>) -> Result<DiscoveryResult> {
        let profile = self.engine.profile();
        let config = self.engine.config();
        let pairs = discovery::probe_all_pairs(&self.backend, &profile, config)?;
        let chosen = connected
            .filter(|pair| pairs.contains(pair))
            .or_else(|| pairs.first().copied());
        let suggested_device_id = match chosen {
            Some(pair) => discovery::extract_device_id(&self.backend, pair, config)?,
            None => None,
        };
        Ok(DiscoveryResult { pairs, suggested_device_id })
    }

    /// Reopen the ports closed for discovery. Tries both; returns the first
    /// failure.
    fn reopen(&mut self, input: Option<usize>, output: Option<usize>) -> Result<()> {
        let mut first_err = None;
        if let Some(index) = output {
            if let Err(e) = self.connect_output(index) {
                warn!(output = index, error = %e, "could not reopen output after discovery");
                first_err.get_or_insert(e);
            }
        }
        if let Some(index) = input {
            if let Err(e) = self.connect_input(index) {
                warn!(input = index, error = %e, "could not reopen input after discovery");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Stop polling, wait for the thread, and close both ports.
    pub fn shutdown(&mut self) {
        self.engine.request_quit();
        if let Some(handle) = self.poller.take() {
            if handle.join().is_err() {
                warn!("polling thread panicked");
            }
        }
        self.input = None;
        self.engine.detach_output();
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
