//! Identity-based port discovery.
//!
//! Two phases, both strictly sequential with a fixed wait:
//!
//! 1. [`probe_all_pairs`] sends the universal identity request on every
//!    output and listens on every input in turn, recording each
//!    (input, output) pair that carries a matching reply.
//! 2. [`extract_device_id`] asks a chosen pair again and reads the device id
//!    the instrument reports about itself.
//!
//! Regular processing must be paused while either runs; [`PauseGuard`] does
//! that for a [`MirrorEngine`].

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::engine::MirrorEngine;
use crate::error::{Error, Result};
use crate::id::DeviceId;
use crate::profile::DeviceProfile;
use crate::protocol::identity::{self, IDENTITY_REQUEST, IdentityReply};
use crate::transport::{Backend, OutputPort};

/// An input and an output that reach the same instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortPair {
    pub input: usize,
    pub output: usize,
}

impl PortPair {
    pub fn new(input: usize, output: usize) -> Self {
        Self { input, output }
    }
}

impl From<(usize, usize)> for PortPair {
    fn from((input, output): (usize, usize)) -> Self {
        Self { input, output }
    }
}

/// Outcome of a full discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveryResult {
    /// Matching pairs in probe order (outputs outer, inputs inner).
    pub pairs: Vec<PortPair>,
    /// Device id reported on the first pair, if it answered.
    pub suggested_device_id: Option<DeviceId>,
}

/// Probe every (input, output) combination with the identity request.
///
/// Zero inputs or zero outputs is [`Error::NoPortsAvailable`]; finding no
/// instrument is an empty list.
pub fn probe_all_pairs<B: Backend>(
    backend: &B,
    profile: &DeviceProfile,
    config: &EngineConfig,
) -> Result<Vec<PortPair>> {
    let inputs = backend.input_names()?.len();
    let outputs = backend.output_names()?.len();
    if inputs == 0 || outputs == 0 {
        return Err(Error::NoPortsAvailable { inputs, outputs });
    }
    debug!(inputs, outputs, "probing port pairs");

    let discovered = Arc::new(AtomicBool::new(false));
    let (man, equip) = (profile.manufacturer_id(), profile.equipment_id());
    let mut pairs = Vec::new();

    for output in 0..outputs {
        let mut out = backend.open_output(output, &config.probe_client_name)?;
        for input in 0..inputs {
            let flag = discovered.clone();
            let listener = backend.open_input(
                input,
                &config.probe_client_name,
                Box::new(move |msg| {
                    if IdentityReply::decode(msg).is_some_and(|r| r.matches(man, equip)) {
                        flag.store(true, Ordering::Release);
                    }
                }),
            )?;

            out.send(&IDENTITY_REQUEST)?;
            thread::sleep(config.probe_window);
            drop(listener);

            if discovered.swap(false, Ordering::AcqRel) {
                debug!(input, output, "instrument found");
                pairs.push(PortPair { input, output });
            } else {
                trace!(input, output, "no reply");
            }
        }
    }
    Ok(pairs)
}

/// Ask the instrument on `pair` for its device id.
///
/// `Ok(None)` when nothing answered within the probe window; the caller keeps
/// its current id.
pub fn extract_device_id<B: Backend>(
    backend: &B,
    pair: PortPair,
    config: &EngineConfig,
) -> Result<Option<DeviceId>> {
    let reported: Arc<Mutex<Option<u8>>> = Arc::new(Mutex::new(None));
    let slot = reported.clone();
    let listener = backend.open_input(
        pair.input,
        &config.probe_client_name,
        Box::new(move |msg| {
            if let Some(b) = identity::suggested_device_byte(msg) {
                *slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(b);
            }
        }),
    )?;
    let mut out = backend.open_output(pair.output, &config.probe_client_name)?;
    out.send(&IDENTITY_REQUEST)?;
    thread::sleep(config.probe_window);
    drop(listener);

    let byte = *reported.lock().unwrap_or_else(|p| p.into_inner());
    let id = byte.and_then(|b| DeviceId::from_byte(b).ok());
    debug!(input = pair.input, output = pair.output, device_id = ?id, "device id probe");
    Ok(id)
}

/// Run both phases: probe every pair, then read the device id from the
/// first match.
pub fn discover<B: Backend>(
    backend: &B,
    profile: &DeviceProfile,
    config: &EngineConfig,
) -> Result<DiscoveryResult> {
    let pairs = probe_all_pairs(backend, profile, config)?;
    let suggested_device_id = match pairs.first() {
        Some(&pair) => extract_device_id(backend, pair, config)?,
        None => None,
    };
    Ok(DiscoveryResult { pairs, suggested_device_id })
}

/// Pauses an engine for its lifetime and restores the previous flag on drop.
pub struct PauseGuard<'a> {
    engine: &'a MirrorEngine,
    was_paused: bool,
}

impl<'a> PauseGuard<'a> {
    pub fn new(engine: &'a MirrorEngine) -> Self {
        let was_paused = engine.paused();
        engine.set_paused(true);
        Self { engine, was_paused }
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.engine.set_paused(self.was_paused);
    }
}
