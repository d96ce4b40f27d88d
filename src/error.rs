use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the mirror engine, discovery, and dump saving.
///
/// `Transport` and `Unresponsive` are fatal to a session: the engine records
/// them and sets its quit flag. `NoPortsAvailable` only aborts the discovery
/// call that hit it. The rest are recoverable and meant to be shown to the
/// operator.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("more than {limit} unanswered requests from synthesizer")]
    Unresponsive { limit: u32 },

    #[error("no MIDI ports available ({inputs} inputs, {outputs} outputs)")]
    NoPortsAvailable { inputs: usize, outputs: usize },

    #[error("no dump to save")]
    NoDump,

    #[error("unknown dump command 0x{cmd:02X}")]
    UnknownCommand { cmd: u8 },

    #[error("invalid device id {id} (must be 0-127)")]
    InvalidDeviceId { id: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ends the session rather than just the current call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Unresponsive { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
