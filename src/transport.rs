//! Port-level MIDI transport seam.
//!
//! The engine never talks to a MIDI API directly. A [`Backend`] enumerates
//! ports and opens them; an [`InputPort`] delivers whole messages to a
//! callback until it is dropped; an [`OutputPort`] sends whole messages.
//! No application logic lives here.

use std::fmt;
use std::io;

/// Callback invoked once per received message, possibly on a backend thread.
pub type MessageCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Errors from transport operations.
#[derive(Debug)]
pub enum TransportError {
    /// Device node I/O error.
    Io(io::Error),
    /// No port with this index.
    NoSuchPort { index: usize, count: usize },
    /// The port went away (device unplugged, reader stopped).
    Disconnected,
    /// Backend-specific failure text.
    Backend(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "I/O error: {e}"),
            TransportError::NoSuchPort { index, count } => {
                write!(f, "there is no MIDI port {index} ({count} available)")
            }
            TransportError::Disconnected => write!(f, "MIDI port disconnected"),
            TransportError::Backend(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            TransportError::NoSuchPort { .. }
            | TransportError::Disconnected
            | TransportError::Backend(_) => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// An open input. Dropping it closes the port and detaches the callback.
pub trait InputPort: Send {
    /// Name of the underlying port.
    fn name(&self) -> &str;
}

/// An open output.
pub trait OutputPort: Send {
    /// Name of the underlying port.
    fn name(&self) -> &str;

    /// Send one complete message.
    fn send(&mut self, msg: &[u8]) -> Result<(), TransportError>;
}

/// Port enumeration and opening.
pub trait Backend {
    type Input: InputPort + 'static;
    type Output: OutputPort + 'static;

    fn input_names(&self) -> Result<Vec<String>, TransportError>;

    fn output_names(&self) -> Result<Vec<String>, TransportError>;

    /// Open input `index` under `client`, delivering messages to `on_message`.
    fn open_input(
        &self,
        index: usize,
        client: &str,
        on_message: MessageCallback,
    ) -> Result<Self::Input, TransportError>;

    /// Open output `index` under `client`.
    fn open_output(&self, index: usize, client: &str) -> Result<Self::Output, TransportError>;

    /// Index of the input port called `name`.
    fn input_index_by_name(&self, name: &str) -> Result<Option<usize>, TransportError> {
        Ok(self.input_names()?.iter().position(|n| n == name))
    }

    /// Index of the output port called `name`.
    fn output_index_by_name(&self, name: &str) -> Result<Option<usize>, TransportError> {
        Ok(self.output_names()?.iter().position(|n| n == name))
    }
}
