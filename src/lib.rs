pub mod codec;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod filename;
pub mod id;
pub mod profile;
pub mod protocol;
#[cfg(target_os = "linux")]
pub mod rawmidi;
pub mod resource;
pub mod session;
pub mod state;
pub mod sysex;
pub mod transport;

pub use config::EngineConfig;
pub use discovery::{DiscoveryResult, PortPair};
pub use engine::{MirrorEngine, PollOutcome, Update};
pub use error::{Error, Result};
pub use id::DeviceId;
pub use profile::DeviceProfile;
pub use protocol::Message;
pub use protocol::dump::{DumpCatalog, DumpType};
pub use session::Session;
pub use state::Mode;
pub use transport::{Backend, InputPort, OutputPort, TransportError};
