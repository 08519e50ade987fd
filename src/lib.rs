//! BMC-side implementation of the IPMI Transport NetFn configuration
//! command families: Set/Get LAN Configuration Parameters and Set/Get SOL
//! Configuration Parameters.
//!
//! The crate translates the fixed-format binary parameter encodings (in
//! the [`lan`] and [`sol`] modules, over the [`codec`] payload type) into
//! configuration intents against the host network stack, reached through
//! the narrow IPC surface in the [`bus`] module. Channel metadata is
//! consumed from the embedding IPMI stack through [`channel::Channels`].
//!
//! Commands are processed one at a time: [`TransportHandler`] takes
//! `&mut self` and keeps no background tasks. All network entities are
//! owned by the network service; the handler only holds per-channel
//! volatile command state (the set-in-progress locks and the
//! last-disabled-VLAN memo), all of which is lost on restart.

pub mod bus;
pub mod channel;
pub mod cipher;
pub mod codec;
pub mod family;
pub mod lan;
pub mod network;
pub mod sol;

mod completion;
pub use completion::CompletionCode;

mod error;
pub use error::Error;

#[cfg(test)]
pub(crate) mod testutil;

use std::collections::HashMap;

use bus::Bus;
use channel::{channel_params, ChannelParams, Channels};
use cipher::ConfigPaths;
use codec::{NotEnoughData, Payload};
use lan::{OemHandler, OemNotSupported, SetStatus};

/// Outcome of one configuration command: a response payload, or the
/// non-success completion code to answer with.
pub type CommandResult = Result<Payload, CompletionCode>;

/// The Transport NetFn configuration command handler.
///
/// Owns the bus connection, the channel metadata source, the optional OEM
/// parameter hook and all per-channel volatile state. The embedding
/// daemon routes the raw request data of the four commands into
/// [`set_lan`](TransportHandler::set_lan),
/// [`get_lan`](TransportHandler::get_lan),
/// [`set_sol`](TransportHandler::set_sol) and
/// [`get_sol`](TransportHandler::get_sol).
pub struct TransportHandler<B, C> {
    bus: B,
    channels: C,
    oem: Box<dyn OemHandler>,
    paths: ConfigPaths,
    set_status: HashMap<u8, SetStatus>,
    last_disabled_vlan: HashMap<u8, u16>,
    cipher_list: Option<Vec<u8>>,
}

impl<B, C> TransportHandler<B, C> {
    /// Create a handler with the default OEM hook (every OEM parameter
    /// answers "parameter not supported") and the default artifact paths.
    pub fn new(bus: B, channels: C) -> Self {
        Self {
            bus,
            channels,
            oem: Box::new(OemNotSupported),
            paths: ConfigPaths::default(),
            set_status: HashMap::new(),
            last_disabled_vlan: HashMap::new(),
            cipher_list: None,
        }
    }

    /// Install a handler for the OEM parameter range 192..=255.
    pub fn with_oem(mut self, oem: Box<dyn OemHandler>) -> Self {
        self.oem = oem;
        self
    }

    /// Override the configuration artifact locations.
    pub fn with_config_paths(mut self, paths: ConfigPaths) -> Self {
        self.paths = paths;
        self
    }

    /// The underlying bus connection.
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B: Bus, C: Channels> TransportHandler<B, C> {
    /// Resolve `channel` fresh and run `f` against it, folding every
    /// collaborator failure into an "unspecified error" answer.
    pub(crate) fn with_params<T>(
        &self,
        channel: u8,
        f: impl FnOnce(&B, &mut ChannelParams) -> Result<T, Error>,
    ) -> Result<T, CompletionCode> {
        let mut params =
            channel_params(&self.bus, &self.channels, channel).map_err(internal_error)?;
        f(&self.bus, &mut params).map_err(internal_error)
    }
}

/// Log a collaborator failure and answer "unspecified error".
pub(crate) fn internal_error(err: Error) -> CompletionCode {
    log::error!("Transport command failed: {err}");
    CompletionCode::UnspecifiedError
}

/// Map a short read to the "request data length invalid" answer.
pub(crate) fn unpack<T>(result: Result<T, NotEnoughData>) -> Result<T, CompletionCode> {
    result.map_err(|_| CompletionCode::ReqDataLenInvalid)
}

/// An empty success response.
pub(crate) fn success() -> CommandResult {
    Ok(Payload::new())
}
