use crate::bus::BusError;

/// Errors from the network, console and persistence collaborators.
///
/// These never reach the wire directly: the dispatch layer logs them and
/// answers with an "unspecified error" completion code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("no network interface object for channel {0}")]
    ChannelNotFound(u8),
    #[error("unexpected {name} value from service: {value}")]
    UnexpectedValue {
        name: &'static str,
        value: String,
    },
    #[error("no address available for IPv4 assignment")]
    MissingAddress,
    #[error("tried to pin a gateway MAC with no gateway configured")]
    MissingGateway,
    #[error("cipher suite configuration unavailable: {0}")]
    CipherConfig(String),
}

impl Error {
    pub(crate) fn unexpected_value(name: &'static str, value: impl Into<String>) -> Self {
        Error::UnexpectedValue {
            name,
            value: value.into(),
        }
    }
}
