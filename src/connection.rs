use std::fmt;

use auto_impl::auto_impl;

/// The physical backend connection a decoder reads from.
///
/// Implemented by the pooling layer; the decoder only needs to identify the
/// connection in logs and events, and to force it closed.
#[auto_impl(&, Arc, Box)]
pub trait BackendConnection: Send + Sync {
    /// Identity used to correlate log lines and events
    fn id(&self) -> u64;

    /// Whether the connection is already closed or has sent COM_QUIT
    fn is_closed_or_quit(&self) -> bool;

    /// Close the connection, recording why
    fn close(&self, reason: &str);
}

impl fmt::Debug for dyn BackendConnection + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConnection")
            .field("id", &self.id())
            .field("closed", &self.is_closed_or_quit())
            .finish()
    }
}
