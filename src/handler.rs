use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use crate::connection::BackendConnection;
use crate::error::Error;
use crate::protocol::response::{ErrPayloadBytes, OkPayload, OkPayloadBytes};

/// Event callbacks for one in-flight request on a backend connection.
///
/// Every frame argument is a whole frame, 4-byte header included.
pub trait ResponseHandler: Send + Sync {
    /// The response was a single OK packet
    fn ok_response(&self, ok: &Bytes, conn: &dyn BackendConnection);

    /// The server reported an error, either instead of a result set or in the middle of one
    fn error_response(&self, err: &Bytes, conn: &dyn BackendConnection);

    /// All column definitions of a result set arrived.
    ///
    /// `header` carries the declared column count; `fields` holds the column
    /// definition frames in arrival order and is not checked against it.
    fn field_eof_response(
        &self,
        header: &Bytes,
        fields: &[Bytes],
        eof: &Bytes,
        conn: &dyn BackendConnection,
    );

    fn row_response(&self, row: &Bytes, conn: &dyn BackendConnection);

    fn row_eof_response(&self, eof: &Bytes, conn: &dyn BackendConnection);

    /// The transport failed underneath the request
    fn connection_error(&self, cause: &Error, conn: &dyn BackendConnection);

    /// Capability query for LOCAL INFILE support
    fn as_load_data(&self) -> Option<&dyn LoadDataResponseHandler> {
        None
    }
}

/// A handler that can answer the server's LOCAL INFILE requests
pub trait LoadDataResponseHandler: ResponseHandler {
    fn request_data_response(&self, request: &Bytes, conn: &dyn BackendConnection);
}

/// The currently bound handler of a connection.
///
/// Rebinding swaps the whole `Arc` under the lock, so a reader sees either
/// the previous handler or the new one.
#[derive(Default)]
pub struct HandlerSlot {
    current: RwLock<Option<Arc<dyn ResponseHandler>>>,
}

impl HandlerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bound handler, returning the previous one
    pub fn swap(
        &self,
        handler: Option<Arc<dyn ResponseHandler>>,
    ) -> Option<Arc<dyn ResponseHandler>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, handler)
    }

    /// Snapshot of the bound handler; the lock is released before returning
    pub fn load(&self) -> Option<Arc<dyn ResponseHandler>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_bound(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// A handler that ignores all result set data but captures affected_rows and last_insert_id
///
/// Useful for draining the response of a statement issued by the proxy itself,
/// e.g. a session variable sync before the connection is handed out.
#[derive(Debug, Default)]
pub struct DropHandler {
    affected_rows: AtomicU64,
    last_insert_id: AtomicU64,
    errors: AtomicU64,
}

impl DropHandler {
    /// Get the number of affected rows from the last OK packet
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows.load(Ordering::Acquire)
    }

    /// Get the last insert ID from the last OK packet
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id.load(Ordering::Acquire)
    }

    /// Number of ERR packets and connection errors seen
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Acquire)
    }
}

impl ResponseHandler for DropHandler {
    fn ok_response(&self, ok: &Bytes, conn: &dyn BackendConnection) {
        match OkPayload::try_from(OkPayloadBytes::from_frame(ok)) {
            Ok(payload) => {
                self.affected_rows
                    .store(payload.affected_rows, Ordering::Release);
                self.last_insert_id
                    .store(payload.last_insert_id, Ordering::Release);
            }
            Err(err) => {
                tracing::warn!(conn = conn.id(), %err, "malformed OK packet");
            }
        }
    }

    fn error_response(&self, err: &Bytes, conn: &dyn BackendConnection) {
        self.errors.fetch_add(1, Ordering::AcqRel);
        let error = Error::from(ErrPayloadBytes::from_frame(err));
        tracing::debug!(conn = conn.id(), %error, "dropped error response");
    }

    fn field_eof_response(&self, _: &Bytes, _: &[Bytes], _: &Bytes, _: &dyn BackendConnection) {}

    fn row_response(&self, _: &Bytes, _: &dyn BackendConnection) {}

    fn row_eof_response(&self, _: &Bytes, _: &dyn BackendConnection) {}

    fn connection_error(&self, cause: &Error, conn: &dyn BackendConnection) {
        self.errors.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(conn = conn.id(), %cause, "connection error while draining");
    }
}
