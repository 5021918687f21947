use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tracing::instrument;

use crate::connection::BackendConnection;
use crate::error::{Error, Result, eyre};
use crate::handler::{HandlerSlot, ResponseHandler};
use crate::opts::Opts;
use crate::protocol::response::{
    ResponseStart, ResultSetFrame, read_response_start, read_resultset_frame,
};

/// Position of a connection within the three-stage response grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first frame of a response
    Idle,
    /// Result set header seen; collecting column definitions
    CollectingFields,
    /// Column definitions terminated; forwarding rows
    CollectingRows,
}

/// Phase plus the accumulators that only exist inside a result set
#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    Idle,
    CollectingFields {
        header: Bytes,
        fields: Vec<Bytes>,
    },
    CollectingRows {
        header: Bytes,
        fields: Vec<Bytes>,
    },
}

impl DecodeState {
    fn phase(&self) -> Phase {
        match self {
            DecodeState::Idle => Phase::Idle,
            DecodeState::CollectingFields { .. } => Phase::CollectingFields,
            DecodeState::CollectingRows { .. } => Phase::CollectingRows,
        }
    }
}

/// Decodes the responses of one backend connection and dispatches them to
/// the currently bound [`ResponseHandler`].
///
/// Frames must be fed one at a time, in wire order; [`crate::mailbox::Mailbox`]
/// provides that guarantee when frames are handed to a worker pool. The
/// bound handler may be replaced at any time from any thread.
///
/// Handler callbacks run while the decode state is locked. A handler may call
/// [`ResponseDecoder::bind`], but calling [`ResponseDecoder::on_frame`],
/// [`ResponseDecoder::phase`] or [`ResponseDecoder::reset`] on the same
/// decoder from inside a callback deadlocks.
pub struct ResponseDecoder<C> {
    conn: C,
    handler: HandlerSlot,
    state: Mutex<DecodeState>,
    opts: Opts,
}

impl<C: BackendConnection> ResponseDecoder<C> {
    pub fn new(conn: C, opts: Opts) -> Self {
        Self {
            conn,
            handler: HandlerSlot::new(),
            state: Mutex::new(DecodeState::Idle),
            opts,
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    /// Bind the handler for the next request, returning the previous one.
    ///
    /// `None` unbinds: any later frame that needs a handler closes the connection.
    pub fn bind(
        &self,
        handler: Option<Arc<dyn ResponseHandler>>,
    ) -> Option<Arc<dyn ResponseHandler>> {
        self.handler.swap(handler)
    }

    pub fn is_bound(&self) -> bool {
        self.handler.is_bound()
    }

    /// Forward a transport failure to the bound handler, if any
    pub fn connection_error(&self, cause: &Error) {
        if let Some(handler) = self.handler.load() {
            handler.connection_error(cause, &self.conn);
        }
    }

    /// Current phase
    pub fn phase(&self) -> Result<Phase> {
        Ok(self.lock_state()?.phase())
    }

    /// Return to [`Phase::Idle`], dropping any partially collected result set
    pub fn reset(&self) -> Result<()> {
        *self.lock_state()? = DecodeState::Idle;
        Ok(())
    }

    /// Whether a handler panicked mid-frame, leaving the state unusable
    pub fn is_halted(&self) -> bool {
        self.state.is_poisoned()
    }

    /// Decode one frame (4-byte header included) and dispatch exactly one
    /// event for it, or close the connection if no handler can take it.
    ///
    /// Protocol conditions never surface here. The only error is
    /// [`Error::LibraryBug`], after which the decoder must not be fed again.
    #[instrument(skip_all, fields(conn = self.conn.id(), len = frame.len()))]
    pub fn on_frame(&self, frame: Bytes) -> Result<()> {
        let mut state = self.lock_state()?;
        let current = std::mem::take(&mut *state);
        let previous = current.phase();
        let handler = self.handler.load();
        let next = self.step(current, frame, handler.as_deref());
        if next.phase() != previous {
            tracing::trace!(from = ?previous, to = ?next.phase(), "phase transition");
        }
        *state = next;
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, DecodeState>> {
        self.state.lock().map_err(|_poisoned| {
            Error::LibraryBug(eyre!(
                "response decoder state of backend connection {} is corrupt",
                self.conn.id()
            ))
        })
    }

    fn step(
        &self,
        current: DecodeState,
        frame: Bytes,
        handler: Option<&dyn ResponseHandler>,
    ) -> DecodeState {
        match current {
            DecodeState::Idle => self.step_idle(frame, handler),

            DecodeState::CollectingFields { header, mut fields } => {
                match read_resultset_frame(&frame) {
                    ResultSetFrame::Err => {
                        self.handle_error(&frame, handler);
                        DecodeState::Idle
                    }
                    ResultSetFrame::Eof => {
                        match handler {
                            Some(handler) => {
                                handler.field_eof_response(&header, &fields, &frame, &self.conn)
                            }
                            None => self.close_no_handler(),
                        }
                        DecodeState::CollectingRows { header, fields }
                    }
                    ResultSetFrame::Data => {
                        if handler.is_none() {
                            self.close_no_handler();
                        }
                        fields.push(frame);
                        DecodeState::CollectingFields { header, fields }
                    }
                }
            }

            DecodeState::CollectingRows { header, fields } => match read_resultset_frame(&frame) {
                ResultSetFrame::Err => {
                    self.handle_error(&frame, handler);
                    DecodeState::Idle
                }
                ResultSetFrame::Eof => {
                    match handler {
                        Some(handler) => handler.row_eof_response(&frame, &self.conn),
                        None => self.close_no_handler(),
                    }
                    DecodeState::Idle
                }
                ResultSetFrame::Data => {
                    match handler {
                        Some(handler) => handler.row_response(&frame, &self.conn),
                        None => self.close_no_handler(),
                    }
                    DecodeState::CollectingRows { header, fields }
                }
            },
        }
    }

    fn step_idle(&self, frame: Bytes, handler: Option<&dyn ResponseHandler>) -> DecodeState {
        match read_response_start(&frame) {
            Ok(ResponseStart::Ok) => {
                match handler {
                    Some(handler) => handler.ok_response(&frame, &self.conn),
                    None => tracing::debug!(conn = self.conn.id(), "OK packet without handler"),
                }
                DecodeState::Idle
            }
            Ok(ResponseStart::Err) => {
                self.handle_error(&frame, handler);
                DecodeState::Idle
            }
            Ok(ResponseStart::LocalInfile) => {
                match handler.and_then(|handler| handler.as_load_data()) {
                    Some(load_data) => load_data.request_data_response(&frame, &self.conn),
                    None => self.close_no_handler(),
                }
                DecodeState::Idle
            }
            Ok(ResponseStart::ResultSet { column_count }) => {
                if handler.is_none() {
                    self.close_no_handler();
                }
                let capacity = usize::try_from(column_count)
                    .unwrap_or(usize::MAX)
                    .min(self.opts.max_preallocated_fields);
                DecodeState::CollectingFields {
                    header: frame,
                    fields: Vec::with_capacity(capacity),
                }
            }
            Err(err) => {
                tracing::warn!(
                    conn = self.conn.id(),
                    %err,
                    "cannot read result set header from backend"
                );
                self.close(&self.opts.malformed_reason);
                DecodeState::Idle
            }
        }
    }

    fn handle_error(&self, frame: &Bytes, handler: Option<&dyn ResponseHandler>) {
        match handler {
            Some(handler) => handler.error_response(frame, &self.conn),
            None => self.close_no_handler(),
        }
    }

    fn close_no_handler(&self) {
        if self.close(&self.opts.no_handler_reason) {
            tracing::warn!(
                conn = self.conn.id(),
                "no handler bound on backend connection"
            );
        }
    }

    /// Close the connection unless it is already closing. Returns whether it closed it.
    pub(crate) fn close(&self, reason: &str) -> bool {
        if self.conn.is_closed_or_quit() {
            return false;
        }
        self.conn.close(reason);
        true
    }
}
