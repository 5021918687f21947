use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use auto_impl::auto_impl;
use bytes::Bytes;
use crossbeam_queue::ArrayQueue;

use crate::connection::BackendConnection;
use crate::decoder::ResponseDecoder;
use crate::error::{Error, Result, eyre};

/// A unit of decode work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs decode work off the I/O path, typically on a shared worker pool
#[auto_impl(&, Arc, Box)]
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs each job on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Per-connection frame queue.
///
/// Any number of threads may offer frames, but at most one job drains the
/// queue at a time, so the decoder sees one frame at a time in offer order.
/// Across connections, drains run in parallel on the executor.
pub struct Mailbox<C> {
    decoder: Arc<ResponseDecoder<C>>,
    queue: ArrayQueue<Bytes>,
    draining: AtomicBool,
    overflowed: AtomicBool,
    executor: Arc<dyn Executor>,
}

impl<C: BackendConnection + 'static> Mailbox<C> {
    pub fn new(decoder: Arc<ResponseDecoder<C>>, executor: Arc<dyn Executor>) -> Result<Arc<Self>> {
        decoder.opts().validate()?;
        Ok(Arc::new(Self {
            queue: ArrayQueue::new(decoder.opts().mailbox_capacity),
            decoder,
            draining: AtomicBool::new(false),
            overflowed: AtomicBool::new(false),
            executor,
        }))
    }

    pub fn decoder(&self) -> &Arc<ResponseDecoder<C>> {
        &self.decoder
    }

    /// Frames waiting to be decoded
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether an overflow discarded part of a response
    pub fn is_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    /// Queue a frame and make sure a drain job is scheduled.
    ///
    /// When the queue is full the frame and everything still queued are
    /// dropped, the decoder is reset to idle, the connection is closed with
    /// `Opts::overflow_reason` and `Error::MailboxFull` is returned. Later
    /// offers are refused with `Error::ConnectionClosed`.
    pub fn offer(self: &Arc<Self>, frame: Bytes) -> Result<()> {
        if self.decoder.is_halted() {
            return Err(Error::LibraryBug(eyre!(
                "frame offered to halted backend connection {}",
                self.decoder.connection().id()
            )));
        }
        if self.is_overflowed() {
            return Err(Error::ConnectionClosed(
                self.decoder.opts().overflow_reason.clone(),
            ));
        }
        if self.queue.push(frame).is_err() {
            self.overflow()?;
            return Err(Error::MailboxFull);
        }
        self.schedule();
        Ok(())
    }

    /// The remaining frames of the response in flight are gone, so nothing
    /// queued after them can be decoded in the right phase.
    fn overflow(&self) -> Result<()> {
        self.overflowed.store(true, Ordering::Release);
        tracing::warn!(
            conn = self.decoder.connection().id(),
            capacity = self.queue.capacity(),
            "backend mailbox is full"
        );
        while self.queue.pop().is_some() {}
        self.decoder.close(&self.decoder.opts().overflow_reason);
        self.decoder.reset()
    }

    fn schedule(self: &Arc<Self>) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let mailbox = Arc::clone(self);
            self.executor.execute(Box::new(move || mailbox.drain()));
        }
    }

    fn drain(self: Arc<Self>) {
        while let Some(frame) = self.queue.pop() {
            if self.is_overflowed() {
                while self.queue.pop().is_some() {}
                break;
            }
            let result = catch_unwind(AssertUnwindSafe(|| self.decoder.on_frame(frame)));
            let defect = match result {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(_panic) => Some(Error::LibraryBug(eyre!(
                    "response handler panicked on backend connection {}",
                    self.decoder.connection().id()
                ))),
            };
            if let Some(err) = defect {
                self.halt(&err);
                break;
            }
        }
        self.draining.store(false, Ordering::Release);

        // A frame offered after the last pop but before the flag was cleared
        // found the flag set and did not schedule.
        if !self.queue.is_empty() && !self.decoder.is_halted() && !self.is_overflowed() {
            self.schedule();
        }
    }

    fn halt(&self, err: &Error) {
        let conn = self.decoder.connection();
        tracing::error!(conn = conn.id(), %err, "backend response decoding halted");
        while self.queue.pop().is_some() {}
        self.decoder.close(&self.decoder.opts().defect_reason);
    }
}
