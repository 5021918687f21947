use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;
use tracing::instrument;

use crate::connection::BackendConnection;
use crate::error::{Error, Result};
use crate::mailbox::Mailbox;
use crate::protocol::packet::FrameDecoder;

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Read frames from a backend stream into its mailbox until the stream ends.
///
/// Transport failures (I/O errors, EOF, a full mailbox) are forwarded to the
/// bound handler through [`crate::ResponseDecoder::connection_error`] and
/// returned.
#[instrument(skip_all, fields(conn = mailbox.decoder().connection().id()))]
pub async fn read_frames<R, C>(mut reader: R, mailbox: Arc<Mailbox<C>>) -> Result<()>
where
    R: AsyncRead + Unpin,
    C: BackendConnection + 'static,
{
    let mut codec = FrameDecoder::new();
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

    let result = loop {
        if let Err(err) = pump(&mut codec, &mut buf, &mailbox) {
            break Err(err);
        }
        match reader.read_buf(&mut buf).await {
            Ok(0) if buf.is_empty() => {
                break Err(Error::ConnectionClosed("backend closed the stream".to_string()));
            }
            Ok(0) => {
                break Err(Error::ConnectionClosed(format!(
                    "backend closed the stream inside a packet ({} bytes pending)",
                    buf.len()
                )));
            }
            Ok(_) => {}
            Err(err) => break Err(Error::IoError(err)),
        }
    };

    if let Err(err) = &result
        && !err.is_defect()
    {
        tracing::debug!(%err, "backend stream stopped");
        mailbox.decoder().connection_error(err);
    }
    result
}

fn pump<C: BackendConnection + 'static>(
    codec: &mut FrameDecoder,
    buf: &mut BytesMut,
    mailbox: &Arc<Mailbox<C>>,
) -> Result<()> {
    while let Some(frame) = codec.decode(buf)? {
        mailbox.offer(frame)?;
    }
    Ok(())
}

/// Spawn [`read_frames`] on the current runtime
pub fn spawn_reader<R, C>(reader: R, mailbox: Arc<Mailbox<C>>) -> JoinHandle<Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
    C: BackendConnection + 'static,
{
    tokio::spawn(read_frames(reader, mailbox))
}
