use crate::constant::{DISCRIMINANT_OFFSET, Marker, StatusFlags};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::U16 as U16LE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Payload part of a frame (everything after the 4-byte header)
pub fn payload(frame: &[u8]) -> &[u8] {
    frame.get(DISCRIMINANT_OFFSET..).unwrap_or_default()
}

/// Discriminant byte of a frame, if it has a payload at all
pub fn discriminant(frame: &[u8]) -> Option<u8> {
    frame.get(DISCRIMINANT_OFFSET).copied()
}

/// Classification of the first frame of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStart {
    Ok,
    Err,
    LocalInfile,
    /// Start of a result set with the declared column count
    ResultSet { column_count: u64 },
}

/// Classify the first frame of a response.
///
/// Anything that is not an explicit marker is read as the length-encoded
/// column count of a result set header.
pub fn read_response_start(frame: &[u8]) -> Result<ResponseStart> {
    match discriminant(frame).map(Marker::from_u8) {
        None => Err(Error::UnexpectedEof),
        Some(Some(Marker::Ok)) => Ok(ResponseStart::Ok),
        Some(Some(Marker::Err)) => Ok(ResponseStart::Err),
        Some(Some(Marker::LocalInfile)) => Ok(ResponseStart::LocalInfile),
        // 0xFE is the 8-byte length-encoded prefix here, not a terminator
        Some(Some(Marker::Eof) | None) => {
            let header = ResultSetHeader::try_from(frame)?;
            Ok(ResponseStart::ResultSet {
                column_count: header.column_count,
            })
        }
    }
}

/// Classification of a frame inside a result set (column definitions or rows)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetFrame {
    Err,
    Eof,
    /// Column definition or row, depending on the phase
    Data,
}

/// Classify a frame that arrives after the result set header.
///
/// Frames too short to carry a discriminant are passed through as data.
pub fn read_resultset_frame(frame: &[u8]) -> ResultSetFrame {
    match discriminant(frame).and_then(Marker::from_u8) {
        Some(Marker::Err) => ResultSetFrame::Err,
        Some(Marker::Eof) => ResultSetFrame::Eof,
        _ => ResultSetFrame::Data,
    }
}

/// Result set metadata header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSetHeader {
    pub column_count: u64,
}

impl TryFrom<&[u8]> for ResultSetHeader {
    type Error = Error;

    /// Parse the header from a whole frame
    fn try_from(frame: &[u8]) -> Result<Self> {
        let (column_count, _rest) = read_int_lenenc(payload(frame))?;
        Ok(Self { column_count })
    }
}

/// OK packet payload (minimal header only)
///
/// Layout: 0x00 followed by variable-length fields:
/// - affected_rows: length-encoded integer
/// - last_insert_id: length-encoded integer
/// - status_flags: 2 bytes
/// - warnings: 2 bytes
/// - info: variable-length string
#[derive(Debug, Clone, Copy)]
pub struct OkPayloadBytes<'a>(pub &'a [u8]);

impl<'a> OkPayloadBytes<'a> {
    /// View the payload of a whole frame
    pub fn from_frame(frame: &'a [u8]) -> Self {
        Self(payload(frame))
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);

impl<'a> ErrPayloadBytes<'a> {
    /// View the payload of a whole frame
    pub fn from_frame(frame: &'a [u8]) -> Self {
        Self(payload(frame))
    }
}

/// OK packet response
#[derive(Debug, Clone)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: StatusFlags,
    pub warnings: u16,
}

impl TryFrom<OkPayloadBytes<'_>> for OkPayload {
    type Error = Error;

    fn try_from(bytes: OkPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.bytes())?;
        if header != Marker::Ok as u8 && header != Marker::Eof as u8 {
            return Err(Error::InvalidPacket);
        }

        let (affected_rows, rest) = read_int_lenenc(data)?;
        let (last_insert_id, rest) = read_int_lenenc(rest)?;
        let (status_flags, rest) = read_int_2(rest)?;
        let (warnings, _info) = read_int_2(rest)?;

        Ok(OkPayload {
            affected_rows,
            last_insert_id,
            status_flags: StatusFlags::from_bits_truncate(status_flags),
            warnings,
        })
    }
}

/// ERR packet response
#[derive(Debug, Clone, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.0)?;
        if header != Marker::Err as u8 {
            return Err(Error::InvalidPacket);
        }

        let (error_code, data) = read_int_2(data)?;

        // Check for SQL state marker '#'
        let (sql_state, rest) = match data.split_first() {
            Some((b'#', state)) => {
                let (state_bytes, rest) = read_string_fix(state, 5)?;
                (String::from_utf8_lossy(state_bytes).into_owned(), rest)
            }
            _ => (String::new(), data),
        };

        Ok(ErrPayload {
            error_code,
            sql_state,
            message: String::from_utf8_lossy(rest).into_owned(),
        })
    }
}

/// EOF packet response (zero-copy)
///
/// Layout matches MySQL wire protocol after header byte 0xFE:
/// - warnings: 2 bytes (little-endian)
/// - status_flags: 2 bytes (little-endian)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct EofPacket {
    pub warnings: U16LE,
    pub status_flags: U16LE,
}

impl EofPacket {
    /// Get status flags as StatusFlags wrapper
    pub fn status_flags(&self) -> StatusFlags {
        StatusFlags::from_bits_truncate(self.status_flags.get())
    }
}

/// Read EOF packet (header byte 0xFE) from a whole frame - zero-copy
pub fn read_eof_packet(frame: &[u8]) -> Result<&EofPacket> {
    let (header, data) = read_int_1(payload(frame))?;
    if header != Marker::Eof as u8 {
        return Err(Error::InvalidPacket);
    }

    // EofPacket is 4 bytes (2 + 2)
    let (fixed, _rest) = read_string_fix(data, 4)?;
    EofPacket::ref_from_bytes(fixed).map_err(|_| Error::InvalidPacket)
}

/// LOCAL INFILE request: 0xFB followed by the file name the server wants
#[derive(Debug, Clone, Copy)]
pub struct LocalInfileRequest<'a> {
    pub filename: &'a [u8],
}

/// Read a LOCAL INFILE request from a whole frame
pub fn read_local_infile_request(frame: &[u8]) -> Result<LocalInfileRequest<'_>> {
    let (header, filename) = read_int_1(payload(frame))?;
    if header != Marker::LocalInfile as u8 {
        return Err(Error::InvalidPacket);
    }
    Ok(LocalInfileRequest { filename })
}
