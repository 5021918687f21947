use bitflags::bitflags;

/// Bytes of the wire header (3-byte payload length + 1-byte sequence id)
/// that stay at the front of every frame handed to the decoder.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Offset of the discriminant byte within a frame.
pub const DISCRIMINANT_OFFSET: usize = PACKET_HEADER_SIZE;

/// First payload byte of the response packets the decoder distinguishes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// OK_Packet
    Ok = 0x00,
    /// LOCAL INFILE request
    LocalInfile = 0xFB,
    /// EOF_Packet, terminating column definitions or rows
    Eof = 0xFE,
    /// ERR_Packet
    Err = 0xFF,
}

impl Marker {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Ok),
            0xFB => Some(Self::LocalInfile),
            0xFE => Some(Self::Eof),
            0xFF => Some(Self::Err),
            _ => None,
        }
    }
}

bitflags! {
    /// Server status flags carried by OK and EOF packets
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u16 {
        const SERVER_STATUS_IN_TRANS = 0x0001;
        const SERVER_STATUS_AUTOCOMMIT = 0x0002;
        const SERVER_MORE_RESULTS_EXISTS = 0x0008;
        const SERVER_STATUS_NO_GOOD_INDEX_USED = 0x0010;
        const SERVER_STATUS_NO_INDEX_USED = 0x0020;
        const SERVER_STATUS_CURSOR_EXISTS = 0x0040;
        const SERVER_STATUS_LAST_ROW_SENT = 0x0080;
        const SERVER_STATUS_DB_DROPPED = 0x0100;
        const SERVER_STATUS_NO_BACKSLASH_ESCAPES = 0x0200;
        const SERVER_STATUS_METADATA_CHANGED = 0x0400;
        const SERVER_QUERY_WAS_SLOW = 0x0800;
        const SERVER_PS_OUT_PARAMS = 0x1000;
        const SERVER_STATUS_IN_TRANS_READONLY = 0x2000;
        const SERVER_SESSION_STATE_CHANGED = 0x4000;
    }
}
