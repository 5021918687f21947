use smart_default::SmartDefault;

use crate::error::{Error, Result};

/// Configuration of a backend response decoder
///
/// ```rs
/// let mut opts = Opts::default();
/// opts.mailbox_capacity = 4096;
/// opts.validate()?;
/// ```
#[derive(Debug, Clone, SmartDefault)]
pub struct Opts {
    /// Frames a connection may have queued before the framing layer gets
    /// `Error::MailboxFull`
    #[default = 1024]
    pub mailbox_capacity: usize,

    /// Upper bound for preallocating the column definition buffer from the
    /// declared column count
    #[default = 256]
    pub max_preallocated_fields: usize,

    /// Close reason when a frame arrives with no handler bound
    #[default = "no handler"]
    pub no_handler_reason: String,

    /// Close reason when a result set header cannot be parsed
    #[default = "malformed packet"]
    pub malformed_reason: String,

    /// Close reason when the mailbox overflowed and frames were dropped
    #[default = "mailbox overflow"]
    pub overflow_reason: String,

    /// Close reason after the decoder detected corrupt internal state
    #[default = "decoder defect"]
    pub defect_reason: String,
}

impl Opts {
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(Error::BadConfigError(
                "mailbox_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
