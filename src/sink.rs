//! Writing finished text to the output sink.

use crate::error::{OplError, Result};
use std::io::{ErrorKind, Write};

/// Write all of `buf`, looping over short writes.
///
/// `Interrupted` is retried. A write that accepts zero bytes while data remains
/// is reported as [`OplError::SinkWrite`] with kind `WriteZero`; any other I/O
/// error is returned as-is. Returns the number of bytes written, which is
/// always `buf.len()` on success.
pub fn reliable_write<W: Write + ?Sized>(sink: &mut W, buf: &[u8]) -> Result<usize> {
    let mut offset = 0;
    while offset < buf.len() {
        match sink.write(&buf[offset..]) {
            Ok(0) => {
                return Err(OplError::SinkWrite(std::io::Error::new(
                    ErrorKind::WriteZero,
                    format!("sink accepted 0 of {} remaining bytes", buf.len() - offset),
                )));
            }
            Ok(n) => offset += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(OplError::SinkWrite(e)),
        }
    }
    Ok(offset)
}
