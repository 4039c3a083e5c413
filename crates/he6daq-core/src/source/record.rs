use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::packet::PACKET_LEN;

use super::{Datagram, DatagramSource, SourceError};

/// Reads a file of back-to-back raw packet records, as written by
/// `he6daq packets capture`.
///
/// A truncated final record is yielded as a short datagram so the decoder
/// can reject it.
pub struct RecordFileSource<R = BufReader<File>> {
    reader: R,
    done: bool,
}

impl RecordFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: Read> RecordFileSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R: Read> DatagramSource for RecordFileSource<R> {
    fn next_datagram(&mut self) -> Result<Option<Datagram>, SourceError> {
        if self.done {
            return Ok(None);
        }
        let mut record = vec![0u8; PACKET_LEN];
        let mut filled = 0;
        while filled < PACKET_LEN {
            match self.reader.read(&mut record[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(SourceError::Io(err)),
            }
        }
        if filled < PACKET_LEN {
            self.done = true;
            if filled == 0 {
                return Ok(None);
            }
            tracing::warn!(bytes = filled, "trailing partial record");
            record.truncate(filled);
        }
        Ok(Some(Datagram {
            ts: None,
            src: None,
            payload: record,
        }))
    }
}
