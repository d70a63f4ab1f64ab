//! Record framing over blocking byte streams.

use crate::{Error, Result};
use minitls_core::record::{Record, RecordHeader, RECORD_HEADER_LEN};
use std::io::{ErrorKind, Read, Write};

/// Read exactly one record.
///
/// # Errors
///
/// `Error::Closed` if the peer closed the connection before the first
/// header byte, `Error::Io` if it closed anywhere inside a record (header
/// included).
pub fn read_record<R: Read>(reader: &mut R) -> Result<Record> {
    let mut header = [0u8; RECORD_HEADER_LEN];
    let start = loop {
        match reader.read(&mut header) {
            Ok(n) => break n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    };
    if start == 0 {
        return Err(Error::Closed);
    }
    reader.read_exact(&mut header[start..])?;
    let header = RecordHeader::parse(&header)?;

    let mut fragment = vec![0u8; header.length];
    reader.read_exact(&mut fragment)?;

    Ok(Record {
        content_type: header.content_type,
        version: header.version,
        fragment,
    })
}

/// Write one record and flush.
pub fn write_record<W: Write>(writer: &mut W, record: &Record) -> Result<()> {
    write_records(writer, std::slice::from_ref(record))
}

/// Write several records with a single write, then flush.
pub fn write_records<W: Write>(writer: &mut W, records: &[Record]) -> Result<()> {
    let mut buf = Vec::new();
    for record in records {
        buf.extend_from_slice(&record.serialize()?);
    }
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}
