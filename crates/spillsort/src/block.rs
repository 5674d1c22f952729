//! Row block framing for run files.
//!
//! A run file is a sequence of blocks, each an 8-byte big-endian payload
//! length followed by the payload: the codec encodings of the key columns,
//! the value columns, and the handle as an integer value, in schema order.
//! The length prefix makes the variable-length payload self-delimiting so a
//! run can be streamed without ever loading it whole.

use spillsort_error::{Result, SortError};
use spillsort_types::{codec, Datum};

use crate::row::{Row, RowSchema};

/// Size of the length prefix in front of every payload.
pub(crate) const BLOCK_HEADER_LEN: usize = 8;

/// Append one encoded row block to `buf` and return the payload length.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn encode_row(buf: &mut Vec<u8>, row: &Row) -> usize {
    let start = buf.len();
    buf.extend_from_slice(&[0u8; BLOCK_HEADER_LEN]);
    codec::encode_datums(buf, &row.key);
    codec::encode_datums(buf, &row.val);
    codec::encode_datum(buf, &Datum::Integer(row.handle));
    let payload_len = buf.len() - start - BLOCK_HEADER_LEN;
    buf[start..start + BLOCK_HEADER_LEN]
        .copy_from_slice(&(payload_len as u64).to_be_bytes());
    payload_len
}

/// Decode a block payload back into a row.
///
/// The payload must decode into exactly `key_len + val_len + 1` values with
/// no bytes left over, and the final value must be integer-typed (it is the
/// handle). Violations are [`SortError::MalformedRun`].
pub(crate) fn decode_row(payload: &[u8], schema: RowSchema) -> Result<Row> {
    let (mut values, consumed) = codec::decode_datums(payload, schema.datums_per_row())?;
    if consumed != payload.len() {
        return Err(SortError::malformed(format!(
            "{} trailing bytes after {} values",
            payload.len() - consumed,
            schema.datums_per_row(),
        )));
    }
    let Some(last) = values.pop() else {
        return Err(SortError::malformed("empty row payload"));
    };
    let handle = match last {
        Datum::Integer(i) => i,
        other => {
            return Err(SortError::malformed(format!(
                "handle is {}-typed, expected integer",
                other.storage_class(),
            )));
        }
    };
    let val = values.split_off(schema.key_len);
    Ok(Row {
        key: values,
        val,
        handle,
    })
}
