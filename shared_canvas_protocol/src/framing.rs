// Length-delimited framing for envelopes over a byte stream.
//
// Wire format: a 4-byte big-endian length, then that many bytes of JSON.
// `write_frame` / `read_frame` move raw byte slices and know nothing about
// JSON. Callers serialize envelopes once (the relay encodes a broadcast a
// single time and shares the bytes across every recipient) and hand the
// bytes here.
//
// `MAX_FRAME_SIZE` bounds the allocation a peer can force on the reader.
// Canvas events are tiny; the largest frame is the join replay of a busy
// canvas. The relay keeps its default stroke cap well inside this limit and
// trims a replay that would still overflow it.

use std::io::{self, Read, Write};

/// Largest frame accepted in either direction (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Write one frame: 4-byte big-endian length, then `payload`, then flush.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame too large: {} bytes (max {MAX_FRAME_SIZE})",
                    payload.len()
                ),
            )
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Read one frame.
///
/// Returns `UnexpectedEof` if the stream ends before or inside a frame and
/// `InvalidData` if the declared length exceeds `MAX_FRAME_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
