//! Bounded-size streaming of a document into a writer.

use std::io::{self, Write};

/// Bytes handed to the remote session per write.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Write `bytes` to `writer` in slices of at most `chunk_size` bytes, in
/// order, then flush. Returns the number of chunks written.
///
/// Empty input writes nothing and returns 0.
pub fn write_chunked<W: Write + ?Sized>(
    writer: &mut W,
    bytes: &[u8],
    chunk_size: usize,
) -> io::Result<usize> {
    if chunk_size == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "chunk size must be positive",
        ));
    }
    let mut chunks = 0;
    for chunk in bytes.chunks(chunk_size) {
        writer.write_all(chunk)?;
        chunks += 1;
    }
    writer.flush()?;
    Ok(chunks)
}
