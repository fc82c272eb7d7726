//! The length-prefixed framing codec used by the snapshot format.
//!
//! Every frame is `<len>\n<payload>\n` where `<len>` is the decimal ASCII
//! byte count of `<payload>` (the trailing newline after payload is
//! consumed on read, never part of the payload itself).

use std::io::{self, Read, Write};

/// Writes one length-prefixed frame.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> io::Result<()> {
    write!(w, "{}\n", payload.len())?;
    w.write_all(payload)?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Writes a bare line (no length prefix) — used only for the leading
/// version string, which the original format writes unframed.
pub fn write_line<W: Write>(w: &mut W, line: &[u8]) -> io::Result<()> {
    w.write_all(line)?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Reads one bare newline-terminated line, stripping the newline.
pub fn read_line<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = r.read(&mut byte)?;
        if n == 0 {
            if out.is_empty() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "expected line"));
            }
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        out.push(byte[0]);
    }
    Ok(out)
}

/// Reads one length-prefixed frame written by [`write_frame`].
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let len_line = read_line(r)?;
    let len: usize = std::str::from_utf8(&len_line)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad frame length"))?;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    let mut nl = [0u8; 1];
    r.read_exact(&mut nl)?;
    if nl[0] != b'\n' {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "expected newline after frame payload",
        ));
    }
    Ok(payload)
}
