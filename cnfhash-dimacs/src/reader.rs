//! Buffered token-level reading of DIMACS-family input.
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

use bzip2::bufread::BzDecoder;
use flate2::bufread::GzDecoder;
use xz2::bufread::XzDecoder;

use crate::ParserError;

const BUF_LEN: usize = 64 * 1024;

/// Opens a file for reading, transparently decompressing it.
///
/// The compression format is detected from the file extension (`.gz`, `.bz2`, `.xz`, `.lzma`);
/// any other extension is read as plain bytes. A `foo.cnf.gz` therefore reads as `foo.cnf`.
pub fn open_dimacs(path: impl AsRef<Path>) -> io::Result<Box<dyn io::Read>> {
    let path = path.as_ref();
    let buffered = io::BufReader::new(fs::File::open(path)?);

    Ok(match path.extension().and_then(OsStr::to_str) {
        Some("gz") => Box::new(GzDecoder::new(buffered)),
        Some("bz2") => Box::new(BzDecoder::new(buffered)),
        Some("xz") | Some("lzma") => Box::new(XzDecoder::new(buffered)),
        _ => Box::new(buffered),
    })
}

/// A forward-only byte reader with token-level helpers for the DIMACS format family.
///
/// Tracks the current line for diagnostics. All `read_*` methods skip leading whitespace
/// themselves, so interleaving them with [`skip_whitespace`](TokenReader::skip_whitespace) is
/// harmless.
pub struct TokenReader<R> {
    source: R,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
    line: usize,
    at_line_start: bool,
}

impl<R: io::Read> TokenReader<R> {
    pub fn new(source: R) -> TokenReader<R> {
        TokenReader {
            source,
            buf: vec![0; BUF_LEN].into_boxed_slice(),
            pos: 0,
            len: 0,
            line: 1,
            at_line_start: true,
        }
    }

    /// 1-based line number of the byte `peek` returns.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Whether the byte `peek` returns starts a line.
    ///
    /// Spaces and tabs do not reset this, so an indented `c` is not a comment start.
    pub fn at_line_start(&self) -> bool {
        self.at_line_start
    }

    fn fill(&mut self) -> io::Result<()> {
        while self.pos == self.len {
            let read = self.source.read(&mut self.buf)?;
            if read == 0 {
                return Ok(());
            }
            self.pos = 0;
            self.len = read;
        }
        Ok(())
    }

    /// The current byte, or `None` at end of input.
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        self.fill()?;
        if self.pos < self.len {
            Ok(Some(self.buf[self.pos]))
        } else {
            Ok(None)
        }
    }

    /// Consume one byte. Returns `false` at end of input.
    pub fn skip(&mut self) -> io::Result<bool> {
        match self.peek()? {
            None => Ok(false),
            Some(byte) => {
                if byte == b'\n' {
                    self.line += 1;
                }
                self.at_line_start = byte == b'\n' || byte == b'\r';
                self.pos += 1;
                Ok(true)
            }
        }
    }

    /// Consume spaces, tabs, carriage returns and newlines; returns how many were consumed.
    pub fn skip_whitespace(&mut self) -> io::Result<usize> {
        let mut count = 0;
        while let Some(byte) = self.peek()? {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.skip()?;
                    count += 1;
                }
                _ => break,
            }
        }
        Ok(count)
    }

    /// Consume input up to and including the next newline. Returns `false` when the end of input
    /// was reached before a newline.
    pub fn skip_line(&mut self) -> io::Result<bool> {
        while let Some(byte) = self.peek()? {
            self.skip()?;
            if byte == b'\n' {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Consume whitespace together with any comment lines it leads to.
    ///
    /// Clauses may be interrupted by comment lines, so token-level readers call this between
    /// integers.
    pub fn skip_whitespace_and_comments(&mut self) -> io::Result<()> {
        loop {
            self.skip_whitespace()?;
            if self.at_line_start && self.peek()? == Some(b'c') {
                self.skip_line()?;
            } else {
                return Ok(());
            }
        }
    }

    /// Parse an optionally signed decimal integer, skipping leading whitespace.
    ///
    /// Returns `None` at end of input. Anything but a sign or digit in the place of a number, or
    /// a number running into a non-whitespace byte, is a parse error.
    pub fn read_integer(&mut self) -> Result<Option<i64>, ParserError> {
        self.skip_whitespace()?;

        let negative = match self.peek()? {
            None => return Ok(None),
            Some(b'-') => {
                self.skip()?;
                true
            }
            Some(_) => false,
        };

        let value = self.read_digits()?;
        if value > i64::max_value() as u64 {
            return Err(ParserError::LiteralTooLarge {
                line: self.line,
                value,
            });
        }

        let value = value as i64;
        Ok(Some(if negative { -value } else { value }))
    }

    /// Parse an unsigned decimal integer, skipping leading whitespace.
    ///
    /// Returns `None` at end of input.
    pub fn read_u64(&mut self) -> Result<Option<u64>, ParserError> {
        self.skip_whitespace()?;
        if self.peek()?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.read_digits()?))
    }

    /// Parse a nonempty digit run terminated by whitespace or end of input.
    fn read_digits(&mut self) -> Result<u64, ParserError> {
        let mut value: u64 = 0;
        let mut digits = 0;

        while let Some(byte) = self.peek()? {
            match byte {
                b'0'..=b'9' => {
                    value = value
                        .checked_mul(10)
                        .and_then(|value| value.checked_add((byte - b'0') as u64))
                        .ok_or(ParserError::LiteralTooLarge {
                            line: self.line,
                            value,
                        })?;
                    digits += 1;
                    self.skip()?;
                }
                b' ' | b'\t' | b'\r' | b'\n' => break,
                _ => {
                    return Err(ParserError::UnexpectedInput {
                        line: self.line,
                        unexpected: byte as char,
                    });
                }
            }
        }

        if digits == 0 {
            return Err(ParserError::UnexpectedInput {
                line: self.line,
                unexpected: match self.peek()? {
                    Some(byte) => byte as char,
                    None => '\0',
                },
            });
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8]) -> TokenReader<&[u8]> {
        TokenReader::new(bytes)
    }

    #[test]
    fn integers_and_whitespace() {
        let mut r = reader(b"  1 -2\t\n 30  ");
        assert_eq!(r.skip_whitespace().unwrap(), 2);
        assert_eq!(r.read_integer().unwrap(), Some(1));
        assert_eq!(r.read_integer().unwrap(), Some(-2));
        assert_eq!(r.read_integer().unwrap(), Some(30));
        assert_eq!(r.read_integer().unwrap(), None);
    }

    #[test]
    fn line_tracking() {
        let mut r = reader(b"1\n2\n3");
        assert_eq!(r.line(), 1);
        r.read_integer().unwrap();
        r.read_integer().unwrap();
        assert_eq!(r.line(), 2);
        r.read_integer().unwrap();
        assert_eq!(r.line(), 3);
    }

    #[test]
    fn skip_line_stops_after_newline() {
        let mut r = reader(b"c comment\n42");
        assert!(r.skip_line().unwrap());
        assert_eq!(r.read_integer().unwrap(), Some(42));
        assert!(!r.skip_line().unwrap());
    }

    #[test]
    fn malformed_integers() {
        assert!(matches!(
            reader(b"12x").read_integer(),
            Err(ParserError::UnexpectedInput { unexpected: 'x', .. })
        ));
        assert!(matches!(
            reader(b"--1").read_integer(),
            Err(ParserError::UnexpectedInput { unexpected: '-', .. })
        ));
        assert!(matches!(
            reader(b"- 1").read_integer(),
            Err(ParserError::UnexpectedInput { unexpected: ' ', .. })
        ));
        assert!(matches!(
            reader(b"99999999999999999999999").read_integer(),
            Err(ParserError::LiteralTooLarge { .. })
        ));
    }

    #[test]
    fn read_u64_plain() {
        let mut r = reader(b" 18446744073709551615");
        assert_eq!(r.read_u64().unwrap(), Some(u64::max_value()));
        assert_eq!(r.read_u64().unwrap(), None);
    }

    #[test]
    fn open_detects_compression_by_extension() {
        use std::io::{Read, Write};

        let text = b"p cnf 2 1\n1 -2 0\n";
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("input.cnf");
        std::fs::write(&plain, &text[..]).unwrap();

        let gz = dir.path().join("input.cnf.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            std::fs::File::create(&gz).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(text).unwrap();
        encoder.finish().unwrap();

        let bz2 = dir.path().join("input.cnf.bz2");
        let mut encoder = bzip2::write::BzEncoder::new(
            std::fs::File::create(&bz2).unwrap(),
            bzip2::Compression::default(),
        );
        encoder.write_all(text).unwrap();
        encoder.finish().unwrap();

        let xz = dir.path().join("input.cnf.xz");
        let mut encoder = xz2::write::XzEncoder::new(std::fs::File::create(&xz).unwrap(), 6);
        encoder.write_all(text).unwrap();
        encoder.finish().unwrap();

        for path in &[plain, gz, bz2, xz] {
            let mut decoded = vec![];
            open_dimacs(path).unwrap().read_to_end(&mut decoded).unwrap();
            assert_eq!(decoded, text, "mismatch for {:?}", path);
        }
    }
}
