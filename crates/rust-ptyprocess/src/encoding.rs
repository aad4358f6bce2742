//! Text-level access to a PTY stream.
//!
//! [`PtyProcessUnicode`] wraps any byte stream and decodes its output as
//! UTF-8. Terminal reads split multi-byte characters freely, so the
//! [`Utf8Decoder`] holds back an incomplete trailing sequence until the
//! rest arrives.

use crate::error::{PtyError, Result};
use crate::traits::PtyStream;

/// What to do with bytes that are not valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeErrors {
    /// Fail with [`PtyError::Decode`].
    #[default]
    Strict,
    /// Substitute U+FFFD for each invalid sequence.
    Replace,
}

/// Incremental UTF-8 decoder.
#[derive(Debug, Clone, Default)]
pub struct Utf8Decoder {
    errors: DecodeErrors,
    partial: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a decoder with the given error policy.
    #[must_use]
    pub const fn new(errors: DecodeErrors) -> Self {
        Self {
            errors,
            partial: Vec::new(),
        }
    }

    /// The error policy.
    #[must_use]
    pub const fn errors(&self) -> DecodeErrors {
        self.errors
    }

    /// Number of bytes held back waiting for the rest of a character.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// Decode the next chunk of a stream.
    ///
    /// An incomplete sequence at the end of `bytes` is kept for the next
    /// call, so the result can be empty.
    ///
    /// # Errors
    ///
    /// With [`DecodeErrors::Strict`], returns [`PtyError::Decode`] on the
    /// first invalid sequence. The decoder is reset in that case.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<String> {
        let mut input = std::mem::take(&mut self.partial);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    return Ok(out);
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).map_err(PtyError::Decode)?);

                    match e.error_len() {
                        None => {
                            self.partial = after.to_vec();
                            return Ok(out);
                        }
                        Some(len) => match self.errors {
                            DecodeErrors::Strict => return Err(PtyError::Decode(e)),
                            DecodeErrors::Replace => {
                                out.push(char::REPLACEMENT_CHARACTER);
                                rest = &after[len..];
                            }
                        },
                    }
                }
            }
        }
    }

    /// End the stream, flushing any held-back bytes.
    ///
    /// # Errors
    ///
    /// With [`DecodeErrors::Strict`], returns [`PtyError::IncompleteInput`]
    /// if a character was cut off.
    pub fn finish(&mut self) -> Result<String> {
        let partial = std::mem::take(&mut self.partial);
        if partial.is_empty() {
            return Ok(String::new());
        }
        match self.errors {
            DecodeErrors::Strict => Err(PtyError::IncompleteInput(partial.len())),
            DecodeErrors::Replace => Ok(char::REPLACEMENT_CHARACTER.to_string()),
        }
    }
}

/// A byte-level PTY stream read and written as text.
///
/// ```no_run
/// use rust_ptyprocess::{PtyConfig, PtyProcess, PtyProcessUnicode};
///
/// # fn main() -> rust_ptyprocess::Result<()> {
/// let child = PtyProcess::spawn(["cat"], &PtyConfig::default())?;
/// let mut child = PtyProcessUnicode::new(child);
/// child.write("héllo\n")?;
/// let line: String = child.read_line()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PtyProcessUnicode<P> {
    inner: P,
    decoder: Utf8Decoder,
}

impl<P> PtyProcessUnicode<P>
where
    P: PtyStream<Output = Vec<u8>, Input = [u8]>,
{
    /// Wrap `inner` with strict decoding.
    pub fn new(inner: P) -> Self {
        Self::with_errors(inner, DecodeErrors::Strict)
    }

    /// Wrap `inner` with the given error policy.
    pub const fn with_errors(inner: P, errors: DecodeErrors) -> Self {
        Self {
            inner,
            decoder: Utf8Decoder::new(errors),
        }
    }

    /// The wrapped stream.
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    /// The wrapped stream, mutably. Bytes read through it bypass the
    /// decoder.
    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.inner
    }

    /// Unwrap, discarding any held-back bytes.
    pub fn into_inner(self) -> P {
        self.inner
    }

    /// Read at most `size` bytes and decode them.
    ///
    /// The result may be shorter than the bytes read, or empty, while a
    /// character is split across reads.
    ///
    /// # Errors
    ///
    /// Errors of the wrapped stream, and decoding errors.
    pub fn read(&mut self, size: usize) -> Result<String> {
        let bytes = self.inner.read(size)?;
        self.decoder.decode(&bytes)
    }

    /// Read and decode one line.
    ///
    /// # Errors
    ///
    /// Errors of the wrapped stream, and decoding errors.
    pub fn read_line(&mut self) -> Result<String> {
        let bytes = self.inner.read_line()?;
        self.decoder.decode(&bytes)
    }

    /// Encode `text` as UTF-8 and write it, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Errors of the wrapped stream.
    pub fn write(&mut self, text: &str) -> Result<usize> {
        self.inner.write(text.as_bytes())
    }

    /// Flush the decoder at the end of the stream.
    ///
    /// # Errors
    ///
    /// See [`Utf8Decoder::finish`].
    pub fn finish(&mut self) -> Result<String> {
        self.decoder.finish()
    }
}

impl<P> PtyStream for PtyProcessUnicode<P>
where
    P: PtyStream<Output = Vec<u8>, Input = [u8]>,
{
    type Output = String;
    type Input = str;

    fn read(&mut self, size: usize) -> Result<String> {
        Self::read(self, size)
    }

    fn read_line(&mut self) -> Result<String> {
        Self::read_line(self)
    }

    fn write(&mut self, data: &str) -> Result<usize> {
        Self::write(self, data)
    }
}
