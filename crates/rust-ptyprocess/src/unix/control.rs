//! Control characters sent to the child.

use std::os::fd::AsFd;
use std::sync::OnceLock;

use rustix::termios::{SpecialCodeIndex, tcgetattr};

/// ASCII EOT, the usual `VEOF` (Ctrl+D).
pub const DEFAULT_EOF: u8 = 4;

/// ASCII ETX, the usual `VINTR` (Ctrl+C).
pub const DEFAULT_INTR: u8 = 3;

/// The byte for the control sequence `Ctrl+<c>`.
///
/// Letters map case-insensitively to 1–26; a handful of punctuation marks
/// cover the remaining C0 codes and DEL. Anything else has no control code.
#[must_use]
pub const fn control_code(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        '@' | '`' => Some(0),
        '[' | '{' => Some(27),
        '\\' | '|' => Some(28),
        ']' | '}' => Some(29),
        '^' | '~' => Some(30),
        '_' => Some(31),
        '?' => Some(127),
        _ => None,
    }
}

/// The bytes that make a terminal's line discipline signal end-of-file and
/// interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChars {
    /// `VEOF`.
    pub eof: u8,
    /// `VINTR`.
    pub intr: u8,
}

impl Default for ControlChars {
    fn default() -> Self {
        Self {
            eof: DEFAULT_EOF,
            intr: DEFAULT_INTR,
        }
    }
}

impl ControlChars {
    /// Read `VEOF`/`VINTR` from the terminal on stdin, or on stdout if stdin
    /// is not one.
    ///
    /// Falls back to Ctrl+D / Ctrl+C when neither is a terminal, e.g. under
    /// cron or with both streams closed.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_terminal(std::io::stdin())
            .or_else(|| Self::from_terminal(std::io::stdout()))
            .unwrap_or_default()
    }

    /// The characters of the terminal behind `fd`, if it is one.
    #[must_use]
    pub fn from_terminal(fd: impl AsFd) -> Option<Self> {
        let termios = tcgetattr(fd).ok()?;
        Some(Self {
            eof: termios.special_codes[SpecialCodeIndex::VEOF],
            intr: termios.special_codes[SpecialCodeIndex::VINTR],
        })
    }

    /// [`detect`](Self::detect), computed once per process.
    #[must_use]
    pub fn inherited() -> Self {
        static INHERITED: OnceLock<ControlChars> = OnceLock::new();
        *INHERITED.get_or_init(Self::detect)
    }
}
