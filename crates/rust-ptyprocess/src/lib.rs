//! rust-ptyprocess: run a child process in a pseudo-terminal.
//!
//! Programs that talk to a user (shells, password prompts, REPLs, curses
//! tools) behave differently when their standard streams are pipes. This
//! crate starts them on a fresh PTY instead and hands back a
//! [`PtyProcess`]: the controlling side of the terminal plus the child's
//! lifecycle.
//!
//! - Reading and writing raw bytes, with end of file reported once as
//!   [`PtyError::Eof`] and latched from then on
//! - Control characters (`send_control`, `send_eof`, `send_intr`)
//! - Terminal echo and window size
//! - Liveness checks, blocking waits and exit status
//! - Graceful termination, escalating from `SIGHUP` to `SIGKILL`
//!
//! [`PtyProcessUnicode`] reads and writes text on top of any byte stream,
//! and [`AsyncPtyProcess`] drives a handle from Tokio.
//!
//! # Quick Start
//!
//! ```no_run
//! use rust_ptyprocess::{PtyConfig, PtyError, PtyProcess};
//!
//! fn main() -> rust_ptyprocess::Result<()> {
//!     let config = PtyConfig::builder().env("TERM", "dumb").build();
//!     let mut child = PtyProcess::spawn(["sh", "-c", "echo $TERM"], &config)?;
//!
//!     let mut output = Vec::new();
//!     loop {
//!         match child.read(1024) {
//!             Ok(chunk) => output.extend_from_slice(&chunk),
//!             Err(PtyError::Eof) => break,
//!             Err(e) => return Err(e),
//!         }
//!     }
//!
//!     println!("{}", String::from_utf8_lossy(&output));
//!     println!("{}", child.wait()?);
//!     Ok(())
//! }
//! ```
//!
//! # Platform Support
//!
//! Unix only: Linux, macOS, the BSDs and Solaris/illumos. How the child
//! acquires its controlling terminal differs between them; see
//! [`SessionSetup`].

#![cfg(unix)]

pub mod config;
pub mod encoding;
pub mod error;
pub mod resolve;
pub mod traits;
pub mod unix;

// Re-export primary types
pub use config::{Delays, PtyConfig, PtyConfigBuilder, PtySignal, SessionSetup, WindowSize};
pub use encoding::{DecodeErrors, PtyProcessUnicode, Utf8Decoder};
pub use error::{EstablishError, PtyError, Result};
pub use resolve::{ExecutableResolver, SearchPath};
pub use traits::{ExitStatus, PtyStream};
pub use unix::{AsyncPtyProcess, ControlChars, PtyProcess};
