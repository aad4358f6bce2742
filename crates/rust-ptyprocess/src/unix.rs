//! Unix implementation: PTY allocation, process spawning and the process
//! handle.
//!
//! - [`pty`]: allocating a controller/subordinate pair
//! - [`establish`]: making the subordinate the child's controlling terminal
//! - [`termios`]: echo and window size on any terminal descriptor
//! - [`process`], [`reap`]: the handle, liveness and exit status
//! - [`async_io`]: the Tokio adapter

pub mod async_io;
pub mod control;
pub mod establish;
pub mod process;
pub mod pty;
pub mod reap;
mod spawn;
pub mod termios;
mod terminate;

pub use async_io::AsyncPtyProcess;
pub use control::{ControlChars, control_code};
pub use establish::{ControllingTerminal, EstablishError};
pub use process::PtyProcess;
pub use pty::PtyPair;
pub use reap::{ProcessState, Reaper};
pub use spawn::{EXEC_FAILED, SETUP_FAILED};
