//! Terminal attributes: echo mode and window size.
//!
//! These work on any descriptor, so the child can call them on its standard
//! input before exec and the parent on the controlling side afterwards.

use std::io;
use std::os::fd::AsFd;

use rustix::io::Errno;
use rustix::termios::{
    LocalModes, OptionalActions, Winsize, tcgetattr, tcgetwinsize, tcsetattr, tcsetwinsize,
};

use crate::config::WindowSize;
use crate::error::{PtyError, Result};

/// Enable or disable echo on the terminal behind `fd`.
///
/// The change applies immediately (`TCSANOW`); draining or flushing variants
/// block inconsistently across platforms.
///
/// # Errors
///
/// Returns [`PtyError::Unsupported`] if `fd` does not support terminal
/// control.
pub fn set_echo(fd: impl AsFd, enabled: bool) -> Result<()> {
    let fd = fd.as_fd();
    let mut termios = tcgetattr(fd).map_err(|e| translate("set_echo", e))?;

    if enabled {
        termios.local_modes.insert(LocalModes::ECHO);
    } else {
        termios.local_modes.remove(LocalModes::ECHO);
    }

    tcsetattr(fd, OptionalActions::Now, &termios).map_err(|e| translate("set_echo", e))
}

/// Whether echo is enabled on the terminal behind `fd`.
///
/// # Errors
///
/// Returns [`PtyError::Unsupported`] if `fd` does not support terminal
/// control.
pub fn get_echo(fd: impl AsFd) -> Result<bool> {
    let termios = tcgetattr(fd.as_fd()).map_err(|e| translate("get_echo", e))?;
    Ok(termios.local_modes.contains(LocalModes::ECHO))
}

/// Set the window size of the terminal behind `fd`.
///
/// The foreground process group of the terminal receives `SIGWINCH`.
/// Pixel dimensions are always zero.
///
/// # Errors
///
/// Returns [`PtyError::Unsupported`] if `fd` does not support terminal
/// control.
pub fn set_window_size(fd: impl AsFd, rows: u16, cols: u16) -> Result<()> {
    let winsize = Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    tcsetwinsize(fd.as_fd(), winsize).map_err(|e| translate("set_window_size", e))
}

/// Get the window size of the terminal behind `fd`.
///
/// # Errors
///
/// Returns [`PtyError::Unsupported`] if `fd` does not support terminal
/// control.
pub fn get_window_size(fd: impl AsFd) -> Result<WindowSize> {
    let winsize = tcgetwinsize(fd.as_fd()).map_err(|e| translate("get_window_size", e))?;
    Ok(WindowSize::new(winsize.ws_row, winsize.ws_col))
}

/// `ENOTTY` and `EINVAL` mean the descriptor is not a terminal this platform
/// can control; everything else is a real I/O failure.
fn translate(operation: &'static str, errno: Errno) -> PtyError {
    let source = io::Error::from_raw_os_error(errno.raw_os_error());
    match errno {
        Errno::NOTTY | Errno::INVAL => PtyError::Unsupported { operation, source },
        _ => PtyError::Io(source),
    }
}
