//! Stopping the child: signal escalation, `close` and `Drop`.

use std::thread;

use crate::config::PtySignal;
use crate::error::{PtyError, Result};
use crate::unix::process::PtyProcess;

/// Signals tried in order before falling back to `SIGKILL`.
///
/// `SIGCONT` wakes a stopped child so that a pending hangup is delivered.
const ESCALATION: [PtySignal; 3] = [PtySignal::Hangup, PtySignal::Continue, PtySignal::Interrupt];

impl PtyProcess {
    /// Ask the child to exit, escalating through `SIGHUP`, `SIGCONT` and
    /// `SIGINT`, and finally `SIGKILL` when `force` is set.
    ///
    /// Each signal is followed by a [`Delays::after_terminate`] pause and a
    /// liveness check; after `SIGKILL` the child is reaped with a blocking
    /// wait. Returns whether the child is gone.
    ///
    /// [`Delays::after_terminate`]: crate::Delays::after_terminate
    ///
    /// # Errors
    ///
    /// Propagates errors from [`is_alive`](Self::is_alive).
    pub fn terminate(&mut self, force: bool) -> Result<bool> {
        if !self.is_alive()? {
            return Ok(true);
        }

        let signals = ESCALATION
            .into_iter()
            .chain(force.then_some(PtySignal::Kill));

        for signal in signals {
            tracing::debug!(pid = self.pid(), ?signal, "terminating child");

            if let Err(e) = self.deliver(signal) {
                // The child may have exited between the check and the signal.
                tracing::debug!(pid = self.pid(), error = %e, "signal delivery failed");
                thread::sleep(self.delays.after_terminate);
                return Ok(!self.is_alive()?);
            }

            if signal == PtySignal::Kill {
                // SIGKILL cannot be caught, so waiting for it always returns.
                self.wait()?;
                return Ok(true);
            }

            thread::sleep(self.delays.after_terminate);
            if !self.is_alive()? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Close the terminal and make sure the child is gone.
    ///
    /// The child usually exits on its own once its terminal hangs up; if it
    /// is still running after [`Delays::after_close`] it is terminated, with
    /// `SIGKILL` as the last resort when `force` is set. Closing twice has
    /// no effect.
    ///
    /// [`Delays::after_close`]: crate::Delays::after_close
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::TerminateFailed`] if the child survived. The
    /// handle counts as closed either way.
    pub fn close(&mut self, force: bool) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }

        self.flush()?;
        drop(self.release_fd());
        tracing::debug!(pid = self.pid(), "terminal closed");

        thread::sleep(self.delays.after_close);
        if self.is_alive()? && !self.terminate(force)? {
            return Err(PtyError::TerminateFailed);
        }
        Ok(())
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close(true) {
            tracing::debug!(pid = self.pid(), error = %e, "close on drop failed");
        }
    }
}
