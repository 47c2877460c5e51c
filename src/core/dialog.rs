//! ASH-005: Safe blocking dialog invocation.
//!
//! GUI toolkits want a host window alive while a modal dialog runs and are
//! prone to faulting. [`DialogRunner::run_blocking_dialog`] creates the host
//! right before the dialog, raises it, and destroys it on every exit path
//! (including a panicking factory). Factory faults become `None`, which a
//! step sees as "nothing selected".

use std::cell::Cell;
use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Fault raised by a dialog host or factory. Never leaves this module's runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dialog fault: {0}")]
pub struct DialogFault(pub String);

/// Handle to a transient host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostWindow(pub u64);

/// Window-system side of the protocol.
pub trait DialogHost {
    /// Create a hidden host window for one dialog.
    fn create(&self) -> Result<HostWindow, DialogFault>;

    /// Raise the window above other application windows.
    fn raise(&self, window: HostWindow);

    /// Tear the window down.
    fn destroy(&self, window: HostWindow);
}

/// Host for environments without a window system; windows are plain ids.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    next: Cell<u64>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DialogHost for HeadlessHost {
    fn create(&self) -> Result<HostWindow, DialogFault> {
        let id = self.next.get() + 1;
        self.next.set(id);
        Ok(HostWindow(id))
    }

    fn raise(&self, _window: HostWindow) {}

    fn destroy(&self, _window: HostWindow) {}
}

/// Destroys the host window when dropped, including during unwinding.
struct WindowGuard<'a> {
    host: &'a dyn DialogHost,
    window: HostWindow,
}

impl Drop for WindowGuard<'_> {
    fn drop(&mut self) {
        self.host.destroy(self.window);
    }
}

/// The `run_dialog` capability.
pub struct DialogRunner {
    host: Box<dyn DialogHost>,
}

impl DialogRunner {
    pub fn new(host: Box<dyn DialogHost>) -> Self {
        Self { host }
    }

    /// Run `factory` inside a freshly created, raised host window.
    ///
    /// Returns the selection, or `None` when nothing was selected, the host
    /// could not be created, or the factory faulted.
    pub fn run_blocking_dialog<F>(&self, factory: F) -> Option<String>
    where
        F: FnOnce(HostWindow) -> Result<Option<String>, DialogFault>,
    {
        let window = match self.host.create() {
            Ok(w) => w,
            Err(e) => {
                eprintln!("dialog host unavailable: {}", e);
                return None;
            }
        };
        let guard = WindowGuard {
            host: self.host.as_ref(),
            window,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.host.raise(window);
            factory(window)
        }));
        drop(guard);

        match outcome {
            Ok(Ok(selection)) => selection.filter(|s| !s.is_empty()),
            Ok(Err(fault)) => {
                eprintln!("{}", fault);
                None
            }
            Err(_) => {
                eprintln!("dialog fault: dialog factory panicked");
                None
            }
        }
    }
}

impl std::fmt::Debug for DialogRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogRunner").finish_non_exhaustive()
    }
}

/// Terminal stand-in for a file chooser: shows `title` and reads a path.
pub fn terminal_path_prompt(
    title: &str,
) -> impl FnOnce(HostWindow) -> Result<Option<String>, DialogFault> + '_ {
    move |_window| {
        print!("{} (leave empty to cancel): ", title);
        std::io::stdout()
            .flush()
            .map_err(|e| DialogFault(format!("cannot write prompt: {}", e)))?;
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| DialogFault(format!("cannot read selection: {}", e)))?;
        let path = line.trim();
        Ok((!path.is_empty()).then(|| path.to_string()))
    }
}
