//! Interrupt handling: Ctrl-C ends the whole session, not just the running pipeline.

use signal_hook::iterator::Signals;
use std::io::{self, Write};
use std::thread;

pub use signal_hook::consts::SIGINT;

/// Printed when the interpreter is interrupted.
pub const FAREWELL: &str = concat!(
    "\x1b[0m\n\nexit signal received. quitting...\n",
    "--- thank you for using ",
    "\x1b[0;31mm\x1b[0;32my\x1b[0;33mS\x1b[0;34mh\x1b[0;35me\x1b[0;36ml\x1b[0ml",
    " ---\n",
);

/// Prints the farewell banner and terminates the process with `signal` as status.
pub fn farewell(signal: i32) -> ! {
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(FAREWELL.as_bytes());
    let _ = stdout.flush();
    std::process::exit(signal)
}

/// Registers the process-wide SIGINT listener. Call once, before the first fork.
pub fn install_interrupt_handler() -> io::Result<()> {
    let mut signals = Signals::new([SIGINT])?;
    thread::Builder::new()
        .name("sigint".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                log::info!("received signal {}", sig);
                farewell(sig);
            }
        })?;
    Ok(())
}
