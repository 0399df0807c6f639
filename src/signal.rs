use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Installs a Ctrl-C handler that raises the returned flag.
///
/// A running organize pass checks the flag between files, so the file being
/// moved when the signal arrives is finished first.
pub fn setup_cancel_signal() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel_flag);

    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
        eprintln!("\nInterrupted, stopping after the current file...");
    })?;

    Ok(cancel_flag)
}
