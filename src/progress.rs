use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

/// Callback type for reporting download progress.
/// Arguments: asset name, bytes written, total bytes (0 if unknown), MiB/s, is_complete
pub type ProgressFn = Arc<dyn Fn(&str, u64, u64, f64, bool) + Send + Sync>;

const MIB: f64 = 1024.0 * 1024.0;

/// Progress bar on a terminal, plain carriage-return lines otherwise.
pub fn default_progress_fn() -> ProgressFn {
    if std::io::stdout().is_terminal() {
        bar_progress_fn()
    } else {
        plain_progress_fn()
    }
}

/// Prints `    12.0/40.5 MB (29%)` lines to stdout, rewriting the line in place.
pub fn plain_progress_fn() -> ProgressFn {
    Arc::new(|_src: &str, current: u64, total: u64, _mib_per_sec: f64, complete: bool| {
        let mut out = std::io::stdout().lock();
        if total > 0 {
            let _ = write!(
                out,
                "\r    {:.1}/{:.1} MB ({}%)",
                current as f64 / MIB,
                total as f64 / MIB,
                current * 100 / total
            );
        } else {
            let _ = write!(out, "\r    {:.1} MB", current as f64 / MIB);
        }
        if complete {
            let _ = writeln!(out);
        }
        let _ = out.flush();
    })
}

/// An `indicatif` byte bar, created on the first report of each download
/// and finished on the completing one.
pub fn bar_progress_fn() -> ProgressFn {
    let current_bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));

    Arc::new(move |src: &str, current: u64, total: u64, _mib_per_sec: f64, complete: bool| {
        let Ok(mut slot) = current_bar.lock() else {
            return;
        };
        let bar = slot.get_or_insert_with(|| new_bar(src, total));
        bar.set_position(current);
        if complete {
            bar.finish();
            *slot = None;
        }
    })
}

fn new_bar(src: &str, total: u64) -> ProgressBar {
    let bar = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::no_length()
    };
    if let Ok(style) = ProgressStyle::with_template(
        "    {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec}",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(src.to_owned());
    bar
}
