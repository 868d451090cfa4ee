//! Terminal I/O layer: raw mode, Kitty Graphics Protocol, search prompt.

use std::cell::UnsafeCell;
use std::io::{self, BufRead, Read, Write, stdout};
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{ExecutableCommand, QueueableCommand, cursor, terminal};
use log::trace;

use crate::raster;
use crate::viewport::{Frame, ImageDraw};

// ---------------------------------------------------------------------------
// RawGuard — scoped raw mode, restored on drop
// ---------------------------------------------------------------------------

/// The input worker enters raw mode only for the duration of a single byte
/// read. Between reads (and while the worker is parked on the ack channel)
/// the terminal is cooked, so Ctrl-C and the search prompt behave normally.
pub(super) struct RawGuard;

impl RawGuard {
    pub(super) fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Read one key byte in raw mode. Returns `None` on EOF.
pub(super) fn read_one_char() -> io::Result<Option<char>> {
    let _guard = RawGuard::enter()?;
    let mut buf = [0u8; 1];
    let n = io::stdin().read(&mut buf)?;
    Ok((n == 1).then(|| char::from(buf[0])))
}

// ---------------------------------------------------------------------------
// Frame drawing
// ---------------------------------------------------------------------------

/// Paint a composed frame: wipe the previous one (text and image layers),
/// lay down the text rows, then transmit the deferred image draws.
pub(super) fn draw_frame(frame: &Frame) -> io::Result<()> {
    let mut out = stdout();
    out.queue(terminal::Clear(terminal::ClearType::All))?;
    write!(out, "\x1b_Ga=d,d=A\x1b\\")?;
    for (i, row) in frame.rows.iter().enumerate() {
        out.queue(cursor::MoveTo(0, i as u16))?;
        write!(out, "{row}")?;
    }
    for image in &frame.images {
        send_image(&mut out, image)?;
    }
    out.flush()
}

/// Transmit one image at its anchor via the Kitty Graphics Protocol.
fn send_image(out: &mut impl Write, image: &ImageDraw) -> io::Result<()> {
    trace!(
        "kitty draw at ({}, {}), {}x{} cells, {} b64 bytes",
        image.screen_row,
        image.screen_col,
        image.rows,
        image.cols,
        image.b64.len()
    );
    out.queue(cursor::MoveTo(image.screen_col, image.screen_row))?;
    for chunk in raster::kitty_chunks(&image.b64, image.rows, image.cols) {
        write!(out, "{chunk}")?;
    }
    Ok(())
}

pub(super) fn clear_screen() -> io::Result<()> {
    let mut out = stdout();
    out.queue(terminal::Clear(terminal::ClearType::All))?;
    write!(out, "\x1b_Ga=d,d=A\x1b\\")?;
    out.queue(cursor::MoveTo(0, 0))?;
    out.flush()
}

// ---------------------------------------------------------------------------
// Search prompt
// ---------------------------------------------------------------------------

/// Read a search pattern on the bottom row. The terminal is cooked here
/// (the input worker is parked awaiting its ack), so line editing works.
pub(super) fn prompt_pattern(rows: u16, forward: bool) -> io::Result<String> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, rows.saturating_sub(1)))?;
    out.queue(terminal::Clear(terminal::ClearType::CurrentLine))?;
    out.queue(cursor::Show)?;
    write!(out, "{}", if forward { '/' } else { '?' })?;
    out.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    out.execute(cursor::Hide)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

pub(super) fn hide_cursor() -> io::Result<()> {
    stdout().execute(cursor::Hide).map(|_| ())
}

pub(super) fn show_cursor() -> io::Result<()> {
    stdout().execute(cursor::Show).map(|_| ())
}

pub(super) fn check_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;
    if !io::stdout().is_terminal() {
        anyhow::bail!(
            "nbview requires an interactive terminal.\n\
             \n\
             Supported terminals: Kitty, Ghostty, WezTerm"
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SIGINT
// ---------------------------------------------------------------------------

// The handler restores terminal attributes with raw tcsetattr instead of
// crossterm's disable_raw_mode: the latter takes a mutex, and a signal
// landing while the input worker is mid enable/disable would deadlock on it.
// tcsetattr and _exit are async-signal-safe.
struct SavedTermios(UnsafeCell<MaybeUninit<libc::termios>>);

// Written once before the handler is installed, read only by the handler.
unsafe impl Sync for SavedTermios {}

static ORIG_TERMIOS: SavedTermios = SavedTermios(UnsafeCell::new(MaybeUninit::uninit()));
static TERMIOS_SAVED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_: libc::c_int) {
    if TERMIOS_SAVED.load(Ordering::Acquire) {
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, (*ORIG_TERMIOS.0.get()).as_ptr());
        }
    }
    unsafe { libc::_exit(130) }
}

pub(super) fn install_sigint_handler() -> anyhow::Result<()> {
    use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
    // Capture the cooked attributes now, while no raw-mode toggling is in
    // flight. If stdin is not a tty the handler just exits.
    unsafe {
        let slot = ORIG_TERMIOS.0.get();
        if libc::tcgetattr(libc::STDIN_FILENO, (*slot).as_mut_ptr()) == 0 {
            TERMIOS_SAVED.store(true, Ordering::Release);
        }
    }
    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe { signal::sigaction(Signal::SIGINT, &action) }?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigint_handler_installs_without_a_tty() {
        // In a test harness stdin is usually a pipe: tcgetattr fails, the
        // saved-attributes flag stays unset, and installation still works.
        assert!(install_sigint_handler().is_ok());
    }
}
