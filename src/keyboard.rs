use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use lazy_static::lazy_static;

use crate::definitions::{BACKSPACE_KEY, NEWLINE_KEY};

const MAX_LINE: usize = 255;

lazy_static! {
    static ref SPECIAL_KEY_CODES: HashMap<&'static str, u8> = {
        let mut map = HashMap::new();
        map.insert("Return", NEWLINE_KEY);
        map.insert("Keypad Enter", NEWLINE_KEY);
        map.insert("Backspace", BACKSPACE_KEY);
        map.insert("Tab", b'\t');
        map
    };
}

/// Codepoint for a named non-printable key, if the machine understands it.
pub fn special_key_code(name: &str) -> Option<u8> {
    SPECIAL_KEY_CODES.get(name).copied()
}

/// What the back end should draw after posting a key while line editing is
/// active.
#[derive(Debug, PartialEq, Eq)]
pub enum Echo {
    None,
    Char(u8),
    Backspace,
}

struct Inner {
    key_seq: u64,
    last_key: u8,
    line: String,
    line_ready: bool,
}

/// The keyboard mailbox shared between the input pump and the machine
/// thread. It carries two views of the same key stream: a single slot with
/// the most recent codepoint (consumed by the READ_CHAR opcode, earlier
/// keys are deliberately coalesced away) and an edited line buffer for the
/// shell prompt.
pub struct InputState {
    inner: Mutex<Inner>,
    line_mode: AtomicBool,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                key_seq: 0,
                last_key: 0,
                line: String::new(),
                line_ready: false,
            }),
            line_mode: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // nothing panics while holding the lock, so a poisoned mutex still
        // carries valid state
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver one codepoint from the back end. Returns the echo the back
    /// end should render when the shell is currently editing a line.
    pub fn post_key(&self, c: u8) -> Echo {
        let mut inner = self.lock();
        inner.key_seq += 1;
        inner.last_key = c;

        if !self.line_mode.load(Ordering::Relaxed) {
            return Echo::None;
        }
        match c {
            NEWLINE_KEY => {
                inner.line_ready = true;
                Echo::None
            }
            BACKSPACE_KEY => {
                if inner.line.pop().is_some() {
                    Echo::Backspace
                } else {
                    Echo::None
                }
            }
            0x20..=0x7E => {
                if inner.line.len() < MAX_LINE {
                    inner.line.push(c as char);
                    Echo::Char(c)
                } else {
                    Echo::None
                }
            }
            _ => Echo::None,
        }
    }

    /// Sequence number of the most recently posted key; a later
    /// `take_key_after` with this value only sees newer keys.
    pub fn key_seq(&self) -> u64 {
        self.lock().key_seq
    }

    /// The latest codepoint, but only if one arrived after `since`.
    pub fn take_key_after(&self, since: u64) -> Option<u8> {
        let inner = self.lock();
        (inner.key_seq > since).then_some(inner.last_key)
    }

    /// Start collecting a fresh line; keys posted from now on are edited
    /// into the buffer and echoed.
    pub fn begin_line(&self) {
        let mut inner = self.lock();
        inner.line.clear();
        inner.line_ready = false;
        self.line_mode.store(true, Ordering::Relaxed);
    }

    /// The finished line, once Return has been posted.
    pub fn poll_line(&self) -> Option<String> {
        let mut inner = self.lock();
        if !inner.line_ready {
            return None;
        }
        inner.line_ready = false;
        self.line_mode.store(false, Ordering::Relaxed);
        Some(std::mem::take(&mut inner.line))
    }

    pub fn end_line(&self) {
        self.line_mode.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_between_reads_are_coalesced() {
        let input = InputState::new();
        let since = input.key_seq();
        input.post_key(b'a');
        input.post_key(b'b');
        input.post_key(b'c');
        assert_eq!(input.take_key_after(since), Some(b'c'));
    }

    #[test]
    fn keys_before_the_read_began_are_discarded() {
        let input = InputState::new();
        input.post_key(b'x');
        let since = input.key_seq();
        assert_eq!(input.take_key_after(since), None);
        input.post_key(b'y');
        assert_eq!(input.take_key_after(since), Some(b'y'));
    }

    #[test]
    fn line_editing_with_backspace() {
        let input = InputState::new();
        input.begin_line();
        assert_eq!(input.post_key(b'l'), Echo::Char(b'l'));
        assert_eq!(input.post_key(b'z'), Echo::Char(b'z'));
        assert_eq!(input.post_key(BACKSPACE_KEY), Echo::Backspace);
        assert_eq!(input.post_key(b's'), Echo::Char(b's'));
        assert_eq!(input.poll_line(), None);
        input.post_key(NEWLINE_KEY);
        assert_eq!(input.poll_line(), Some("ls".to_string()));
    }

    #[test]
    fn backspace_on_an_empty_line_is_not_echoed() {
        let input = InputState::new();
        input.begin_line();
        assert_eq!(input.post_key(BACKSPACE_KEY), Echo::None);
    }

    #[test]
    fn keys_outside_line_mode_are_not_buffered() {
        let input = InputState::new();
        assert_eq!(input.post_key(b'q'), Echo::None);
        input.begin_line();
        input.post_key(NEWLINE_KEY);
        assert_eq!(input.poll_line(), Some(String::new()));
    }

    #[test]
    fn special_keys_resolve_to_codepoints() {
        assert_eq!(special_key_code("Return"), Some(NEWLINE_KEY));
        assert_eq!(special_key_code("Backspace"), Some(BACKSPACE_KEY));
        assert_eq!(special_key_code("F1"), None);
    }
}
