use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::ThreadRng;
use rand::Rng;

use super::screen::Screen;
use super::DeviceSurface;
use crate::keyboard::InputState;

/// How often the blocking calls look at the mailbox and the shutdown flag.
const POLL: Duration = Duration::from_millis(20);

/// A beep request handed to the display back end, which owns the audio
/// device.
#[derive(Debug, Clone, Copy)]
pub struct Beep {
    pub freq: u16,
    pub duration_ms: u16,
}

/// The device surface of the real machine. The screen is shared with the
/// render thread behind a mutex, keys arrive through the mailbox, and beeps
/// are forwarded to the back end over a channel. All blocking happens here,
/// on the machine thread; the back end never waits for the machine.
pub struct Console {
    screen: Arc<Mutex<Screen>>,
    input: Arc<InputState>,
    shutdown: Arc<AtomicBool>,
    beep_tx: Option<Sender<Beep>>,
    rng: ThreadRng,
}

impl Console {
    pub fn new(
        screen: Arc<Mutex<Screen>>,
        input: Arc<InputState>,
        shutdown: Arc<AtomicBool>,
        beep_tx: Option<Sender<Beep>>,
    ) -> Self {
        Self {
            screen,
            input,
            shutdown,
            beep_tx,
            rng: rand::thread_rng(),
        }
    }

    fn screen(&self) -> MutexGuard<'_, Screen> {
        self.screen.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read one edited line for the shell. The input pump does the echoing
    /// and backspace handling against the shared screen while we wait.
    /// Returns `None` when the back end shuts down instead.
    pub fn read_line(&mut self) -> Option<String> {
        self.input.begin_line();
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                self.input.end_line();
                return None;
            }
            if let Some(line) = self.input.poll_line() {
                self.screen().put_char(b'\n');
                return Some(line);
            }
            thread::sleep(POLL);
        }
    }
}

impl DeviceSurface for Console {
    fn put_char(&mut self, c: u8) {
        self.screen().put_char(c);
    }

    fn clear_text(&mut self) {
        self.screen().clear_text();
    }

    fn set_color(&mut self, idx: u8) {
        self.screen().set_color(idx);
    }

    fn set_cursor(&mut self, x: u16, y: u16) {
        self.screen().set_cursor(x, y);
    }

    fn cursor(&self) -> (u16, u16) {
        self.screen().cursor()
    }

    fn set_pixel(&mut self, x: u16, y: u16, on: bool) {
        self.screen().set_pixel(x, y, on);
    }

    fn clear_pixels(&mut self) {
        self.screen().clear_pixels();
    }

    fn draw_line(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.screen().draw_line(x1, y1, x2, y2);
    }

    fn draw_rect(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.screen().draw_rect(x1, y1, x2, y2);
    }

    fn fill_rect(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.screen().fill_rect(x1, y1, x2, y2);
    }

    fn draw_circle(&mut self, cx: u16, cy: u16, r: u16) {
        self.screen().draw_circle(cx, cy, r);
    }

    fn sleep_ms(&mut self, ms: u16) {
        // sleep in slices so a window close does not keep the machine
        // thread pinned for the full duration
        let mut remaining = Duration::from_millis(ms as u64);
        while !remaining.is_zero() {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            let slice = remaining.min(Duration::from_millis(50));
            thread::sleep(slice);
            remaining -= slice;
        }
    }

    fn beep(&mut self, freq: u16, duration_ms: u16) {
        if let Some(tx) = &self.beep_tx {
            let _ = tx.send(Beep { freq, duration_ms });
        }
        // the tone plays asynchronously; pace the program so consecutive
        // beeps stay audible as separate notes
        self.sleep_ms(duration_ms);
    }

    fn read_char(&mut self) -> Option<u8> {
        let since = self.input.key_seq();
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return None;
            }
            if let Some(c) = self.input.take_key_after(since) {
                return Some(c);
            }
            thread::sleep(POLL);
        }
    }

    fn now_seconds(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32
    }

    fn random(&mut self, max: u16) -> u16 {
        self.rng.gen_range(0..=max)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}
