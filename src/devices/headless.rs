use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::screen::Screen;
use super::DeviceSurface;

/// Device surface for tests and scripted runs: it owns its screen, feeds
/// `read_char` from a prepared key queue, advances a virtual clock instead
/// of sleeping, and records beeps so they can be asserted on.
///
/// An exhausted key queue behaves like a shutdown request, so a program
/// waiting for input terminates instead of hanging the test.
pub struct HeadlessSurface {
    pub screen: Screen,
    keys: VecDeque<u8>,
    clock_seconds: u32,
    slept_ms: u64,
    beeps: Vec<(u16, u16)>,
    rng: StdRng,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            screen: Screen::new(),
            keys: VecDeque::new(),
            clock_seconds: 0,
            slept_ms: 0,
            beeps: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Queue key codepoints for upcoming `read_char` calls.
    pub fn type_keys(&mut self, keys: impl IntoIterator<Item = u8>) {
        self.keys.extend(keys);
    }

    pub fn set_clock_seconds(&mut self, seconds: u32) {
        self.clock_seconds = seconds;
    }

    pub fn slept_ms(&self) -> u64 {
        self.slept_ms
    }

    pub fn beeps(&self) -> &[(u16, u16)] {
        &self.beeps
    }
}

impl DeviceSurface for HeadlessSurface {
    fn put_char(&mut self, c: u8) {
        self.screen.put_char(c);
    }

    fn clear_text(&mut self) {
        self.screen.clear_text();
    }

    fn set_color(&mut self, idx: u8) {
        self.screen.set_color(idx);
    }

    fn set_cursor(&mut self, x: u16, y: u16) {
        self.screen.set_cursor(x, y);
    }

    fn cursor(&self) -> (u16, u16) {
        self.screen.cursor()
    }

    fn set_pixel(&mut self, x: u16, y: u16, on: bool) {
        self.screen.set_pixel(x, y, on);
    }

    fn clear_pixels(&mut self) {
        self.screen.clear_pixels();
    }

    fn draw_line(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.screen.draw_line(x1, y1, x2, y2);
    }

    fn draw_rect(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.screen.draw_rect(x1, y1, x2, y2);
    }

    fn fill_rect(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.screen.fill_rect(x1, y1, x2, y2);
    }

    fn draw_circle(&mut self, cx: u16, cy: u16, r: u16) {
        self.screen.draw_circle(cx, cy, r);
    }

    fn sleep_ms(&mut self, ms: u16) {
        self.slept_ms += ms as u64;
    }

    fn beep(&mut self, freq: u16, duration_ms: u16) {
        self.beeps.push((freq, duration_ms));
    }

    fn read_char(&mut self) -> Option<u8> {
        self.keys.pop_front()
    }

    fn now_seconds(&self) -> u32 {
        self.clock_seconds
    }

    fn random(&mut self, max: u16) -> u16 {
        self.rng.gen_range(0..=max)
    }
}
