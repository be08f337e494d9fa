//! Generates `demo.bin` for the file store: a short reel that exercises the
//! text plane, colors, the pixel plane, sound, the RNG and the call stack.

use std::fs;
use std::path::PathBuf;
use std::process::exit;

use clap::{arg, command, value_parser};
use rand::Rng;

use microemu::emulator::opcode::Opcode;

struct Program {
    data: Vec<u8>,
}

impl Program {
    fn new() -> Self {
        Self { data: Vec::new() }
    }

    fn here(&self) -> u16 {
        self.data.len() as u16
    }

    fn emit_byte(&mut self, byte: u8) {
        self.data.push(byte);
    }

    fn emit_word(&mut self, word: u16) {
        self.data.extend_from_slice(&word.to_le_bytes());
    }

    fn emit_string(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
        self.emit_byte(0);
    }

    /// Fill in a jump target that was not known at emit time.
    fn patch_word(&mut self, at: u16, word: u16) {
        self.data[at as usize..at as usize + 2].copy_from_slice(&word.to_le_bytes());
    }

    fn print_str(&mut self, s: &str) {
        self.emit_byte(Opcode::PrintStr as u8);
        self.emit_string(s);
    }

    fn print_char(&mut self, c: u8) {
        self.emit_byte(Opcode::PrintChar as u8);
        self.emit_byte(c);
    }

    fn clear_screen(&mut self) {
        self.emit_byte(Opcode::ClearScreen as u8);
    }

    fn set_color(&mut self, idx: u8) {
        self.emit_byte(Opcode::SetColor as u8);
        self.emit_byte(idx);
    }

    fn set_cursor(&mut self, x: u8, y: u8) {
        self.emit_byte(Opcode::SetCursor as u8);
        self.emit_byte(x);
        self.emit_byte(y);
    }

    fn sleep_ms(&mut self, ms: u16) {
        self.emit_byte(Opcode::SleepMs as u8);
        self.emit_word(ms);
    }

    fn beep(&mut self, freq: u16, ms: u16) {
        self.emit_byte(Opcode::Beep as u8);
        self.emit_word(freq);
        self.emit_word(ms);
    }

    fn set_pixel(&mut self, x: u16, y: u16, on: bool) {
        self.emit_byte(Opcode::SetPixel as u8);
        self.emit_word(x);
        self.emit_word(y);
        self.emit_byte(on as u8);
    }

    fn clear_pixels(&mut self) {
        self.emit_byte(Opcode::ClearPixels as u8);
    }

    fn draw_line(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.emit_byte(Opcode::DrawLine as u8);
        self.emit_word(x1);
        self.emit_word(y1);
        self.emit_word(x2);
        self.emit_word(y2);
    }

    fn draw_rect(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.emit_byte(Opcode::DrawRect as u8);
        self.emit_word(x1);
        self.emit_word(y1);
        self.emit_word(x2);
        self.emit_word(y2);
    }

    fn fill_rect(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        self.emit_byte(Opcode::FillRect as u8);
        self.emit_word(x1);
        self.emit_word(y1);
        self.emit_word(x2);
        self.emit_word(y2);
    }

    fn draw_circle(&mut self, cx: u16, cy: u16, r: u16) {
        self.emit_byte(Opcode::DrawCircle as u8);
        self.emit_word(cx);
        self.emit_word(cy);
        self.emit_word(r);
    }

    fn load_reg(&mut self, r: u8, value: u16) {
        self.emit_byte(Opcode::LoadReg as u8);
        self.emit_byte(r);
        self.emit_word(value);
    }

    fn sub(&mut self, dst: u8, a: u8, b: u8) {
        self.emit_byte(Opcode::Sub as u8);
        self.emit_byte(dst);
        self.emit_byte(a);
        self.emit_byte(b);
    }

    fn and(&mut self, dst: u8, a: u8, b: u8) {
        self.emit_byte(Opcode::And as u8);
        self.emit_byte(dst);
        self.emit_byte(a);
        self.emit_byte(b);
    }

    fn cmp(&mut self, a: u8, b: u8) {
        self.emit_byte(Opcode::Cmp as u8);
        self.emit_byte(a);
        self.emit_byte(b);
    }

    fn jnz(&mut self, target: u16) {
        self.emit_byte(Opcode::Jnz as u8);
        self.emit_word(target);
    }

    /// Emit a jump with a zero target and return the patch location.
    fn jump_fixup(&mut self, op: Opcode) -> u16 {
        self.emit_byte(op as u8);
        let at = self.here();
        self.emit_word(0);
        at
    }

    fn call(&mut self, target: u16) {
        self.emit_byte(Opcode::Call as u8);
        self.emit_word(target);
    }

    fn ret(&mut self) {
        self.emit_byte(Opcode::Ret as u8);
    }

    fn random(&mut self, r: u8, max: u16) {
        self.emit_byte(Opcode::Random as u8);
        self.emit_byte(r);
        self.emit_word(max);
    }

    fn get_time(&mut self, r: u8) {
        self.emit_byte(Opcode::GetTime as u8);
        self.emit_byte(r);
    }

    fn read_char(&mut self, r: u8) {
        self.emit_byte(Opcode::ReadChar as u8);
        self.emit_byte(r);
    }

    fn halt(&mut self) {
        self.emit_byte(Opcode::Halt as u8);
    }
}

fn banner(p: &mut Program) {
    p.clear_screen();
    p.set_color(14);
    p.set_cursor(26, 2);
    p.print_str("*** MicroComputer ***");
    p.set_color(7);
    p.set_cursor(30, 4);
    p.print_str("demo reel");
    p.set_cursor(0, 7);
    p.sleep_ms(900);
}

fn typewriter(p: &mut Program, text: &str) {
    for &b in text.as_bytes() {
        p.print_char(b);
        p.sleep_ms(25);
    }
}

fn color_bars(p: &mut Program) {
    p.print_str("\n");
    for idx in 1..16 {
        p.set_color(idx);
        p.print_str("############################\n");
        p.sleep_ms(60);
    }
    p.set_color(15);
    p.sleep_ms(600);
}

fn tabs_and_backspace(p: &mut Program) {
    p.print_str("Tab stops:");
    p.print_char(b'\t');
    p.print_str("one");
    p.print_char(b'\t');
    p.print_str("two");
    p.print_char(b'\t');
    p.print_str("three\n");
    p.print_str("Backspace: oops");
    p.sleep_ms(400);
    // rub out the last four characters
    for _ in 0..4 {
        p.print_char(0x08);
        p.print_char(b' ');
        p.print_char(0x08);
        p.sleep_ms(120);
    }
    p.print_str("fixed\n");
    p.sleep_ms(600);
}

fn drawing(p: &mut Program) {
    p.clear_pixels();
    p.draw_rect(4, 4, 315, 195);
    for step in 0..8 {
        p.draw_line(160, 100, step * 45, 10);
        p.draw_line(160, 100, step * 45, 190);
        p.sleep_ms(80);
    }
    for r in [15, 30, 45, 60] {
        p.draw_circle(160, 100, r);
        p.sleep_ms(120);
    }
    p.fill_rect(10, 10, 40, 40);
    p.fill_rect(280, 160, 310, 190);
    p.sleep_ms(1000);
}

fn sparkles(p: &mut Program, rng: &mut impl Rng) {
    for _ in 0..80 {
        let x = rng.gen_range(8..312);
        let y = rng.gen_range(8..192);
        p.set_pixel(x, y, true);
    }
    p.sleep_ms(1200);
    p.clear_pixels();
}

fn countdown(p: &mut Program) {
    p.clear_screen();
    p.set_color(12);
    p.print_str("Counting down...\n");
    p.load_reg(0, 5);
    p.load_reg(1, 1);
    p.load_reg(2, 0);
    let top = p.here();
    p.print_char(b'*');
    p.beep(880, 80);
    p.sleep_ms(250);
    p.sub(0, 0, 1);
    p.cmp(0, 2);
    p.jnz(top);
    p.set_color(10);
    p.print_str("\nLiftoff!\n");
    p.beep(1320, 300);
}

fn fanfare(p: &mut Program) {
    // the subroutine sits before its callers, so jump over it first
    let skip = p.jump_fixup(Opcode::Jmp);
    let chime = p.here();
    p.beep(660, 90);
    p.print_str("* ");
    p.ret();
    let entry = p.here();
    p.patch_word(skip, entry);
    p.print_str("\nFanfare: ");
    p.call(chime);
    p.call(chime);
    p.call(chime);
    p.print_str("\n");
}

fn time_display(p: &mut Program) {
    // one '#' per low bit of the wall clock, so the bar changes run to run
    p.print_str("Seconds ticker: ");
    p.get_time(0);
    p.load_reg(1, 0x000F);
    p.and(0, 0, 1);
    p.load_reg(1, 1);
    p.load_reg(2, 0);
    p.cmp(0, 2);
    let done = p.jump_fixup(Opcode::Jz);
    let top = p.here();
    p.print_char(b'#');
    p.sub(0, 0, 1);
    p.cmp(0, 2);
    p.jnz(top);
    let end = p.here();
    p.patch_word(done, end);
    p.print_str("\n");
    p.sleep_ms(700);
}

fn coin_flip(p: &mut Program) {
    p.random(0, 1);
    p.load_reg(1, 0);
    p.cmp(0, 1);
    let to_heads = p.jump_fixup(Opcode::Jz);
    p.print_str("The coin says: tails\n");
    let to_end = p.jump_fixup(Opcode::Jmp);
    let heads = p.here();
    p.patch_word(to_heads, heads);
    p.print_str("The coin says: heads\n");
    let end = p.here();
    p.patch_word(to_end, end);
    p.sleep_ms(700);
}

fn epilogue(p: &mut Program) {
    p.print_str("\nPress any key to finish...");
    p.read_char(0);
    p.clear_screen();
    p.set_color(10);
    p.print_str("Goodbye!\n");
    p.halt();
}

fn build_demo(rng: &mut impl Rng) -> Vec<u8> {
    let mut p = Program::new();
    banner(&mut p);
    typewriter(&mut p, "Welcome to the MicroComputer demo.\n");
    color_bars(&mut p);
    tabs_and_backspace(&mut p);
    drawing(&mut p);
    sparkles(&mut p, rng);
    countdown(&mut p);
    fanfare(&mut p);
    time_display(&mut p);
    coin_flip(&mut p);
    epilogue(&mut p);
    p.data
}

fn main() {
    let dir_arg = arg!([dir] "The file store directory to write demo.bin into")
        .value_parser(value_parser!(PathBuf));
    let matches = command!().arg(dir_arg).get_matches();
    let root = matches
        .get_one::<PathBuf>("dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("fs"));

    let demo = build_demo(&mut rand::thread_rng());

    if let Err(e) = fs::create_dir_all(&root) {
        eprintln!("Could not create {}: {}", root.display(), e);
        exit(1);
    }
    let path = root.join("demo.bin");
    if let Err(e) = fs::write(&path, &demo) {
        eprintln!("Could not write {}: {}", path.display(), e);
        exit(1);
    }
    println!("Wrote {} ({} bytes)", path.display(), demo.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use microemu::devices::HeadlessSurface;
    use microemu::emulator::Machine;

    #[test]
    fn demo_runs_to_completion() {
        let demo = build_demo(&mut rand::thread_rng());
        let mut dev = HeadlessSurface::new();
        dev.type_keys([b' ']);
        let mut machine = Machine::new();
        machine.load(&demo).unwrap();
        assert!(machine.run_steps(&mut dev, 1_000_000));
        assert!(!machine.is_running());
        // it ends on the goodbye screen, not in pixel mode and not faulted
        assert!(!dev.screen.pixel_mode());
        assert_eq!(dev.screen.row_text(0), "Goodbye!");
        assert!(dev.beeps().len() >= 8);
    }

    #[test]
    fn patched_jumps_land_on_opcodes() {
        let demo = build_demo(&mut rand::thread_rng());
        // a broken fixup shows up as an unknown-opcode fault on screen
        let mut dev = HeadlessSurface::new();
        dev.type_keys([b'\n']);
        let mut machine = Machine::new();
        machine.load(&demo).unwrap();
        machine.run_steps(&mut dev, 1_000_000);
        for row in 0..25 {
            assert!(!dev.screen.row_text(row).contains("Error:"));
        }
    }
}
