use proptest::prelude::*;

use microemu::definitions::{MEM_SIZE, TEXT_HEIGHT, TEXT_WIDTH};
use microemu::devices::{HeadlessSurface, Screen};
use microemu::emulator::Machine;

fn run_bounded(program: &[u8]) -> (Machine, HeadlessSurface) {
    let mut dev = HeadlessSurface::new();
    let mut machine = Machine::new();
    machine.load(program).expect("program fits in RAM");
    machine.run_steps(&mut dev, 100_000);
    (machine, dev)
}

/// True when the given conditional jump is taken after `CMP a, b`.
fn jump_taken(jcc: u8, a: u16, b: u16) -> bool {
    let mut program = vec![0x40, 0x00];
    program.extend(a.to_le_bytes());
    program.extend([0x40, 0x01]);
    program.extend(b.to_le_bytes());
    program.extend([0x5B, 0x00, 0x01]); // CMP r0, r1
    program.extend([jcc, 0x11, 0x00]); // Jcc 0x0011
    program.extend([0x01, b'F', 0x00]); // PRINT_CHAR 'F'; HALT
    program.extend([0x01, b'T', 0x00]); // 0x0011: PRINT_CHAR 'T'; HALT
    let (_machine, dev) = run_bounded(&program);
    dev.screen.row_text(0) == "T"
}

proptest! {
    #[test]
    fn arbitrary_programs_never_escape_ram(
        program in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let mut dev = HeadlessSurface::new();
        dev.type_keys([b'k']);
        let mut machine = Machine::new();
        machine.load(&program).unwrap();
        machine.run_steps(&mut dev, 20_000);
        prop_assert!(machine.pc() <= MEM_SIZE);
    }

    #[test]
    fn a_leading_halt_stops_immediately(
        tail in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut program = vec![0x00];
        program.extend(tail);
        let (machine, _dev) = run_bounded(&program);
        prop_assert!(!machine.is_running());
        prop_assert_eq!(machine.pc(), 1);
    }

    #[test]
    fn immediates_round_trip_little_endian(v in any::<u16>()) {
        let mut program = vec![0x40, 0x00];
        program.extend(v.to_le_bytes()); // LOAD_REG r0, v
        program.extend([0x41, 0x00, 0x00, 0x40]); // STORE_REG r0, 0x4000
        program.extend([0x80, 0x01, 0x00, 0x40]); // LOAD_MEM r1, 0x4000
        program.push(0x00);
        let (machine, _dev) = run_bounded(&program);
        prop_assert_eq!(machine.regs()[0], v);
        prop_assert_eq!(machine.regs()[1], v);
        prop_assert_eq!(machine.read_u8(0x4000), (v & 0xFF) as u8);
        prop_assert_eq!(machine.read_u8(0x4001), (v >> 8) as u8);
    }

    #[test]
    fn arithmetic_matches_the_wrapping_model(
        a in any::<u16>(),
        b in any::<u16>(),
        op in 0u8..8,
    ) {
        let expected = match op {
            0 => a.wrapping_add(b),
            1 => a.wrapping_sub(b),
            2 => a.wrapping_mul(b),
            // division by zero leaves r2 at its zeroed initial value
            3 => if b == 0 { 0 } else { a / b },
            4 => if b == 0 { 0 } else { a % b },
            5 => a & b,
            6 => a | b,
            7 => a ^ b,
            _ => unreachable!(),
        };
        let mut program = vec![0x40, 0x00];
        program.extend(a.to_le_bytes());
        program.extend([0x40, 0x01]);
        program.extend(b.to_le_bytes());
        program.extend([0x50 + op, 0x02, 0x00, 0x01]);
        program.push(0x00);
        let (machine, _dev) = run_bounded(&program);
        prop_assert_eq!(machine.regs()[2], expected);
    }

    #[test]
    fn cmp_and_conditional_jumps_agree(a in any::<u16>(), b in any::<u16>()) {
        prop_assert_eq!(jump_taken(0x61, a, b), a == b); // JZ
        prop_assert_eq!(jump_taken(0x62, a, b), a != b); // JNZ
        prop_assert_eq!(jump_taken(0x63, a, b), a > b); // JG, unsigned
        prop_assert_eq!(jump_taken(0x64, a, b), a < b); // JL, unsigned
    }

    #[test]
    fn cursor_stays_inside_the_plane(
        bytes in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let mut screen = Screen::new();
        for &b in &bytes {
            screen.put_char(b);
            let (x, y) = screen.cursor();
            prop_assert!((x as usize) <= TEXT_WIDTH);
            prop_assert!((y as usize) <= TEXT_HEIGHT);
            if !matches!(b, b'\n' | b'\r' | 0x08 | b'\t') {
                // a printable byte always lands inside the plane
                prop_assert!((y as usize) < TEXT_HEIGHT);
            }
        }
    }

    #[test]
    fn scroll_keeps_the_most_recent_rows(lines in 26usize..60) {
        let mut program = Vec::new();
        for i in 0..lines {
            let c = b'A' + (i % 26) as u8;
            program.extend([0x02, c, b'\n', 0x00]);
        }
        program.push(0x00);
        let (_machine, dev) = run_bounded(&program);
        // the bottom row shows the last line written, the top row shows the
        // line from 24 before it; everything older has scrolled away
        let last = b'A' + ((lines - 1) % 26) as u8;
        let first_visible = b'A' + ((lines - 25) % 26) as u8;
        prop_assert_eq!(dev.screen.row_text(24), (last as char).to_string());
        prop_assert_eq!(dev.screen.row_text(0), (first_visible as char).to_string());
    }

    #[test]
    fn call_ret_restores_the_stack_pointer(depth in 0usize..20) {
        let mut program = vec![0x40, 0x00, 0x34, 0x12]; // LOAD_REG r0, 0x1234
        for _ in 0..depth {
            program.extend([0x42, 0x00]); // PUSH r0
        }
        let call_at = program.len();
        program.extend([0x65, 0x00, 0x00]); // CALL (target patched below)
        for _ in 0..depth {
            program.extend([0x43, 0x01]); // POP r1
        }
        program.push(0x00); // HALT
        let sub = program.len() as u16;
        program.push(0x66); // RET
        program[call_at + 1..call_at + 3].copy_from_slice(&sub.to_le_bytes());

        let (machine, _dev) = run_bounded(&program);
        prop_assert!(!machine.is_running());
        prop_assert_eq!(machine.sp(), 255);
        if depth > 0 {
            prop_assert_eq!(machine.regs()[1], 0x1234);
        }
        // execution resumed after the call and reached the final HALT
        prop_assert_eq!(machine.pc(), sub as usize);
    }
}
