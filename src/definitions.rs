// Machine geometry shared by the emulator core, the device surfaces and the
// front ends.
pub const MEM_SIZE: usize = 64 * 1024;
pub const STACK_SIZE: usize = 256;
// the stack occupies the top of RAM; sp indexes into this window
pub const STACK_BASE: usize = MEM_SIZE - STACK_SIZE;
pub const NUM_REGS: usize = 8;

pub const TEXT_WIDTH: usize = 80;
pub const TEXT_HEIGHT: usize = 25;
pub const PIXEL_WIDTH: usize = 320;
pub const PIXEL_HEIGHT: usize = 200;
pub const PALETTE_SIZE: usize = 16;

// an address in the emulated RAM
pub type Addr = u16;
// a register value
pub type Word = u16;

pub const NEWLINE_KEY: u8 = b'\n';
pub const BACKSPACE_KEY: u8 = 0x08;

// flag bits written by CMP
pub const FLAG_ZERO: u8 = 1 << 0;
pub const FLAG_GREATER: u8 = 1 << 1;
pub const FLAG_LESS: u8 = 1 << 2;
