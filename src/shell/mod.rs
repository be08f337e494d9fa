use std::time::Instant;

use crate::definitions::{MEM_SIZE, STACK_SIZE};
use crate::devices::{Console, DeviceSurface};
use crate::emulator::Machine;
use crate::storage::FileStore;

const MAX_HISTORY: usize = 50;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

// day 0 of the epoch was a Thursday
const WEEKDAYS: [&str; 7] = [
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
];

/// Days since the epoch to (year, month, day), after Howard Hinnant's civil
/// date algorithm.
fn days_to_date(days: u64) -> (u32, u32, u32) {
    let z = days as i64 + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as u32, m, d)
}

fn format_long_date(secs: u64) -> String {
    let days = secs / 86400;
    let (year, month, day) = days_to_date(days);
    format!(
        "{}, {} {:02}, {} {:02}:{:02}:{:02}",
        WEEKDAYS[(days % 7) as usize],
        MONTHS[(month - 1) as usize],
        day,
        year,
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

fn format_short_date(secs: u64) -> String {
    let days = secs / 86400;
    let (year, month, day) = days_to_date(days);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}",
        year,
        month,
        day,
        (secs / 3600) % 24,
        (secs / 60) % 60
    )
}

fn system_time_secs(t: std::time::SystemTime) -> u64 {
    t.duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The command interpreter that owns the file store. It talks to the user
/// exclusively through the device surface, so everything it prints lands on
/// the emulated screen, and `run` hands the same surface to the machine.
pub struct Shell {
    store: FileStore,
    history: Vec<String>,
    boot: Instant,
    last_pc: usize,
    last_sp: u16,
}

impl Shell {
    pub fn new(store: FileStore) -> Self {
        Self {
            store,
            history: Vec::new(),
            boot: Instant::now(),
            last_pc: 0,
            last_sp: (STACK_SIZE - 1) as u16,
        }
    }

    /// The interactive loop; returns when the user exits or the back end
    /// shuts down.
    pub fn run(&mut self, con: &mut Console) {
        con.print("MicroOS v1.0\n");
        con.print("Type 'help' for available commands.\n\n");

        loop {
            con.print("$ ");
            let line = match con.read_line() {
                Some(line) => line,
                None => break,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.add_to_history(line);
            if !self.dispatch(line, con) {
                break;
            }
        }
    }

    fn add_to_history(&mut self, line: &str) {
        if self.history.len() == MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(line.to_string());
    }

    /// Execute one command line; false means exit.
    pub fn dispatch(&mut self, line: &str, con: &mut dyn DeviceSurface) -> bool {
        let mut parts = line.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim_start();

        match cmd {
            "exit" => {
                con.print("Goodbye!\n");
                con.sleep_ms(500);
                return false;
            }
            "help" => self.cmd_help(con),
            "clear" => con.clear_text(),
            "ls" => self.cmd_ls(con),
            "cat" => match one_arg(rest) {
                Some(name) => self.cmd_cat(name, con),
                None => con.print("Usage: cat <filename>\n"),
            },
            "rm" => match one_arg(rest) {
                Some(name) => self.cmd_rm(name, con),
                None => con.print("Usage: rm <filename>\n"),
            },
            "cp" => match two_args(rest) {
                Some((src, dst)) => self.cmd_cp(&src, &dst, con),
                None => con.print("Usage: cp <source> <destination>\n"),
            },
            "mv" => match two_args(rest) {
                Some((src, dst)) => {
                    self.cmd_cp(&src, &dst, con);
                    self.cmd_rm(&src, con);
                }
                None => con.print("Usage: mv <source> <destination>\n"),
            },
            "echo" => {
                if !rest.is_empty() {
                    con.print(rest);
                }
                con.put_char(b'\n');
            }
            "date" => {
                let line = format_long_date(con.now_seconds() as u64);
                con.print(&line);
                con.put_char(b'\n');
            }
            "uptime" => self.cmd_uptime(con),
            "meminfo" => self.cmd_meminfo(con),
            "hexdump" => match one_arg(rest) {
                Some(name) => self.cmd_hexdump(name, con),
                None => con.print("Usage: hexdump <filename>\n"),
            },
            "history" => self.cmd_history(con),
            "run" => match one_arg(rest) {
                Some(name) => self.cmd_run(name, con),
                None => con.print("Usage: run <filename>\n"),
            },
            other => {
                con.print("Unknown command: ");
                con.print(other);
                con.print("\n");
            }
        }
        true
    }

    fn cmd_help(&self, con: &mut dyn DeviceSurface) {
        con.print("\nAvailable commands:\n");
        con.print("  help           - Display this help message\n");
        con.print("  clear          - Clear the screen\n");
        con.print("  ls             - List files in current directory\n");
        con.print("  cat <file>     - Display file contents\n");
        con.print("  rm <file>      - Delete a file\n");
        con.print("  cp <src> <dst> - Copy a file\n");
        con.print("  mv <src> <dst> - Move/rename a file\n");
        con.print("  echo <text>    - Print text to screen\n");
        con.print("  date           - Show current date and time\n");
        con.print("  uptime         - Show system uptime\n");
        con.print("  meminfo        - Display memory information\n");
        con.print("  run <file>     - Execute a binary program\n");
        con.print("  hexdump <file> - Display hexadecimal dump of file\n");
        con.print("  history        - Show command history\n");
        con.print("  exit           - Exit the system\n");
        con.print("\n");
    }

    fn cmd_ls(&self, con: &mut dyn DeviceSurface) {
        if self.store.is_empty() {
            con.print("No files found.\n");
            return;
        }
        con.print("\n");
        for file in self.store.files() {
            let when = format_short_date(system_time_secs(file.modified));
            con.print(&format!(
                "{:<20} {:>8} bytes  {}\n",
                file.name,
                file.size(),
                when
            ));
        }
        con.print("\n");
    }

    fn cmd_cat(&self, name: &str, con: &mut dyn DeviceSurface) {
        let file = match self.store.find(name) {
            Some(file) => file,
            None => {
                con.print("Error: File not found\n");
                return;
            }
        };
        con.print("\n");
        for &b in &file.data {
            match b {
                0x20..=0x7E | b'\n' | b'\r' | b'\t' => con.put_char(b),
                _ => con.put_char(b'.'),
            }
        }
        con.print("\n\n");
    }

    fn cmd_rm(&mut self, name: &str, con: &mut dyn DeviceSurface) {
        if self.store.find(name).is_none() {
            con.print("Error: File not found\n");
            return;
        }
        if self.store.delete(name).is_ok() {
            con.print("File deleted.\n");
        } else {
            con.print("Error: Could not delete file\n");
        }
    }

    fn cmd_cp(&mut self, src: &str, dst: &str, con: &mut dyn DeviceSurface) {
        let data = match self.store.find(src) {
            Some(file) => file.data.clone(),
            None => {
                con.print("Error: Source file not found\n");
                return;
            }
        };
        if self.store.write(dst, &data).is_ok() {
            con.print("File copied.\n");
        } else {
            con.print("Error: Could not copy file\n");
        }
    }

    fn cmd_uptime(&self, con: &mut dyn DeviceSurface) {
        let uptime = self.boot.elapsed().as_secs();
        con.print(&format!(
            "Uptime: {} hours, {} minutes, {} seconds\n",
            uptime / 3600,
            (uptime % 3600) / 60,
            uptime % 60
        ));
    }

    fn cmd_meminfo(&self, con: &mut dyn DeviceSurface) {
        con.print("\nMemory Information:\n");
        con.print(&format!("  Total Memory: {} KB\n", MEM_SIZE / 1024));
        con.print(&format!("  Stack Size: {} bytes\n", STACK_SIZE));
        con.print(&format!("  Program Counter: 0x{:04X}\n", self.last_pc));
        con.print(&format!("  Stack Pointer: 0x{:04X}\n", self.last_sp));
        con.print("\n");
    }

    fn cmd_hexdump(&self, name: &str, con: &mut dyn DeviceSurface) {
        let file = match self.store.find(name) {
            Some(file) => file,
            None => {
                con.print("Error: File not found\n");
                return;
            }
        };
        con.print("\n");
        for (row_start, row) in file.data.chunks(16).enumerate().map(|(i, c)| (i * 16, c)) {
            con.print(&format!("{:04x}: ", row_start));
            for b in row {
                con.print(&format!("{:02x} ", b));
            }
            con.print(" | ");
            for &b in row {
                match b {
                    0x20..=0x7E => con.put_char(b),
                    _ => con.put_char(b'.'),
                }
            }
            con.put_char(b'\n');
        }
        con.print("\n");
    }

    fn cmd_history(&self, con: &mut dyn DeviceSurface) {
        con.print("\nCommand History:\n");
        for (i, line) in self.history.iter().enumerate() {
            con.print(&format!("  {}: {}\n", i + 1, line));
        }
        con.print("\n");
    }

    fn cmd_run(&mut self, name: &str, con: &mut dyn DeviceSurface) {
        let program = match self.store.find(name) {
            Some(file) => file.data.clone(),
            None => {
                con.print("Error: Could not load program\n");
                return;
            }
        };
        let mut machine = Machine::new();
        match machine.load(&program) {
            Ok(()) => {
                con.print("Running program...\n");
                machine.run(con);
                self.last_pc = machine.pc();
                self.last_sp = machine.sp();
                con.print("Program terminated.\n");
            }
            Err(e) => {
                con.print(&format!("Error: {}\n", e));
                con.print("Error: Could not load program\n");
            }
        }
    }
}

fn one_arg(rest: &str) -> Option<&str> {
    let mut words = rest.split_whitespace();
    words.next()
}

fn two_args(rest: &str) -> Option<(String, String)> {
    let mut words = rest.split_whitespace();
    let a = words.next()?.to_string();
    let b = words.next()?.to_string();
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::HeadlessSurface;

    fn fresh_shell(tag: &str) -> Shell {
        let root = std::env::temp_dir().join(format!("microemu_shell_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        Shell::new(FileStore::open(root).expect("create store"))
    }

    #[test]
    fn civil_dates() {
        assert_eq!(days_to_date(0), (1970, 1, 1));
        assert_eq!(days_to_date(19723), (2024, 1, 1));
        // leap day
        assert_eq!(days_to_date(19782), (2024, 2, 29));
    }

    #[test]
    fn long_date_format() {
        // 1970-01-01 was a Thursday
        assert_eq!(format_long_date(0), "Thursday, January 01, 1970 00:00:00");
        assert_eq!(
            format_long_date(86400 + 3661),
            "Friday, January 02, 1970 01:01:01"
        );
    }

    #[test]
    fn unknown_command_is_reported() {
        let mut shell = fresh_shell("unknown");
        let mut dev = HeadlessSurface::new();
        assert!(shell.dispatch("frobnicate", &mut dev));
        assert_eq!(dev.screen.row_text(0), "Unknown command: frobnicate");
    }

    #[test]
    fn echo_prints_the_remainder() {
        let mut shell = fresh_shell("echo");
        let mut dev = HeadlessSurface::new();
        shell.dispatch("echo hello world", &mut dev);
        assert_eq!(dev.screen.row_text(0), "hello world");
    }

    #[test]
    fn ls_on_an_empty_store() {
        let mut shell = fresh_shell("ls_empty");
        let mut dev = HeadlessSurface::new();
        shell.dispatch("ls", &mut dev);
        assert_eq!(dev.screen.row_text(0), "No files found.");
    }

    #[test]
    fn run_executes_a_program_from_the_store() {
        let mut shell = fresh_shell("run");
        shell
            .store
            .write("hello.bin", &[0x02, b'H', b'e', b'l', b'l', b'o', 0x00, 0x00])
            .unwrap();
        let mut dev = HeadlessSurface::new();
        shell.dispatch("run hello.bin", &mut dev);
        assert_eq!(dev.screen.row_text(0), "Running program...");
        // the program leaves the cursor right after its output, so the
        // shell's closing message continues on the same row
        assert_eq!(dev.screen.row_text(1), "HelloProgram terminated.");
    }

    #[test]
    fn run_with_a_missing_file() {
        let mut shell = fresh_shell("run_missing");
        let mut dev = HeadlessSurface::new();
        shell.dispatch("run nope.bin", &mut dev);
        assert_eq!(dev.screen.row_text(0), "Error: Could not load program");
    }

    #[test]
    fn cat_requires_an_argument() {
        let mut shell = fresh_shell("cat_usage");
        let mut dev = HeadlessSurface::new();
        shell.dispatch("cat", &mut dev);
        assert_eq!(dev.screen.row_text(0), "Usage: cat <filename>");
    }

    #[test]
    fn hexdump_formats_offsets_and_ascii() {
        let mut shell = fresh_shell("hexdump");
        shell.store.write("x.bin", &[0x02, b'H', b'i', 0x00]).unwrap();
        let mut dev = HeadlessSurface::new();
        shell.dispatch("hexdump x.bin", &mut dev);
        assert_eq!(dev.screen.row_text(1), "0000: 02 48 69 00  | .Hi.");
    }

    #[test]
    fn history_is_capped() {
        let mut shell = fresh_shell("history");
        for i in 0..60 {
            shell.add_to_history(&format!("cmd{}", i));
        }
        assert_eq!(shell.history.len(), MAX_HISTORY);
        assert_eq!(shell.history[0], "cmd10");
        assert_eq!(shell.history[MAX_HISTORY - 1], "cmd59");
    }

    #[test]
    fn mv_copies_then_deletes() {
        let mut shell = fresh_shell("mv");
        shell.store.write("a.bin", b"data").unwrap();
        let mut dev = HeadlessSurface::new();
        shell.dispatch("mv a.bin b.bin", &mut dev);
        assert!(shell.store.find("a.bin").is_none());
        assert_eq!(shell.store.find("b.bin").unwrap().data, b"data");
        assert_eq!(dev.screen.row_text(0), "File copied.");
        assert_eq!(dev.screen.row_text(1), "File deleted.");
    }
}
