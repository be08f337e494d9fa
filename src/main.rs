use std::path::PathBuf;
use std::process::exit;

use clap::{arg, command, value_parser};

use microemu::storage::FileStore;

fn main() {
    let dir_arg = arg!([dir] "The directory that backs the file store")
        .value_parser(value_parser!(PathBuf));
    let run_arg = arg!(-r --run <FILE> "Run a single program and exit when it halts");

    let matches = command!().arg(dir_arg).arg(run_arg).get_matches();

    let root = matches
        .get_one::<PathBuf>("dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("fs"));
    let autorun = matches.get_one::<String>("run").cloned();

    println!("MicroComputer Emulator");
    println!("======================");
    println!("Filesystem: {}", root.display());
    println!("Loading files...");
    let store = match FileStore::open(&root) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Could not open file store at {}: {}", root.display(), e);
            exit(1);
        }
    };
    println!("Loaded {} files.", store.files().len());
    println!();
    println!("Starting display...");
    println!("All interaction in the display window!");
    println!();

    run_machine(store, autorun);
}

#[cfg(feature = "desktop")]
fn run_machine(store: FileStore, autorun: Option<String>) {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use microemu::devices::{Console, Screen};
    use microemu::keyboard::InputState;

    let screen = Arc::new(Mutex::new(Screen::new()));
    let input = Arc::new(InputState::new());
    let shutdown = Arc::new(AtomicBool::new(false));
    let (beep_tx, beep_rx) = mpsc::channel();

    let worker = thread::spawn({
        let screen = Arc::clone(&screen);
        let input = Arc::clone(&input);
        let shutdown = Arc::clone(&shutdown);
        move || {
            use microemu::devices::DeviceSurface;
            use microemu::emulator::Machine;
            use microemu::shell::Shell;

            let mut console =
                Console::new(screen, input, Arc::clone(&shutdown), Some(beep_tx));
            match autorun {
                Some(name) => {
                    let program = store.find(&name).map(|f| f.data.clone());
                    match program {
                        Some(program) => {
                            let mut machine = Machine::new();
                            match machine.load(&program) {
                                Ok(()) => {
                                    machine.run(&mut console);
                                    console.print("\nProgram terminated.\n");
                                    // leave the final screen up for a beat
                                    console.sleep_ms(1500);
                                }
                                Err(e) => console.print(&format!("Error: {}\n", e)),
                            }
                        }
                        None => console.print("Error: Could not load program\n"),
                    }
                }
                None => Shell::new(store).run(&mut console),
            }
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    run_desktop(&screen, &input, &shutdown, beep_rx);

    shutdown.store(true, Ordering::Relaxed);
    // a program spinning without a suspension point never observes the
    // flag; give the machine thread a moment, then let process exit reap it
    for _ in 0..50 {
        if worker.is_finished() {
            let _ = worker.join();
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(feature = "desktop")]
struct SquareWave {
    sample_rate: f32,
    phase_inc: f32,
    phase: f32,
    volume: f32,
}

#[cfg(feature = "desktop")]
impl sdl2::audio::AudioCallback for SquareWave {
    type Channel = f32;

    fn callback(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = if self.phase <= 0.5 {
                self.volume
            } else {
                -self.volume
            };
            self.phase = (self.phase + self.phase_inc) % 1.0;
        }
    }
}

#[cfg(feature = "desktop")]
fn run_desktop(
    screen: &std::sync::Arc<std::sync::Mutex<microemu::devices::Screen>>,
    input: &std::sync::Arc<microemu::keyboard::InputState>,
    shutdown: &std::sync::Arc<std::sync::atomic::AtomicBool>,
    beep_rx: std::sync::mpsc::Receiver<microemu::devices::console::Beep>,
) {
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    use sdl2::audio::AudioSpecDesired;
    use sdl2::event::Event;
    use sdl2::pixels::{Color, PixelFormatEnum};

    use microemu::definitions::{TEXT_HEIGHT, TEXT_WIDTH};
    use microemu::keyboard::{special_key_code, Echo};

    const WIN_WIDTH: u32 = (TEXT_WIDTH * 8) as u32; // 640
    const WIN_HEIGHT: u32 = (TEXT_HEIGHT * 16) as u32; // 400

    let sdl_context = sdl2::init().unwrap();
    let video_subsystem = sdl_context.video().unwrap();

    let window = video_subsystem
        .window("MicroComputer", WIN_WIDTH, WIN_HEIGHT)
        .position_centered()
        .resizable()
        .build()
        .unwrap();

    let mut canvas = window.into_canvas().build().unwrap();
    canvas.set_integer_scale(true).unwrap();
    canvas.set_logical_size(WIN_WIDTH, WIN_HEIGHT).unwrap();
    canvas.set_draw_color(Color::RGB(0, 0, 0));

    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator
        .create_texture_streaming(PixelFormatEnum::RGB24, WIN_WIDTH, WIN_HEIGHT)
        .unwrap();

    // beeps are best effort: no audio device just means silence
    let mut audio_device = sdl_context.audio().ok().and_then(|audio| {
        let desired = AudioSpecDesired {
            freq: Some(44_100),
            channels: Some(1),
            samples: None,
        };
        audio
            .open_playback(None, &desired, |spec| SquareWave {
                sample_rate: spec.freq as f32,
                phase_inc: 0.0,
                phase: 0.0,
                volume: 0.15,
            })
            .ok()
    });
    let mut beep_until: Option<Instant> = None;

    video_subsystem.text_input().start();

    let post = |c: u8| {
        let echo = input.post_key(c);
        let mut screen = screen.lock().unwrap_or_else(|e| e.into_inner());
        match echo {
            Echo::Char(c) => screen.put_char(c),
            Echo::Backspace => screen.erase_backspace(),
            Echo::None => {}
        }
    };

    let mut event_pump = sdl_context.event_pump().unwrap();
    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'running,
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(code) = special_key_code(&keycode.to_string()) {
                        post(code);
                    }
                }
                Event::TextInput { text, .. } => {
                    for b in text.bytes().filter(|b| (0x20..=0x7E).contains(b)) {
                        post(b);
                    }
                }
                _ => {}
            }
        }

        if shutdown.load(Ordering::Relaxed) {
            break 'running;
        }

        while let Ok(beep) = beep_rx.try_recv() {
            if let Some(device) = &mut audio_device {
                {
                    let mut wave = device.lock();
                    wave.phase_inc = beep.freq as f32 / wave.sample_rate;
                    wave.phase = 0.0;
                }
                device.resume();
                beep_until = Some(Instant::now() + Duration::from_millis(beep.duration_ms as u64));
            }
        }
        if let (Some(until), Some(device)) = (beep_until, &audio_device) {
            if Instant::now() >= until {
                device.pause();
                beep_until = None;
            }
        }

        {
            let mut screen = screen.lock().unwrap_or_else(|e| e.into_inner());
            if screen.take_dirty() {
                texture
                    .with_lock(None, |buffer: &mut [u8], pitch: usize| {
                        render_screen(&screen, buffer, pitch);
                    })
                    .unwrap();
            }
        }

        canvas.clear();
        canvas.copy(&texture, None, None).unwrap();
        canvas.present();

        std::thread::sleep(Duration::from_millis(16));
    }
}

/// The fixed palette the 4-bit color indices select; classic CGA values.
#[cfg(feature = "desktop")]
const PALETTE: [(u8, u8, u8); 16] = [
    (0x00, 0x00, 0x00),
    (0x00, 0x00, 0xAA),
    (0x00, 0xAA, 0x00),
    (0x00, 0xAA, 0xAA),
    (0xAA, 0x00, 0x00),
    (0xAA, 0x00, 0xAA),
    (0xAA, 0x55, 0x00),
    (0xAA, 0xAA, 0xAA),
    (0x55, 0x55, 0x55),
    (0x55, 0x55, 0xFF),
    (0x55, 0xFF, 0x55),
    (0x55, 0xFF, 0xFF),
    (0xFF, 0x55, 0x55),
    (0xFF, 0x55, 0xFF),
    (0xFF, 0xFF, 0x55),
    (0xFF, 0xFF, 0xFF),
];

/// Paint either the doubled 320x200 pixel plane or the 80x25 text plane
/// with 8x16 cells into an RGB24 buffer.
#[cfg(feature = "desktop")]
fn render_screen(screen: &microemu::devices::Screen, buffer: &mut [u8], pitch: usize) {
    use microemu::definitions::{PIXEL_HEIGHT, PIXEL_WIDTH, TEXT_HEIGHT, TEXT_WIDTH};
    use microemu::font;

    if screen.pixel_mode() {
        for y in 0..PIXEL_HEIGHT {
            for x in 0..PIXEL_WIDTH {
                let lum = if screen.pixel(x, y) { 0xFF } else { 0x00 };
                for dy in 0..2 {
                    for dx in 0..2 {
                        let i = (y * 2 + dy) * pitch + (x * 2 + dx) * 3;
                        buffer[i] = lum;
                        buffer[i + 1] = lum;
                        buffer[i + 2] = lum;
                    }
                }
            }
        }
        return;
    }

    let (cursor_x, cursor_y) = screen.cursor();
    for row in 0..TEXT_HEIGHT {
        for col in 0..TEXT_WIDTH {
            let mut c = screen.char_at(col, row);
            if screen.cursor_visible() && col as u16 == cursor_x && row as u16 == cursor_y {
                c = b'_';
            }
            let (r, g, b) = PALETTE[(screen.color_at(col, row) & 0x0F) as usize];
            let glyph = font::glyph(c);
            for (gy, bits) in glyph.iter().enumerate() {
                for gx in 0..font::GLYPH_WIDTH {
                    let ink = bits & (1 << gx) != 0;
                    let (pr, pg, pb) = if ink { (r, g, b) } else { (0, 0, 0) };
                    for dy in 0..2 {
                        let py = row * 16 + gy * 2 + dy;
                        let px = col * 8 + gx;
                        let i = py * pitch + px * 3;
                        buffer[i] = pr;
                        buffer[i + 1] = pg;
                        buffer[i + 2] = pb;
                    }
                }
            }
        }
    }
}

#[cfg(not(feature = "desktop"))]
fn run_machine(_store: FileStore, _autorun: Option<String>) {
    println!("You are running in headless mode!");
    println!("If you want to see the machine's display,");
    println!("you will need to compile the application with the desktop feature enabled");
}
