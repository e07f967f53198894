use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use emu::cpu::hardware::interrupt_control::Interrupt;
use emu::gba::{BootMode, Gba, ScanlineEvent};

const CYCLES_PER_LINE: u32 = 1_232;
const VISIBLE_LINES: u32 = 160;
const DIAGNOSTICS_TAIL: usize = 16;

#[derive(Parser, Debug)]
#[command(version, about = "Runs a GBA cartridge on the headless core")]
struct Args {
    /// Cartridge image.
    rom: PathBuf,

    /// BIOS image, required unless --skip-bios is given.
    #[arg(long, value_name = "PATH")]
    bios: Option<PathBuf>,

    /// Start in the post-BIOS state at the cartridge entry point.
    #[arg(long, default_value_t = false)]
    skip_bios: bool,

    #[arg(long, default_value_t = 1_000_000)]
    steps: u64,

    /// Filter directive, e.g. `info` or `emu=trace`. Defaults to `RUST_LOG`,
    /// then `info`.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Write logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Frame length in cycles.
    #[arg(long, default_value_t = 280_896)]
    vblank_every: u32,
}

#[derive(Debug, Error)]
enum RunnerError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no BIOS image given; pass --bios <path> or --skip-bios")]
    MissingBios,
    #[error("invalid log filter: {0}")]
    LogFilter(String),
}

fn read_image(path: &Path) -> Result<Vec<u8>, RunnerError> {
    fs::read(path).map_err(|source| RunnerError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>, RunnerError> {
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info")),
    }
    .map_err(|err| RunnerError::LogFilter(err.to_string()))?;

    let Some(path) = &args.log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map_or_else(|| "emu.log".into(), |name| name.to_os_string());
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Fixed display timing standing in for the compositor.
struct ScanSchedule {
    lines_per_frame: u32,
    elapsed: u32,
    line: u32,
}

impl ScanSchedule {
    fn new(frame_cycles: u32) -> Self {
        Self {
            lines_per_frame: (frame_cycles / CYCLES_PER_LINE).max(VISIBLE_LINES + 1),
            elapsed: 0,
            line: 0,
        }
    }

    fn advance(&mut self, cycles: u32, mut on_event: impl FnMut(ScanlineEvent)) {
        self.elapsed += cycles;
        while self.elapsed >= CYCLES_PER_LINE {
            self.elapsed -= CYCLES_PER_LINE;
            if self.line < VISIBLE_LINES {
                on_event(ScanlineEvent::HBlank);
            }
            self.line += 1;
            if self.line == VISIBLE_LINES {
                on_event(ScanlineEvent::VBlank);
            }
            if self.line >= self.lines_per_frame {
                self.line = 0;
            }
        }
    }
}

fn scanline_event(gba: &mut Gba, event: ScanlineEvent) {
    let interrupt = match event {
        ScanlineEvent::HBlank => Interrupt::HBlank,
        ScanlineEvent::VBlank => Interrupt::VBlank,
    };
    gba.raise_interrupt(interrupt);
    gba.on_scanline_event(event);
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let cartridge = read_image(&args.rom)?;
    let (bios, boot_mode) = match (&args.bios, args.skip_bios) {
        (Some(path), skip) => {
            let mode = if skip {
                BootMode::Cartridge
            } else {
                BootMode::Bios
            };
            (read_image(path)?, mode)
        }
        (None, true) => (Vec::new(), BootMode::Cartridge),
        (None, false) => return Err(RunnerError::MissingBios.into()),
    };

    info!(rom = %args.rom.display(), ?boot_mode, steps = args.steps, "starting");
    let mut gba = Gba::new(bios, cartridge, boot_mode);
    let mut schedule = ScanSchedule::new(args.vblank_every);

    for _ in 0..args.steps {
        match gba.step() {
            Ok(cycles) => schedule.advance(cycles, |event| scanline_event(&mut gba, event)),
            Err(err) => {
                error!(%err, pc = gba.cpu.registers.program_counter(), "execution stopped");
                eprintln!("fatal: {err}");
                print_diagnostics(&gba);
                return Err(err.into());
            }
        }
    }

    info!(cycles = gba.cycles(), "finished");
    print_diagnostics(&gba);
    Ok(())
}

fn print_diagnostics(gba: &Gba) {
    let diagnostics = gba.diagnostics();
    if diagnostics.total() == 0 {
        return;
    }
    warn!(total = diagnostics.total(), "diagnostics recorded");

    let recent: Vec<_> = diagnostics.recent().collect();
    let skip = recent.len().saturating_sub(DIAGNOSTICS_TAIL);
    eprintln!("last diagnostics ({} total):", diagnostics.total());
    for diagnostic in &recent[skip..] {
        eprintln!("  {diagnostic}");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let _guard = init_logging(&args)?;
    run(&args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collect(schedule: &mut ScanSchedule, cycles: u32) -> Vec<ScanlineEvent> {
        let mut events = Vec::new();
        schedule.advance(cycles, |event| events.push(event));
        events
    }

    #[test]
    fn check_hblank_every_line() {
        let mut schedule = ScanSchedule::new(280_896);

        assert!(collect(&mut schedule, CYCLES_PER_LINE - 1).is_empty());
        assert_eq!(collect(&mut schedule, 1), vec![ScanlineEvent::HBlank]);
        assert_eq!(
            collect(&mut schedule, 2 * CYCLES_PER_LINE),
            vec![ScanlineEvent::HBlank, ScanlineEvent::HBlank]
        );
    }

    #[test]
    fn check_vblank_after_visible_lines() {
        let mut schedule = ScanSchedule::new(280_896);

        let events = collect(&mut schedule, VISIBLE_LINES * CYCLES_PER_LINE);
        assert_eq!(events.len(), VISIBLE_LINES as usize + 1);
        assert_eq!(events.last(), Some(&ScanlineEvent::VBlank));

        // lines 160..228 are blanking, then the next frame starts
        let events = collect(&mut schedule, 68 * CYCLES_PER_LINE);
        assert!(events.is_empty());
        assert_eq!(collect(&mut schedule, CYCLES_PER_LINE), vec![ScanlineEvent::HBlank]);
    }
}
