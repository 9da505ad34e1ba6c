use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context as _};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use penplot_geom::Config;
use penplot_machine::LineSource;
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};

use crate::simulator::Simulator;

mod preview;
mod simulator;

/// Runs G-code on a simulated pen plotter.
#[derive(Parser)]
struct Args {
    /// The G-code to run. Without this, commands are read from a prompt.
    path: Option<PathBuf>,

    /// Machine configuration as JSON. Anything left out gets the default.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write an SVG of everything the pen drew.
    #[arg(long)]
    svg: Option<PathBuf>,
}

/// Hands out the lines of a reader one at a time.
///
/// A line that isn't valid UTF-8 is still handed out, with the bad bytes
/// replaced, and counted in `mangled`. Only a failed read ends the lines.
struct ReaderLines<R> {
    reader: R,
    bytes: Vec<u8>,
    buf: String,
    mangled: usize,
    error: Option<io::Error>,
}

impl<R: BufRead> ReaderLines<R> {
    fn new(reader: R) -> Self {
        ReaderLines {
            reader,
            bytes: Vec::new(),
            buf: String::new(),
            mangled: 0,
            error: None,
        }
    }
}

impl<R: BufRead> LineSource for ReaderLines<R> {
    fn read_line(&mut self) -> Option<&str> {
        self.bytes.clear();
        match self.reader.read_until(b'\n', &mut self.bytes) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(e) => {
                self.error = Some(e);
                return None;
            }
        }

        self.buf.clear();
        match std::str::from_utf8(&self.bytes) {
            Ok(s) => self.buf.push_str(s),
            Err(e) => {
                log::warn!("invalid UTF-8 at byte {} of a line", e.valid_up_to());
                self.mangled += 1;
                self.buf.push_str(&String::from_utf8_lossy(&self.bytes));
            }
        }
        Some(self.buf.as_str())
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let config: Config = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("reading config from {}", path.display()))?;

    for axis in [config.axes.x, config.axes.y] {
        ensure!(
            axis.steps_per_mm.is_finite() && axis.steps_per_mm > 0.0,
            "steps_per_mm must be positive, not {}",
            axis.steps_per_mm
        );
    }
    Ok(config)
}

fn run_file(sim: &mut Simulator, path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let len = file.metadata()?.len();
    let bar = ProgressBar::new(len)
        .with_style(ProgressStyle::with_template("{wide_bar} {bytes}/{total_bytes} {msg}")?);

    let mut lines = ReaderLines::new(BufReader::new(bar.wrap_read(file)));
    let mut line_no = 0;
    while let Some(line) = lines.read_line() {
        line_no += 1;
        if let Err(e) = sim.run_line(line) {
            bar.suspend(|| log::warn!("line {line_no}: {e}"));
        }
        bar.set_message(format!("{:.1?}", sim.stats().elapsed));
    }
    bar.finish_and_clear();
    if lines.mangled > 0 {
        log::warn!("{} lines of {} weren't valid UTF-8", lines.mangled, path.display());
    }

    match lines.error {
        Some(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        None => Ok(()),
    }
}

fn command_mode(sim: &mut Simulator) -> anyhow::Result<()> {
    let mut reed = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("penplot".to_owned()),
        DefaultPromptSegment::Empty,
    );
    loop {
        let line = match reed.read_line(&prompt)? {
            Signal::Success(s) => s,
            Signal::CtrlC | Signal::CtrlD => break,
        };

        match line.trim() {
            "quit" => break,
            "where" => {
                let state = sim.state();
                eprintln!("at {:?}, pen {:?}", state.position, state.pen);
            }
            "stats" => eprintln!("{}", sim.stats()),
            _ => {
                let before = sim.stats().elapsed;
                match sim.run_line(&line) {
                    Ok(Some(cmd)) => {
                        eprintln!("{} took {:.1?}", cmd.opcode(), sim.stats().elapsed - before)
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("error: {e}"),
                }
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let mut sim = Simulator::new(config);
    if let Some(path) = &args.path {
        run_file(&mut sim, path)?;
    } else {
        command_mode(&mut sim)?;
    }

    let (stats, strokes) = sim.finish();
    eprintln!("{stats}");
    if let Some(out) = &args.svg {
        preview::save(out, &strokes, &config)?;
    }
    Ok(())
}
