// Copyright 2015 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use coredump::{Coredump, PartialOutput};
use log::info;
use simplelog::{ColorChoice, ConfigBuilder, Level, LevelFilter, TermLogger, TerminalMode};

/// Find the coredump embedded in a file and write it out on its own.
///
/// Everything before the coredump's main header and everything after its last
/// section (the terminator tag included) is left out of the output.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Print the decoded header, sections and memory regions to stdout.
    #[arg(short, long)]
    verbose: bool,

    /// Actually strip the input. Without this flag the help is printed and
    /// nothing is done.
    #[arg(long)]
    strip: bool,

    /// Write the sections read so far even if a later one could not be decoded.
    #[arg(long)]
    allow_partial: bool,

    /// How much to log to stderr.
    #[arg(
        long,
        default_value = "info",
        value_parser = ["off", "error", "warn", "info", "debug", "trace"],
    )]
    log_level: String,

    /// The file holding the coredump.
    input: PathBuf,

    /// Where to write the coredump. Defaults to the input path with `_final`
    /// added before its extension.
    output: Option<PathBuf>,
}

impl Args {
    /// Get the output file.
    pub fn output_file(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input))
    }

    pub fn log_filter(&self) -> LevelFilter {
        match self.log_level.as_str() {
            "off" => LevelFilter::Off,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Error,
        }
    }

    pub fn partial_output(&self) -> PartialOutput {
        if self.allow_partial {
            PartialOutput::Allow
        } else {
            PartialOutput::Refuse
        }
    }
}

/// `dump.bin` becomes `dump_final.bin`, `dump` becomes `dump_final`.
fn default_output_path(input: &Path) -> PathBuf {
    let mut name = input.file_stem().map(OsString::from).unwrap_or_default();
    name.push("_final");
    if let Some(extension) = input.extension() {
        name.push(".");
        name.push(extension);
    }
    input.with_file_name(name)
}

pub fn main() {
    let args = Args::parse();

    if !args.strip {
        let _ = writeln!(io::stderr(), "{}", Args::command().render_help());
        std::process::exit(1);
    }

    let _ = TermLogger::init(
        args.log_filter(),
        ConfigBuilder::new()
            .set_location_level(LevelFilter::Off)
            .set_time_level(LevelFilter::Off)
            .set_thread_level(LevelFilter::Off)
            .set_target_level(LevelFilter::Off)
            .set_level_color(Level::Trace, None)
            .build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    if let Err(e) = try_main(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn try_main(args: &Args) -> anyhow::Result<()> {
    let output_file = args.output_file();

    info!("input file path: {}", args.input.display());
    info!("output file path: {}", output_file.display());

    let dump = Coredump::read_path(&args.input)
        .with_context(|| format!("while reading {}", args.input.display()))?;
    info!("Coredump found at offset {:#x}", dump.start);

    let result = dump.parse();
    if args.verbose {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        result
            .print(&mut stdout)
            .context("while printing the coredump")?;
    }

    dump.write_stripped(&result, &output_file, args.partial_output())
        .with_context(|| format!("while writing {}", output_file.display()))?;

    Ok(())
}
