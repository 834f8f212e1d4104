use std::{
    hash::Hasher,
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use console::{style, Emoji};
use fusepe::{
    manifest::Overrides,
    package_app,
    package_clean_app,
    platform::FinishOptions,
    runtime::{CachedRuntime, ExplicitRuntime, RuntimeProvider},
    types::Reporter,
    PackageOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use trailpe::{Entry, PackedExecutable};
use twox_hash::XxHash64;

mod args;
use args::*;

#[derive(Parser)]
#[command(about, version = env!("FUSEPE_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Package an app into a self-contained executable
    Build(BuildArgs),
    /// Show the archive appended to a packaged executable
    Inspect(InspectArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Path to the output directory, emptied before packaging
    output_dir:      PathBuf,
    /// Path to the app [default: current directory]
    #[arg(long)]
    app_dir:         Option<PathBuf>,
    /// Target platform (linux, win32, darwin) [default: host]
    #[arg(long)]
    platform:        Option<String>,
    /// Target architecture (x64, ia32, arm64, arm) [default: host]
    #[arg(long)]
    arch:            Option<String>,
    /// Path to the runtime binary, skips the cache lookup
    #[arg(long)]
    runtime:         Option<PathBuf>,
    /// Runtime version [default: engines.yode of package.json]
    #[arg(long)]
    runtime_version: Option<String>,
    /// Directory holding downloaded runtime binaries [default: <app-dir>/yode]
    #[arg(long)]
    cache_dir:       Option<PathBuf>,
    /// Minify script files
    #[arg(long)]
    minify:          bool,
    /// Keep files matching this glob next to the executable
    #[arg(long)]
    unpack:          Option<String>,
    /// Keep directories matching this glob next to the executable
    #[arg(long)]
    unpack_dir:      Option<String>,
    /// Additional globs of files to leave out
    #[arg(long, num_args = 1..)]
    ignore:          Vec<String>,
    /// Don't sign the app bundle on macOS
    #[arg(long)]
    no_sign:         bool,
    /// Package a fresh copy with only production dependencies installed
    #[arg(long)]
    clean:           bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Path to a packaged executable
    executable: PathBuf,
    /// Only print the summary, not the file listing
    #[arg(short, long)]
    quiet:      bool,
}

struct ConsoleReporter {
    bar:   ProgressBar,
    steps: AtomicUsize,
}
impl ConsoleReporter {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(progress_style) =
            ProgressStyle::default_spinner().template("{spinner:.green} {elapsed_precise} {wide_msg}")
        {
            bar.set_style(progress_style);
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        ConsoleReporter {
            bar,
            steps: AtomicUsize::new(0),
        }
    }

    fn finish(&self) { self.bar.finish_and_clear(); }
}
impl Reporter for ConsoleReporter {
    fn step(&self, message: &str) {
        let step = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        self.bar.println(format!(
            "{} {}{}…",
            style(format!("[{}]", step)).bold().dim(),
            Emoji("📦 ", ""),
            message.to_lowercase()
        ));
    }

    fn progress(&self, path: &str) { self.bar.set_message(format!("{}", style(path).blue())); }

    fn warning(&self, message: &str) {
        self.bar.println(format!(
            "      {}{}",
            Emoji("⚠ ", ""),
            style(message).red()
        ));
    }
}

fn build(args: BuildArgs) {
    let app_dir = get_app_dir(args.app_dir.as_deref());
    let output_dir = get_output_dir(&args.output_dir);
    let platform = get_platform(args.platform.as_deref());
    let arch = get_arch(args.arch.as_deref());
    let runtime: Box<dyn RuntimeProvider> = match &args.runtime {
        Some(runtime) => Box::new(ExplicitRuntime(get_runtime(runtime))),
        None => Box::new(CachedRuntime::new(get_cache_dir(
            args.cache_dir.as_deref(),
            &app_dir,
        ))),
    };

    println!(
        "{} {}packaging {} for {}-{}…",
        style("[0]").bold().dim(),
        Emoji("🔍 ", ""),
        style(app_dir.display()).blue(),
        style(platform).magenta(),
        style(arch).magenta()
    );

    let options = PackageOptions {
        platform,
        arch,
        overrides: Overrides {
            minify:     args.minify.then_some(true),
            unpack:     args.unpack,
            unpack_dir: args.unpack_dir,
            ignore:     args.ignore,
        },
        runtime: runtime.as_ref(),
        runtime_version: args.runtime_version,
        minifier: None,
        finish: FinishOptions {
            sign: !args.no_sign,
        },
    };
    let reporter = ConsoleReporter::new();
    let result = if args.clean {
        package_clean_app(&output_dir, &app_dir, &options, &reporter)
    } else {
        package_app(&output_dir, &app_dir, &options, &reporter)
    };
    reporter.finish();

    let packaged = result.unwrap_or_else(|e| {
        println!("{}: {}", style("packaging failed").red(), e);
        std::process::exit(-1);
    });
    let report = &packaged.archive;
    println!(
        "      {}{} {} {}{}",
        Emoji("✨ ", ""),
        style("successfully packed").green(),
        style(report.packed).magenta(),
        style("files").green(),
        if report.unpacked > 0 {
            style(format!(" (kept {} files unpacked)", report.unpacked)).bold()
        } else {
            style(String::new())
        }
    );
    if !report.diagnostics.is_empty() {
        println!(
            "      {}{}",
            Emoji("⚠ ", ""),
            style(format!("{} files had warnings", report.diagnostics.len())).red()
        );
    }
    println!(
        "     {} {} {}",
        Emoji("✨ ", ""),
        style("done!").green(),
        style(packaged.artifact.display()).blue()
    );
}

fn inspect(args: InspectArgs) {
    let path = get_executable(&args.executable);
    let executable = PackedExecutable::open(&path).unwrap_or_else(|e| {
        println!("{}: {}", style("not a packaged executable").red(), e);
        std::process::exit(-1);
    });
    let region = executable.region();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(executable.archive_bytes());

    println!("{}: {}", style("format version").blue().bright(), region.version);
    println!("{}: {}", style("archive offset").blue().bright(), region.start);
    println!("{}: {} bytes", style("archive size").blue().bright(), region.len);
    println!("{}: {:016x}", style("archive xxhash64").blue().bright(), hasher.finish());
    if args.quiet {
        return;
    }

    let archive = executable.archive().unwrap_or_else(|e| {
        println!("{}: {}", style("couldn't read the archive header").red(), e);
        std::process::exit(-1);
    });
    println!("{}:", style("files").blue().bright());
    for (path, entry) in archive.files() {
        match entry {
            Entry::File {
                size,
                unpacked: true,
                ..
            } => println!("  {} {} {}", path, style(size).magenta(), style("(unpacked)").bold().dim()),
            Entry::File { size, .. } => println!("  {} {}", path, style(size).magenta()),
            Entry::Link { link } => println!("  {} -> {}", path, style(link).blue()),
            Entry::Directory { .. } => {}
        }
    }
}

fn main() {
    color_backtrace::install();

    match Cli::parse().command {
        Command::Build(args) => build(args),
        Command::Inspect(args) => inspect(args),
    }
}
