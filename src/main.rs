use chrono::Local;
use clap::{Args as ClapArgs, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::io::{self, Write};
use std::path::PathBuf;
use synthscan::{
    collect_image_files, CommandClassifier, Detector, FileDetection, LabelPolicy, OutputKind,
    Verdict, DEFAULT_MAX_DIMENSION, SUPPORTED_EXTENSIONS,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "synthscan")]
#[command(author, version, about = "Detect AI-generated images")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Image file or directory to analyze (optional in GUI mode)
    path: Option<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,

    /// Launch GUI file picker (auto-enabled when double-clicked)
    #[arg(long)]
    gui: bool,

    /// Output report file (.csv, .json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "synthscan-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate CSV report
    #[arg(long)]
    no_report: bool,

    /// Don't prompt to open report
    #[arg(long)]
    no_open: bool,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Show score breakdown and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Only show summary
    #[arg(short, long)]
    quiet: bool,
}

/// How to reach the image classifier
#[derive(ClapArgs, Debug)]
struct ModelArgs {
    /// Classifier program: reads a PNG on stdin, prints class outputs as JSON
    #[arg(long, env = "SYNTHSCAN_CLASSIFIER")]
    classifier: Option<String>,

    /// Extra argument passed to the classifier program (repeatable)
    #[arg(long = "classifier-arg", allow_hyphen_values = true)]
    classifier_args: Vec<String>,

    /// Model name shown in results (default: the classifier program)
    #[arg(long)]
    model_name: Option<String>,

    /// Classifier prints raw logits instead of probabilities
    #[arg(long)]
    logits: bool,

    /// Output index of the AI-generated class (default: 1 for two-class models)
    #[arg(long)]
    ai_label: Option<usize>,

    /// Longest side of the image after downscaling
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION)]
    max_dimension: u32,
}

impl ModelArgs {
    fn detector(&self) -> Option<Detector<CommandClassifier>> {
        let program = self.classifier.as_ref()?;

        let mut classifier = CommandClassifier::new(program.as_str())
            .with_args(self.classifier_args.iter().cloned())
            .with_output_kind(if self.logits {
                OutputKind::Logits
            } else {
                OutputKind::Probabilities
            });
        if let Some(name) = &self.model_name {
            classifier = classifier.with_name(name.as_str());
        }
        if let Some(index) = self.ai_label {
            classifier = classifier.with_label_policy(LabelPolicy::Index(index));
        }

        Some(Detector::new(classifier).with_max_dimension(self.max_dimension))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start HTTP API for detection
    Serve {
        /// Default file or directory for /api/analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        #[command(flatten)]
        model: ModelArgs,
    },
}

/// RUST_LOG wins, then LOG_LEVEL, then the verbosity flag.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn require_detector(model: &ModelArgs) -> Detector<CommandClassifier> {
    match model.detector() {
        Some(detector) => detector,
        None => {
            eprintln!("No classifier configured.");
            eprintln!("Pass --classifier <PROGRAM> or set SYNTHSCAN_CLASSIFIER.");
            std::process::exit(1);
        }
    }
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Handle subcommands first
    if let Some(cmd) = args.command {
        match cmd {
            Command::Serve { path, port, model } => {
                let detector = require_detector(&model);
                if let Err(e) = synthscan::serve::start(port, path, detector) {
                    eprintln!("Server error: {}", e);
                    std::process::exit(1);
                }
                return;
            }
        }
    }

    // With GUI feature: launch GUI if --gui flag OR no path provided
    #[cfg(feature = "gui")]
    let use_gui = args.gui || args.path.is_none();

    #[cfg(not(feature = "gui"))]
    let use_gui = false;

    let path = match args.path.clone() {
        Some(p) if !use_gui => p,
        _ => match pick_path(use_gui) {
            Some(p) => p,
            None => std::process::exit(if use_gui { 0 } else { 1 }),
        },
    };

    let detector = require_detector(&args.model);

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let files = collect_image_files(&path);
    if files.is_empty() {
        eprintln!(
            "No image files found (supported: {})",
            SUPPORTED_EXTENSIONS.join(", ")
        );
        std::process::exit(1);
    }

    if !args.quiet {
        eprintln!("\x1b[1mSynthscan - AI Image Detector\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Model: {}", detector.model_name());
        eprintln!("Found {} image file(s)\n", files.len());
    }

    let pb = if !args.quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let results: Vec<FileDetection> = files
        .par_iter()
        .map(|path| {
            let detection = detector.analyze_file(path);
            if let Some(ref pb) = pb {
                pb.inc(1);
                pb.set_message(detection.file_name.clone());
            }
            detection
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !args.quiet {
        for r in &results {
            print_row(r, args.verbose);
        }
    }

    let summary = synthscan::report::Summary::from_results(&results);

    if !args.quiet {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  \x1b[32m✓ Real:\x1b[0m         {}", summary.camera);
        eprintln!("  \x1b[31m✗ AI-generated:\x1b[0m {}", summary.ai_generated);
        if summary.error > 0 {
            eprintln!("  \x1b[90mErrors:\x1b[0m         {}", summary.error);
        }
    }

    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report {
        std::fs::create_dir_all(&args.report_dir).ok();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("synthscan_report_{}.csv", timestamp);
        Some(args.report_dir.join(filename))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        if let Err(e) = synthscan::report::generate(output_path, &results) {
            eprintln!("Failed to write report: {}", e);
            std::process::exit(1);
        }
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }

        if !args.no_open {
            if use_gui {
                let _ = open::that(output_path);
            } else if !args.quiet && confirm("\nOpen report? [Y/n] ") {
                if let Err(e) = open::that(output_path) {
                    eprintln!("Failed to open report: {}", e);
                }
            }
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mAnalysis complete.\x1b[0m");
    }

    if summary.ai_generated > 0 {
        std::process::exit(2);
    } else if summary.error > 0 {
        std::process::exit(1);
    }
}

fn print_row(r: &FileDetection, verbose: bool) {
    let verdict = r.result.verdict();
    let color = match verdict {
        Verdict::Camera => "\x1b[32m",
        Verdict::AiGenerated => "\x1b[31m",
        Verdict::Error => "\x1b[90m",
    };
    let reset = "\x1b[0m";

    println!(
        "{}{:<8}{} {:>5.1}%  {:<20}  {}",
        color,
        format!("[{}]", verdict),
        reset,
        r.result.confidence * 100.0,
        truncate(&r.result.model_name, 20),
        &r.file_name
    );

    if !verbose {
        return;
    }
    if let Some(d) = r.result.details {
        eprintln!(
            "    Classifier: {:.3}  Artifact: {:.3}  Frequency: {:.3}  Raw: {:.3}  Size: {}x{}",
            d.classifier_probability,
            d.artifact_score,
            d.frequency_score,
            d.combined_raw,
            d.image_size.0,
            d.image_size.1
        );
    }
    if let Some(ref error) = r.result.error {
        eprintln!("    Error: {}", error);
    }
}

fn confirm(prompt: &str) -> bool {
    eprint!("{}", prompt);
    io::stderr().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    let input = input.trim().to_lowercase();
    input.is_empty() || input == "y" || input == "yes"
}

#[cfg(feature = "gui")]
fn pick_path(use_gui: bool) -> Option<PathBuf> {
    if !use_gui {
        return None;
    }

    // First try folder picker
    if let Some(folder) = rfd::FileDialog::new()
        .set_title("Select folder to analyze (or Cancel for single file)")
        .pick_folder()
    {
        return Some(folder);
    }

    let picked = rfd::FileDialog::new()
        .set_title("Select image to analyze")
        .add_filter("Images", SUPPORTED_EXTENSIONS)
        .pick_file();
    if picked.is_none() {
        eprintln!("No file or folder selected.");
    }
    picked
}

#[cfg(not(feature = "gui"))]
fn pick_path(_use_gui: bool) -> Option<PathBuf> {
    eprintln!("Usage: synthscan <PATH> --classifier <PROGRAM>");
    eprintln!("Run 'synthscan --help' for more options.");
    eprintln!("Note: GUI mode not available in this build.");
    None
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
