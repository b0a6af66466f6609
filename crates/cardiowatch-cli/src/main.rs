use anyhow::{anyhow, bail, Context, Result};
use cardiowatch_lib::{
    alert::{AlertCoordinator, AlertPresenter, AlertState, UserChoice},
    analysis::{analyze, AnalysisResult},
    config::{load_config, MonitorConfig},
    io::{self as cw_io, csv as csv_io, text as text_io},
    plot::{figure_from_waveform, Figure, Series},
    signal::Waveform,
    source::{ChannelSource, RecordedSource, SignalSource, SyntheticSource},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{info, warn};
use plotters::prelude::*;
use serde_json::json;
use std::{
    collections::VecDeque,
    fs::File,
    io::{self, BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
    thread,
};

#[derive(Parser)]
#[command(
    name = "cardiowatch",
    version,
    about = "cardiowatch: ECG acquisition, irregular-beat analysis and alerting"
)]
struct Cli {
    /// Logging verbosity when RUST_LOG is unset (e.g., debug, info, warn)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Shared configuration flags. Flags override values from `--config`.
#[derive(Args, Clone, Debug, Default)]
struct ConfigArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    baseline: Option<f64>,
    #[arg(long)]
    deviation_threshold: Option<f64>,
    #[arg(long)]
    moderate_count: Option<usize>,
    #[arg(long)]
    high_count: Option<usize>,
    /// Samples per reading
    #[arg(long)]
    duration: Option<usize>,
    #[arg(long)]
    fs: Option<f64>,
    /// Seed for the synthetic generator
    #[arg(long)]
    seed: Option<u64>,
    /// Per-sample anomaly probability of the synthetic generator
    #[arg(long)]
    anomaly_rate: Option<f64>,
    /// Live feed timeout per sample (milliseconds)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<MonitorConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config(path)?,
            None => MonitorConfig::default(),
        };
        if let Some(v) = self.baseline {
            cfg.analysis.baseline = v;
        }
        if let Some(v) = self.deviation_threshold {
            cfg.analysis.deviation_threshold = v;
        }
        if let Some(v) = self.moderate_count {
            cfg.analysis.moderate_count = v;
        }
        if let Some(v) = self.high_count {
            cfg.analysis.high_count = v;
        }
        if let Some(v) = self.duration {
            cfg.reading.duration_samples = v;
        }
        if let Some(v) = self.fs {
            cfg.reading.sample_rate_hz = v;
        }
        if let Some(v) = self.seed {
            cfg.synthetic.seed = Some(v);
        }
        if let Some(v) = self.anomaly_rate {
            cfg.synthetic.anomaly_rate = v;
        }
        if let Some(v) = self.timeout_ms {
            cfg.feed.timeout_ms = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Csv,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Seeded synthetic generator
    Synthetic,
    /// Replay a stored reading (--input)
    Recorded,
    /// Newline-delimited amplitudes streamed from a file or pipe (--input)
    Live,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce one synthetic reading
    Acquire {
        #[command(flatten)]
        cfg: ConfigArgs,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyze a reading (text series or time,value CSV) from --input or stdin
    Analyze {
        #[command(flatten)]
        cfg: ConfigArgs,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Render a reading to a PNG with the threshold band and irregular beats
    Plot {
        #[command(flatten)]
        cfg: ConfigArgs,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Validate a configuration and print the effective values as JSON
    CheckConfig {
        #[command(flatten)]
        cfg: ConfigArgs,
    },
    /// Take readings and run the alert workflow; one JSON line per step
    Monitor {
        #[command(flatten)]
        cfg: ConfigArgs,
        #[arg(long, value_enum, default_value = "synthetic")]
        source: SourceKind,
        #[arg(long)]
        input: Option<PathBuf>,
        /// Routine readings to take
        #[arg(long, default_value_t = 1)]
        readings: usize,
        /// Scripted answers (retake,dismiss,...) instead of prompting on stdin
        #[arg(long, value_delimiter = ',')]
        choices: Option<Vec<String>>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level.as_str())).init();
    match cli.command {
        Commands::Acquire { cfg, format, out } => cmd_acquire(&cfg, format, out.as_deref())?,
        Commands::Analyze { cfg, input } => cmd_analyze(&cfg, input.as_deref())?,
        Commands::Plot { cfg, input, out } => cmd_plot(&cfg, &input, &out)?,
        Commands::CheckConfig { cfg } => cmd_check_config(&cfg)?,
        Commands::Monitor {
            cfg,
            source,
            input,
            readings,
            choices,
        } => cmd_monitor(&cfg, source, input.as_deref(), readings, choices)?,
    }
    Ok(())
}

fn synthetic_source(cfg: &MonitorConfig) -> Result<SyntheticSource> {
    let fallback: u64 = rand::random();
    let source = SyntheticSource::from_config(cfg.analysis.baseline, &cfg.synthetic, fallback)?;
    if cfg.synthetic.seed.is_none() {
        info!("synthetic source seeded with {}", source.seed());
    }
    Ok(source)
}

fn read_waveform(input: Option<&Path>) -> Result<Waveform> {
    match input {
        Some(path) => cw_io::read_waveform(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(Waveform::from_values(text_io::parse_f64_series(&buf)?)?)
        }
    }
}

fn cmd_acquire(args: &ConfigArgs, format: OutputFormat, out: Option<&Path>) -> Result<()> {
    let cfg = args.resolve()?;
    let mut source = synthetic_source(&cfg)?;
    let waveform = source.acquire(cfg.reading.duration_samples)?;
    match (format, out) {
        (OutputFormat::Csv, Some(path)) => csv_io::write_waveform_csv(path, &waveform)?,
        (OutputFormat::Text, Some(path)) => text_io::write_series(path, &waveform)?,
        (OutputFormat::Json, Some(path)) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            serde_json::to_writer(file, &waveform)?;
        }
        (OutputFormat::Text, None) => print!("{}", text_io::format_series(&waveform)),
        (OutputFormat::Json, None) => println!("{}", serde_json::to_string(&waveform)?),
        (OutputFormat::Csv, None) => {
            println!("time,value");
            for sample in waveform.samples() {
                println!("{},{}", sample.time, sample.value);
            }
        }
    }
    Ok(())
}

fn cmd_analyze(args: &ConfigArgs, input: Option<&Path>) -> Result<()> {
    let cfg = args.resolve()?;
    let waveform = read_waveform(input)?;
    let result = analyze(&waveform, &cfg.analysis);
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_check_config(args: &ConfigArgs) -> Result<()> {
    let cfg = args.resolve()?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

fn cmd_plot(args: &ConfigArgs, input: &Path, out: &Path) -> Result<()> {
    let cfg = args.resolve()?;
    let waveform = cw_io::read_waveform(input)?;
    if waveform.is_empty() {
        bail!("nothing to plot: {} holds no samples", input.display());
    }
    let fig = figure_from_waveform(
        "ECG reading",
        &waveform,
        &cfg.analysis,
        cfg.reading.sample_rate_hz,
        4096,
    );
    draw_plotters_figure(out, &fig)
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = fig
        .bounds()
        .ok_or_else(|| anyhow!("nothing to plot: figure has no points"))?;
    let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };
    let pad = ((y_max - y_min) * 0.05).max(1.0);
    let backend = BitMapBackend::new(path, (1000, 400));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, (y_min - pad)..(y_max + pad))?;
    let mut mesh = chart.configure_mesh();
    if let Some(label) = &fig.x.label {
        mesh.x_desc(label.as_str());
    }
    if let Some(label) = &fig.y.label {
        mesh.y_desc(label.as_str());
    }
    mesh.draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    &RGBColor(r, g, b),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.color.rgb();
                let color = RGBColor(r, g, b);
                chart.draw_series(
                    markers
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), markers.radius, color.filled())),
                )?;
            }
        }
    }
    root.present()?;
    Ok(())
}

const CHOICE_PROMPT: &str = "Take another ECG [r] or dismiss [d]?";

/// Prints the alert on stderr; stdout carries the JSON transcript.
struct ConsolePresenter;

impl AlertPresenter for ConsolePresenter {
    fn render_alert(&mut self, result: &AnalysisResult) {
        eprintln!(
            "Irregular heart rhythm detected: {} irregular beats in {} samples (severity: {}).",
            result.irregular_beat_count, result.sample_count, result.severity
        );
        eprintln!("{}", CHOICE_PROMPT);
    }
}

/// Where user answers come from.
enum ChoiceInput {
    Scripted(VecDeque<UserChoice>),
    Prompt(io::StdinLock<'static>),
}

impl ChoiceInput {
    /// `None` when no answer is available; callers treat that as a dismissal.
    fn next_choice(&mut self) -> Result<Option<UserChoice>> {
        match self {
            ChoiceInput::Scripted(queue) => Ok(queue.pop_front()),
            ChoiceInput::Prompt(stdin) => loop {
                let mut line = String::new();
                if stdin.read_line(&mut line)? == 0 {
                    return Ok(None);
                }
                match parse_choice(line.trim()) {
                    Ok(choice) => return Ok(Some(choice)),
                    Err(err) => eprintln!("{}", err),
                }
            },
        }
    }
}

fn parse_choice(text: &str) -> Result<UserChoice> {
    match text.to_ascii_lowercase().as_str() {
        "r" | "retake" | "take-ecg" | "take_ecg" => Ok(UserChoice::TakeEcg),
        "d" | "dismiss" => Ok(UserChoice::Dismiss),
        other => bail!("unknown choice '{}': expected retake or dismiss", other),
    }
}

fn spawn_live_feed(path: &Path, cfg: &MonitorConfig) -> Result<ChannelSource> {
    let file = File::open(path).with_context(|| format!("opening feed {}", path.display()))?;
    let (tx, rx) = crossbeam_channel::bounded(cfg.reading.duration_samples.max(1) * 2);
    let name = path.display().to_string();
    thread::spawn(move || {
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("feed {} read error: {}", name, err);
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match trimmed.parse::<f64>() {
                Ok(value) => {
                    if tx.send(value).is_err() {
                        break;
                    }
                }
                Err(_) => warn!("feed {} skipped non-numeric line: {}", name, trimmed),
            }
        }
    });
    Ok(ChannelSource::from_config(rx, &cfg.feed))
}

fn build_source(
    kind: SourceKind,
    input: Option<&Path>,
    cfg: &MonitorConfig,
) -> Result<Box<dyn SignalSource>> {
    let needs_input = || {
        input.ok_or_else(|| anyhow!("--source {:?} requires --input", kind))
    };
    let source: Box<dyn SignalSource> = match kind {
        SourceKind::Synthetic => Box::new(synthetic_source(cfg)?),
        SourceKind::Recorded => Box::new(RecordedSource::from_path(needs_input()?)?),
        SourceKind::Live => Box::new(spawn_live_feed(needs_input()?, cfg)?),
    };
    Ok(source)
}

fn emit(value: serde_json::Value) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", value)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_monitor(
    args: &ConfigArgs,
    kind: SourceKind,
    input: Option<&Path>,
    readings: usize,
    choices: Option<Vec<String>>,
) -> Result<()> {
    let cfg = args.resolve()?;
    let mut input_choices = match choices {
        Some(list) => ChoiceInput::Scripted(
            list.iter()
                .map(|c| parse_choice(c.trim()))
                .collect::<Result<VecDeque<_>>>()?,
        ),
        None => ChoiceInput::Prompt(io::stdin().lock()),
    };
    let source = build_source(kind, input, &cfg)?;
    let mut coordinator = AlertCoordinator::new(source, &cfg)?;
    let mut presenter = ConsolePresenter;

    for index in 0..readings {
        let result = match coordinator.take_reading() {
            Ok(result) => result,
            Err(err) if err.is_retryable() => {
                emit(json!({ "step": "reading", "index": index, "error": err.to_string() }))?;
                warn!("stopping after failed reading: {}", err);
                break;
            }
            Err(err) => return Err(err.into()),
        };
        emit(json!({
            "step": "reading",
            "index": index,
            "result": result,
            "state": coordinator.state(),
        }))?;

        while coordinator.state().is_active() {
            if matches!(coordinator.state(), AlertState::Alerting { .. }) {
                coordinator.present(&mut presenter)?;
            }
            let choice = match input_choices.next_choice()? {
                Some(choice) => choice,
                None => {
                    info!("no answer available, dismissing alert");
                    UserChoice::Dismiss
                }
            };
            let outcome = match choice {
                UserChoice::Dismiss => coordinator.dismiss().map(|_| None),
                UserChoice::TakeEcg => coordinator.take_ecg().map(Some),
            };
            match outcome {
                Ok(retake) => emit(json!({
                    "step": "choice",
                    "choice": choice,
                    "result": retake,
                    "state": coordinator.state(),
                }))?,
                Err(err) if err.is_retryable() => {
                    eprintln!("Retake failed: {}", err);
                    eprintln!("{}", CHOICE_PROMPT);
                    emit(json!({
                        "step": "choice",
                        "choice": choice,
                        "error": err.to_string(),
                        "state": coordinator.state(),
                    }))?
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    emit(json!({ "step": "summary", "episodes": coordinator.history() }))?;
    Ok(())
}
