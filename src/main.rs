use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use recovery_score::args::{Cli, Commands, ConfigAction};
use recovery_score::config::AnalysisConfig;
use recovery_score::recording::load_recording;
use recovery_score::results_log::ResultsLog;
use recovery_score::score::{
    get_max_accelerations_x, get_max_accelerations_y, get_max_accelerations_z, LinearFormula, ScoreBasis,
};
use recovery_score::session::Session;
use recovery_score::util::{add_csv_extension, case_id};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("Error: {:#}", e);
        process::exit(1);
    }
}

fn default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "recovery-score", "recovery-score")
        .context("Could not determine project directories")?;
    Ok(proj_dirs.config_dir().join("config.kdl"))
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    let path = match &cli.config {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            let path = default_config_path()?;
            path.exists().then_some(path)
        }
    };
    let config = match path {
        Some(path) => AnalysisConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            log::debug!("No config file found, using defaults");
            AnalysisConfig::default()
        }
    };
    cli.apply_overrides(config).context("Invalid command line override")
}

fn prompt_file_name() -> Result<String> {
    print!("Enter file name: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let name = line.trim().to_string();
    anyhow::ensure!(!name.is_empty(), "No file name given");
    Ok(name)
}

fn print_log(file: &str) -> Result<()> {
    if !Path::new(file).exists() {
        println!("No results logged.");
        return Ok(());
    }
    let log = ResultsLog::open(file).with_context(|| format!("Failed to open results log {}", file))?;
    let entries = log.entries().with_context(|| format!("Failed to read results log {}", file))?;
    if entries.is_empty() {
        println!("No results logged.");
    }
    for e in entries {
        let sumua = e.sumua.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
        println!(
            "{} {}: failed={} sa_2axes={:.4} sumua={} score={:.4}",
            e.date, e.case_number, e.failed_attempts, e.sa_2axes, sumua, e.recovery_score
        );
    }
    Ok(())
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        match command {
            Commands::Log { file } => print_log(file)?,
            Commands::Config { action } => match action {
                ConfigAction::Path => println!("{}", default_config_path()?.display()),
            },
        }
        return Ok(());
    }

    let config = load_config(&cli)?;
    let formula = LinearFormula::new(&config.scoring);

    let file_name = match &cli.input {
        Some(name) => name.clone(),
        None => prompt_file_name()?,
    };
    let file_path = add_csv_extension(&file_name);
    let recording = load_recording(&file_path, &config.recording)
        .with_context(|| format!("Failed to load recording from {}", file_path))?;

    let mut session = Session::new(io::stdin().lock(), io::stdout().lock(), config).auto_accept(cli.yes);
    let analysis = session
        .run(&recording, &formula)
        .with_context(|| format!("Failed to analyse {}", file_path))?;
    drop(session);

    let score = &analysis.score;
    let peaks_x = get_max_accelerations_x(&score.peaks);
    let peaks_y = get_max_accelerations_y(&score.peaks);
    let peaks_z = get_max_accelerations_z(&score.peaks);
    for (n, region) in analysis.attempts.regions().iter().enumerate() {
        let kind = if n + 1 == analysis.attempts.len() { "successful" } else { "failed" };
        println!(
            "Attempt {} ({}): rows {}..{}, peak |x|={:.3} |y|={:.3} |z|={:.3}",
            n + 1,
            kind,
            analysis.offset + region.start,
            analysis.offset + region.end,
            peaks_x[n],
            peaks_y[n],
            peaks_z[n]
        );
    }

    println!("results are");
    println!("file name: {}", file_path);
    println!("Number of failed attempts: {}", score.failed_attempts);
    println!("sa_2axes= {}", score.sa_2axes);
    println!("sa= {}", score.sa);
    match score.basis {
        ScoreBasis::FailedAttempts => println!("sumua= {}", score.sumua),
        ScoreBasis::SuccessfulAttempt => println!("sumua= -"),
    }
    println!("rs_2axes_py= {}", score.recovery_score);

    let log = ResultsLog::open(&cli.log).with_context(|| format!("Failed to open results log {}", cli.log))?;
    log.record(&case_id(&file_path), score)
        .with_context(|| format!("Failed to append to results log {}", cli.log))?;
    println!("Results appended to {}", log.path().display());

    Ok(())
}
