use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;
use sheetprune::{
    EngineConfig, RemovalReport, SheetRemovalStrategy, VerificationReport, list_sheets,
    strategy_from_config, verify_preservation,
};
use std::fs;
use std::path::{Path, PathBuf};

mod formatter;

#[derive(Parser)]
#[command(name = "sheetprune")]
#[command(about = "Remove a worksheet from XLSX/XLSM files without touching the rest", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print debug logs (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove a sheet from one or more workbooks
    Remove {
        /// Workbooks to process
        #[arg(value_name = "FILE", required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Sheet to remove (overrides the config file)
        #[arg(short, long, value_name = "SHEET")]
        sheet: Option<String>,

        /// Output file (single input only)
        #[arg(short, long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,

        /// Directory for the processed workbooks
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Path to configuration file (TOML)
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Compare each result with its input and report formatting changes
        #[arg(long)]
        verify: bool,

        /// Show what would be done without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// List the sheets of a workbook with their parts
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Check that a processed workbook kept the formatting of the original
    Verify {
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        #[arg(value_name = "PROCESSED")]
        processed: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for scripts
    Json,
}

/// Result of one `remove` run on one file.
#[derive(Debug, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
    pub report: Option<RemovalReport>,
    pub verification: Option<VerificationReport>,
    pub error: Option<String>,
}

impl FileResult {
    fn failed(&self) -> bool {
        self.error.is_some()
            || self
                .verification
                .as_ref()
                .is_some_and(|v| v.critical_count() > 0)
    }
}

struct RemoveJob<'a> {
    strategy: &'a dyn SheetRemovalStrategy,
    sheet_name: &'a str,
    output: Option<&'a Path>,
    out_dir: Option<&'a Path>,
    verify: bool,
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let success = match cli.command {
        Commands::Remove {
            files,
            sheet,
            output,
            out_dir,
            config,
            verify,
            dry_run,
            format,
        } => {
            if output.is_some() && files.len() > 1 {
                anyhow::bail!("--output takes a single input file. Use --out-dir for several.");
            }

            let mut config = load_config(config.as_deref())?;
            if let Some(sheet) = sheet {
                config.sheet_name = sheet;
            }
            let verify = verify || config.verify;
            // Findings are collected and printed per file below
            config.verify = false;

            let strategy = strategy_from_config(&config).context("Invalid configuration")?;
            log::debug!("using the {} strategy", strategy.name());

            let job = RemoveJob {
                strategy: strategy.as_ref(),
                sheet_name: &config.sheet_name,
                output: output.as_deref(),
                out_dir: out_dir.as_deref(),
                verify,
                dry_run,
            };
            if let Some(dir) = job.out_dir
                && !dry_run
            {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }

            let results: Vec<FileResult> = files.par_iter().map(|file| job.run(file)).collect();
            match format {
                OutputFormat::Human => formatter::print_removals(&config.sheet_name, &results),
                OutputFormat::Json => formatter::print_json(&results)?,
            }
            !results.iter().any(FileResult::failed)
        }
        Commands::List { file, format } => {
            let bytes =
                fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let sheets = list_sheets(&bytes)
                .with_context(|| format!("Failed to read sheets of {}", file.display()))?;
            match format {
                OutputFormat::Human => formatter::print_sheets(&file, &sheets),
                OutputFormat::Json => formatter::print_json(&sheets)?,
            }
            true
        }
        Commands::Verify {
            original,
            processed,
            format,
        } => {
            let before = fs::read(&original)
                .with_context(|| format!("Failed to read {}", original.display()))?;
            let after = fs::read(&processed)
                .with_context(|| format!("Failed to read {}", processed.display()))?;
            let report = verify_preservation(&before, &after)
                .with_context(|| format!("Failed to open {}", original.display()))?;
            match format {
                OutputFormat::Human => formatter::print_verification(&processed, &report),
                OutputFormat::Json => formatter::print_json(&report)?,
            }
            report.critical_count() == 0
        }
    };

    std::process::exit(if success { 0 } else { 1 });
}

/// Explicit `--config`, else `sheetprune.toml` in the working directory, else
/// defaults.
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(config_path) = path {
        return EngineConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    let default_config_path = PathBuf::from("sheetprune.toml");
    if default_config_path.exists() {
        EngineConfig::from_file(&default_config_path).with_context(|| {
            format!(
                "Failed to load config from {}",
                default_config_path.display()
            )
        })
    } else {
        Ok(EngineConfig::default())
    }
}

/// Where the processed copy of `input` goes.
///
/// `--output` wins, then `--out-dir/<file name>`, then `<stem>_pruned.<ext>`
/// next to the input.
fn output_path_for(input: &Path, output: Option<&Path>, out_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(output) = output {
        return Ok(output.to_path_buf());
    }

    let file_name = input
        .file_name()
        .with_context(|| format!("{} is not a file path", input.display()))?;
    if let Some(dir) = out_dir {
        return Ok(dir.join(file_name));
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}_pruned.{}", stem, ext.to_string_lossy()),
        None => format!("{}_pruned", stem),
    };
    Ok(input.with_file_name(name))
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl RemoveJob<'_> {
    fn run(&self, file: &Path) -> FileResult {
        let mut result = FileResult {
            file: file.to_path_buf(),
            output: None,
            dry_run: self.dry_run,
            report: None,
            verification: None,
            error: None,
        };
        if let Err(err) = self.process(file, &mut result) {
            log::error!("{}: {:#}", file.display(), err);
            result.error = Some(format!("{:#}", err));
        }
        result
    }

    fn process(&self, file: &Path, result: &mut FileResult) -> Result<()> {
        let output = output_path_for(file, self.output, self.out_dir)?;
        if same_file(file, &output) {
            anyhow::bail!(
                "Output {} would overwrite the input. Choose another --output.",
                output.display()
            );
        }
        result.output = Some(output.clone());

        let input = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let outcome = self
            .strategy
            .remove_sheet(&input, self.sheet_name)
            .with_context(|| format!("Failed to remove sheet '{}'", self.sheet_name))?;

        if self.verify && outcome.report.removed {
            result.verification = Some(
                verify_preservation(&input, &outcome.bytes).context("Verification failed")?,
            );
        }
        result.report = Some(outcome.report);

        if let Some(verification) = &result.verification
            && verification.critical_count() > 0
        {
            log::warn!(
                "{}: {} critical difference(s), nothing written",
                file.display(),
                verification.critical_count()
            );
            result.output = None;
            return Ok(());
        }
        if self.dry_run {
            return Ok(());
        }

        fs::write(&output, &outcome.bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        Ok(())
    }
}
