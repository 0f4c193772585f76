//! Interchangeable implementations of sheet removal

use std::io::Write;
use std::process::{Command, Stdio};

use crate::config::{ConfigError, EngineConfig, ExternalCommandConfig, StrategyKind};
use crate::error::{EngineError, Result};
use crate::graph::LoadedWorkbook;
use crate::package::Package;
use crate::removal::{
    RemovalOptions, RemovalOutcome, RemovalReport, ensure_preserved, remove_sheet_with,
};

/// Something that can take a sheet out of a package.
///
/// All implementations share one contract: an absent sheet returns the input
/// unchanged with `removed: false`, removing the last sheet fails with
/// [`EngineError::EmptyResultPackage`], and otherwise exactly the target goes
/// while the other sheets keep their order.
pub trait SheetRemovalStrategy: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    fn remove_sheet(&self, input: &[u8], sheet_name: &str) -> Result<RemovalOutcome>;
}

/// In-process package editing.
#[derive(Debug, Clone, Default)]
pub struct PackageEditor {
    options: RemovalOptions,
}

impl PackageEditor {
    pub fn new(options: RemovalOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RemovalOptions {
        &self.options
    }
}

impl SheetRemovalStrategy for PackageEditor {
    fn name(&self) -> &'static str {
        "package"
    }

    fn remove_sheet(&self, input: &[u8], sheet_name: &str) -> Result<RemovalOutcome> {
        remove_sheet_with(input, sheet_name, &self.options)
    }
}

/// Delegates the removal to another program.
///
/// The input package goes to the program's stdin and the result is read from
/// its stdout. The result is opened again afterwards, so a program that
/// produces garbage, leaves the sheet in place, or touches other sheets is
/// reported as a failure.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    verify: bool,
}

impl ExternalCommand {
    pub fn new(config: &ExternalCommandConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            verify: false,
        }
    }

    /// Compare the program's output with its input and fail with
    /// [`EngineError::VerificationFailed`] on critical differences.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    fn run(&self, input: &[u8], sheet_name: &str) -> Result<Vec<u8>> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{sheet}", sheet_name))
            .collect();
        log::debug!("running {} {:?}", self.program, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::ExternalCommand(format!("failed to start {}: {}", self.program, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::ExternalCommand("stdin not captured".into()))?;
        let payload = input.to_vec();
        let feeder = std::thread::spawn(move || stdin.write_all(&payload));

        let output = child
            .wait_with_output()
            .map_err(|e| EngineError::ExternalCommand(format!("{} failed: {}", self.program, e)))?;
        let fed = feeder
            .join()
            .map_err(|_| EngineError::ExternalCommand("stdin writer panicked".into()))?;

        if !output.status.success() {
            return Err(EngineError::ExternalCommand(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        fed.map_err(|e| {
            EngineError::ExternalCommand(format!("could not write input to {}: {}", self.program, e))
        })?;
        Ok(output.stdout)
    }
}

impl SheetRemovalStrategy for ExternalCommand {
    fn name(&self) -> &'static str {
        "external"
    }

    fn remove_sheet(&self, input: &[u8], sheet_name: &str) -> Result<RemovalOutcome> {
        let mut before = Package::from_bytes(input)?;
        let graph = LoadedWorkbook::load(&mut before)?.graph;
        if graph.get(sheet_name).is_none() {
            log::warn!("sheet '{}' not found; package left unchanged", sheet_name);
            return Ok(RemovalOutcome::unchanged(input, graph.names()));
        }
        if graph.sheets().len() == 1 {
            return Err(EngineError::EmptyResultPackage {
                sheet: sheet_name.to_string(),
            });
        }

        let bytes = self.run(input, sheet_name)?;
        let mut after = Package::from_bytes(&bytes)?;
        let remaining = LoadedWorkbook::load(&mut after)?.graph;
        if remaining.get(sheet_name).is_some() {
            return Err(EngineError::ExternalCommand(format!(
                "{} left sheet '{}' in place",
                self.program, sheet_name
            )));
        }
        let expected: Vec<String> = graph
            .names()
            .into_iter()
            .filter(|name| name != sheet_name)
            .collect();
        if remaining.names() != expected {
            return Err(EngineError::ExternalCommand(format!(
                "{} left sheets {:?}, expected {:?}",
                self.program,
                remaining.names(),
                expected
            )));
        }
        if self.verify {
            ensure_preserved(input, &bytes)?;
        }

        let removed_parts = before
            .part_names()
            .into_iter()
            .filter(|name| !after.contains(name))
            .map(str::to_string)
            .collect();

        Ok(RemovalOutcome {
            bytes,
            report: RemovalReport {
                removed: true,
                remaining_sheet_names: remaining.names(),
                removed_parts,
            },
        })
    }
}

/// Build the strategy selected by a configuration.
pub fn strategy_from_config(
    config: &EngineConfig,
) -> std::result::Result<Box<dyn SheetRemovalStrategy>, ConfigError> {
    config.validate()?;
    match config.strategy {
        StrategyKind::Package => Ok(Box::new(PackageEditor::new(config.removal_options()))),
        StrategyKind::External => {
            let external = config.external.as_ref().ok_or_else(|| {
                ConfigError::Invalid("strategy = \"external\" requires an [external] section".into())
            })?;
            Ok(Box::new(ExternalCommand::new(external).with_verify(config.verify)))
        }
    }
}
