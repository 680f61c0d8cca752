//! Statement pretreatment
//!
//! Splits a raw script into classified statement units and applies the
//! pretreatment side effects: jar/file registration directives are executed
//! against the executor's artifact loader immediately, and mutations are
//! rewritten to the simulated sink when the submission asks for it.

use std::path::PathBuf;

use tracing::{debug, warn};

use sluice_core::domain::config::ExecOptions;
use sluice_core::domain::statement::{StatementKind, StatementUnit};

use crate::error::Result;
use crate::executor::Executor;
use crate::sqltext;

/// Extracts the single-quoted paths referenced by a registration directive
/// or artifact statement.
pub(crate) fn quoted_paths(statement: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut rest = statement;
    while let Some(start) = rest.find('\'') {
        let after = &rest[start + 1..];
        match after.find('\'') {
            Some(end) => {
                paths.push(PathBuf::from(&after[..end]));
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    paths
}

/// Turns a raw script into pretreated, classified statement units.
pub struct Pretreater<'a> {
    executor: &'a dyn Executor,
    options: &'a ExecOptions,
}

impl<'a> Pretreater<'a> {
    pub fn new(executor: &'a dyn Executor, options: &'a ExecOptions) -> Self {
        Self { executor, options }
    }

    /// Splits, rewrites, registers directives, and classifies.
    ///
    /// A failing registration directive marks only its own unit; the rest of
    /// the script still pretreats.
    pub fn pretreat(&self, script: &str) -> Result<Vec<StatementUnit>> {
        let mut units = Vec::new();

        for text in sqltext::split_statements(script) {
            let text = self.executor.pretreat_statement(&text);
            if text.trim().is_empty() {
                continue;
            }

            let mut kind = StatementKind::classify(&text);
            if kind == StatementKind::Insert && self.options.mock_sink {
                kind = StatementKind::MockedInsert;
            }

            let mut unit = StatementUnit::new(units.len(), text, kind);
            if kind.is_directive() {
                let paths = quoted_paths(&unit.text);
                if paths.is_empty() {
                    unit.mark_error("registration directive names no path");
                } else {
                    debug!("registering {} artifact(s) from directive", paths.len());
                    if let Err(e) = self.executor.register_artifacts(&paths) {
                        warn!("artifact registration failed: {}", e);
                        unit.mark_error(format!("artifact registration failed: {}", e));
                    }
                }
            }
            units.push(unit);
        }

        Ok(units)
    }
}
