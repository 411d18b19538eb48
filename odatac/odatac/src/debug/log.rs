//! Collects the intermediate representations of one compilation, so they
//! can be dumped with `odatac compile --debug-log`.
#![doc(hidden)]

use std::sync::RwLock;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use odatac_parser::lexer::lr;
use odatac_parser::parser::pr;

use crate::ir;

/// The log of the compilation in progress, if one was started.
static CURRENT_LOG: RwLock<Option<DebugLog>> = RwLock::new(None);

fn with_current<R>(f: impl FnOnce(&mut DebugLog) -> R) -> Option<R> {
    let mut lock = CURRENT_LOG.write().unwrap();
    lock.as_mut().map(f)
}

/// Starts collecting. Only one log can be collected at a time.
pub fn log_start() {
    let mut lock = CURRENT_LOG.write().unwrap();
    assert!(lock.is_none(), "debug log already started");

    *lock = Some(DebugLog {
        started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: crate::compiler_version().to_string(),
        entries: Vec::new(),
        clock: Instant::now(),
        stage: Stage::Lexer,
        option: None,
    });
}

/// Stops collecting and hands over what was collected.
pub fn log_finish() -> Option<DebugLog> {
    CURRENT_LOG.write().unwrap().take()
}

pub fn log_is_enabled() -> bool {
    CURRENT_LOG.read().unwrap().is_some()
}

pub fn log_stage(stage: Stage) {
    with_current(|log| log.stage = stage);
}

/// Attributes the following entries to a system query option, or to none.
pub fn log_option(key: Option<&str>) {
    with_current(|log| log.option = key.map(str::to_string));
}

/// Appends an entry. `entry` is only evaluated while a log is collected.
pub fn log_entry(entry: impl FnOnce() -> DebugEntryKind) {
    with_current(|log| {
        let entry = DebugEntry {
            phase: log.stage.phase(),
            stage: log.stage,
            option: log.option.clone(),
            elapsed_us: u64::try_from(log.clock.elapsed().as_micros()).unwrap_or(u64::MAX),
            kind: entry(),
        };
        log.entries.push(entry);
    });
}

#[derive(Serialize)]
pub struct DebugLog {
    pub(super) started_at: String,
    pub(super) version: String,
    pub(super) entries: Vec<DebugEntry>,

    #[serde(skip)]
    clock: Instant,
    #[serde(skip)]
    stage: Stage,
    #[serde(skip)]
    option: Option<String>,
}

impl DebugLog {
    pub fn entries_len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Serialize)]
pub(super) struct DebugEntry {
    phase: &'static str,
    stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    option: Option<String>,
    elapsed_us: u64,
    kind: DebugEntryKind,
}

#[derive(Serialize)]
pub enum DebugEntryKind {
    /// The query options as given, joined into one string.
    ReprSource(String),
    ReprLr(lr::Tokens),
    ReprPr(Vec<pr::Expr>),
    ReprIr(ir::Query),
    ReprSql(String),
    ReprOData(String),
    Message(Message),
}

#[derive(Serialize)]
pub struct Message {
    pub level: String,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lexer,
    Parser,
    /// Reading system query options into the IR.
    Options,
    Lowering,
    Sql,
    OData,
}

impl Stage {
    /// The compiler phase a stage belongs to.
    pub fn phase(&self) -> &'static str {
        match self {
            Stage::Lexer | Stage::Parser => "parsing",
            Stage::Options | Stage::Lowering => "semantic",
            Stage::Sql | Stage::OData => "format",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_entry_is_lazy() {
        // no test of this crate starts a log
        log_entry(|| panic!("evaluated without a log"));
        log_stage(Stage::Sql);
        assert!(!log_is_enabled());
        assert!(log_finish().is_none());
    }

    #[test]
    fn test_stage() {
        assert_eq!(Stage::Parser.phase(), "parsing");
        assert_eq!(Stage::Lowering.phase(), "semantic");
        assert_eq!(Stage::OData.phase(), "format");
        assert_eq!(serde_json::to_value(Stage::Options).unwrap(), "options");
    }
}
