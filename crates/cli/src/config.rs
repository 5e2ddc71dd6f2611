use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output { #[default] Cli, Json }

/// Scan settings read from `--config`.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    #[serde(default)] pub check: Vec<String>,
    #[serde(default)] pub skip_check: Vec<String>,
    #[serde(default)] pub soft_fail: bool,
    #[serde(default)] pub output: Option<Output>,
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).with_context(|| format!("read config {}", path.display()))?;
        serde_yaml::from_slice(&raw).with_context(|| format!("parse config {}", path.display()))
    }
}

/// Config file values with explicit flags taking precedence.
#[derive(Debug, PartialEq)]
pub struct Effective {
    pub checks: BTreeSet<String>,
    pub skip_checks: BTreeSet<String>,
    pub soft_fail: bool,
    pub output: Output,
}

impl Effective {
    pub fn merge(file: ScanConfig, checks: Vec<String>, skip_checks: Vec<String>, soft_fail: bool, output: Option<Output>) -> Self {
        let pick = |flag: Vec<String>, cfg: Vec<String>| -> BTreeSet<String> {
            if flag.is_empty() { cfg.into_iter().collect() } else { flag.into_iter().collect() }
        };
        Self {
            checks: pick(checks, file.check),
            skip_checks: pick(skip_checks, file.skip_check),
            soft_fail: soft_fail || file.soft_fail,
            output: output.or(file.output).unwrap_or_default(),
        }
    }
}
