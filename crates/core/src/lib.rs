use serde::{Serialize, Deserialize};
use serde_json::Value as Json;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::error_span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckResult { Passed, Failed, Unknown }

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckResult::Passed => "PASSED",
            CheckResult::Failed => "FAILED",
            CheckResult::Unknown => "UNKNOWN",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckCategory { GeneralSecurity }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity { Info, Error }

/// A note a check raises about its input without turning it into a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic { pub severity: Severity, pub message: String }

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self { Self { severity: Severity::Info, message: message.into() } }
    pub fn error(message: impl Into<String>) -> Self { Self { severity: Severity::Error, message: message.into() } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub result: CheckResult,
    pub evaluated_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl CheckOutcome {
    pub fn new(result: CheckResult, evaluated_keys: Vec<String>) -> Self {
        Self { result, evaluated_keys, diagnostic: None }
    }
    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }
}

pub trait ResourceCheck: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn categories(&self) -> &[CheckCategory];
    fn supported_resources(&self) -> &[&str];
    fn scan_resource_conf(&self, conf: &Json) -> CheckOutcome;

    fn supports(&self, resource_type: &str) -> bool {
        self.supported_resources().iter().any(|r| *r == resource_type)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("check '{0}' is already registered")]
    DuplicateCheck(String),
}

/// One check's verdict on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub check_id: String,
    pub check_name: String,
    pub file: String,
    pub resource: String,
    pub resource_type: String,
    pub result: CheckResult,
    pub evaluated_keys: Vec<String>,
}

#[derive(Default)]
pub struct CheckRegistry { checks: Vec<Box<dyn ResourceCheck>> }

impl CheckRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, check: Box<dyn ResourceCheck>) -> Result<(), CoreError> {
        if self.checks.iter().any(|c| c.id() == check.id()) {
            return Err(CoreError::DuplicateCheck(check.id().to_string()));
        }
        self.checks.push(check);
        Ok(())
    }

    pub fn checks(&self) -> impl Iterator<Item = &dyn ResourceCheck> {
        self.checks.iter().map(|c| c.as_ref())
    }

    pub fn checks_for<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a dyn ResourceCheck> + 'a {
        self.checks().filter(move |c| c.supports(resource_type))
    }

    pub fn skip(&mut self, ids: &BTreeSet<String>) {
        self.checks.retain(|c| !ids.contains(c.id()));
    }

    pub fn only(&mut self, ids: &BTreeSet<String>) {
        self.checks.retain(|c| ids.contains(c.id()));
    }

    pub fn scan_resource(&self, file: &str, logical_id: &str, resource_type: &str, conf: &Json) -> Vec<Record> {
        let entity = format!("{}/{}", file, logical_id);
        let mut out = Vec::new();
        for check in self.checks_for(resource_type) {
            // must stay enabled under the default warn filter
            let span = error_span!("check", id = check.id(), entity = %entity);
            let _enter = span.enter();
            let outcome = check.scan_resource_conf(conf);
            out.push(Record {
                check_id: check.id().to_string(),
                check_name: check.name().to_string(),
                file: file.to_string(),
                resource: logical_id.to_string(),
                resource_type: resource_type.to_string(),
                result: outcome.result,
                evaluated_keys: outcome.evaluated_keys,
            });
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary { pub passed: usize, pub failed: usize, pub unknown: usize }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport { pub records: Vec<Record> }

impl ScanReport {
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) { self.records.extend(records); }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for r in &self.records {
            match r.result {
                CheckResult::Passed => s.passed += 1,
                CheckResult::Failed => s.failed += 1,
                CheckResult::Unknown => s.unknown += 1,
            }
        }
        s
    }

    pub fn has_failures(&self) -> bool { self.records.iter().any(|r| r.result == CheckResult::Failed) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct FixedCheck { id: &'static str, result: CheckResult }

    impl ResourceCheck for FixedCheck {
        fn id(&self) -> &str { self.id }
        fn name(&self) -> &str { "fixed" }
        fn categories(&self) -> &[CheckCategory] { &[CheckCategory::GeneralSecurity] }
        fn supported_resources(&self) -> &[&str] { &["AWS::S3::Bucket"] }
        fn scan_resource_conf(&self, _conf: &Json) -> CheckOutcome {
            CheckOutcome::new(self.result, vec!["Properties".to_string()])
        }
    }

    fn registry() -> CheckRegistry {
        let mut reg = CheckRegistry::new();
        reg.register(Box::new(FixedCheck { id: "A", result: CheckResult::Passed })).unwrap();
        reg.register(Box::new(FixedCheck { id: "B", result: CheckResult::Failed })).unwrap();
        reg
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut reg = registry();
        let err = reg.register(Box::new(FixedCheck { id: "A", result: CheckResult::Unknown })).unwrap_err();
        assert_eq!(err, CoreError::DuplicateCheck("A".to_string()));
    }

    #[test]
    fn dispatches_by_resource_type_in_registration_order() {
        let reg = registry();
        let recs = reg.scan_resource("t.yaml", "Bucket", "AWS::S3::Bucket", &json!({}));
        let ids: Vec<_> = recs.iter().map(|r| r.check_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(reg.scan_resource("t.yaml", "Repo", "AWS::ECR::Repository", &json!({})).is_empty());
    }

    #[test]
    fn skip_and_only_filter_by_id() {
        let ids: BTreeSet<String> = ["B".to_string()].into_iter().collect();
        let mut skipped = registry();
        skipped.skip(&ids);
        assert_eq!(skipped.checks().map(|c| c.id().to_string()).collect::<Vec<_>>(), vec!["A"]);
        let mut only = registry();
        only.only(&ids);
        assert_eq!(only.checks().map(|c| c.id().to_string()).collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn summary_counts_each_verdict() {
        let reg = registry();
        let mut report = ScanReport::default();
        report.extend(reg.scan_resource("t.yaml", "Bucket", "AWS::S3::Bucket", &json!({})));
        assert_eq!(report.summary(), Summary { passed: 1, failed: 1, unknown: 0 });
        assert!(report.has_failures());
    }

    #[test]
    fn verdicts_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&CheckResult::Unknown).unwrap(), "\"UNKNOWN\"");
        assert_eq!(CheckResult::Failed.to_string(), "FAILED");
    }
}
