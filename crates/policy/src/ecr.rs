use iacscan_core::{CheckCategory, CheckOutcome, CheckResult, Diagnostic, ResourceCheck};
use serde_json::Value as Json;
use tracing::{error, info};

use crate::document::{is_empty_value, PolicyText, Statement, WildcardAt};
use crate::vars::VariablePattern;

const STATEMENT_KEY: &str = "Properties/RepositoryPolicyText/Statement";

/// Flags ECR repository policies that grant access to `*` without pinning
/// callers to an AWS organization.
pub struct EcrPolicyCheck { vars: &'static VariablePattern }

impl Default for EcrPolicyCheck {
    fn default() -> Self { Self::with_pattern(VariablePattern::serverless()) }
}

impl EcrPolicyCheck {
    pub const ID: &'static str = "CKV_AWS_32";

    pub fn new() -> Self { Self::default() }

    pub fn with_pattern(vars: &'static VariablePattern) -> Self { Self { vars } }

    pub fn evaluate(&self, conf: &Json) -> CheckOutcome {
        let passed = || CheckOutcome::new(CheckResult::Passed, vec![STATEMENT_KEY.to_string()]);

        let Some(props) = conf.get("Properties").and_then(Json::as_object) else {
            return passed();
        };
        let Some(text) = props.get("RepositoryPolicyText").filter(|v| !is_empty_value(v)) else {
            return passed();
        };

        let doc = match PolicyText::from(text).into_document() {
            Ok(doc) => doc,
            Err(unparsed) => {
                let diagnostic = if self.vars.is_match(unparsed.raw) {
                    let d = Diagnostic::info(format!("Encountered variable expression {}", unparsed.raw));
                    info!("{}", d.message);
                    d
                } else {
                    let d = Diagnostic::error(format!("Malformed policy configuration {}: {}", unparsed.raw, unparsed.error));
                    error!("{}", d.message);
                    d
                };
                return CheckOutcome::new(CheckResult::Unknown, vec![STATEMENT_KEY.to_string()])
                    .with_diagnostic(diagnostic);
            }
        };

        let Some(statements) = doc.get("Statement").and_then(Json::as_array) else {
            return passed();
        };
        for (i, statement) in statements.iter().enumerate() {
            let Some(statement) = Statement::from_json(statement) else { continue };
            let Some(principal) = statement.principal() else { continue };
            let Some(at) = principal.block.find_wildcard() else { continue };
            if statement.has_org_constraint() {
                continue;
            }
            let mut key = format!("{}/[{}]/Principal", STATEMENT_KEY, i);
            if principal.via_aws {
                key.push_str("/AWS");
            }
            if let WildcardAt::Index(j) = at {
                key.push_str(&format!("/[{}]/", j));
            }
            return CheckOutcome::new(CheckResult::Failed, vec![key]);
        }
        passed()
    }
}

impl ResourceCheck for EcrPolicyCheck {
    fn id(&self) -> &str { Self::ID }
    fn name(&self) -> &str { "Ensure ECR policy is not set to public" }
    fn categories(&self) -> &[CheckCategory] { &[CheckCategory::GeneralSecurity] }
    fn supported_resources(&self) -> &[&str] { &["AWS::ECR::Repository"] }
    fn scan_resource_conf(&self, conf: &Json) -> CheckOutcome { self.evaluate(conf) }
}
