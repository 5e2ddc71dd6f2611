use regex::Regex;
use std::sync::LazyLock;

/// Serverless Framework variable syntax, e.g. `${self:custom.policy}`.
pub const SLS_DEFAULT_VAR_PATTERN: &str = r"\$\{([^{}]+?)\}";

static SLS_DEFAULT: LazyLock<VariablePattern> = LazyLock::new(|| {
    VariablePattern::new(SLS_DEFAULT_VAR_PATTERN).expect("valid serverless variable pattern")
});

/// Recognizes values that a later templating stage will substitute.
/// Matches are anchored at the start of the value only.
#[derive(Debug, Clone)]
pub struct VariablePattern { source: String, re: Regex }

impl VariablePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self { source: pattern.to_string(), re })
    }

    pub fn serverless() -> &'static VariablePattern { &SLS_DEFAULT }

    pub fn as_str(&self) -> &str { &self.source }

    pub fn is_match(&self, value: &str) -> bool { self.re.is_match(value) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("${self:custom.policy}", true)]
    #[case("${opt:stage}-repo", true)]
    #[case("${file(./policy.json)}", true)]
    #[case("prefix-${self:custom.policy}", false)]
    #[case("${}", false)]
    #[case("{not valid json", false)]
    #[case("", false)]
    fn serverless_pattern_matches_prefix_only(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(VariablePattern::serverless().is_match(value), expected);
    }

    #[test]
    fn custom_pattern_keeps_its_source() {
        let p = VariablePattern::new(r"\{\{[a-z]+\}\}").unwrap();
        assert_eq!(p.as_str(), r"\{\{[a-z]+\}\}");
        assert!(p.is_match("{{policy}}"));
        assert!(!p.is_match("${self:custom.policy}"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(VariablePattern::new("(unclosed").is_err());
    }
}
