// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filter rule parsing.
//!
//! Turn the many ways a caller can describe "what to deploy" into one uniform
//! [`FilterRule`] shape.
//!
//! # Filter Spec Grammar
//!
//! Content packages are deployed through a list of __filter specs__. Each
//! filter spec selects a subtree of the package's content root and says what
//! should happen to the matching subtree of the destination tree. Four
//! syntaxes are recognized:
//!
//! 1. Plain path, e.g., `/apps/site` or `apps/site`. Copies the subtree.
//! 2. Negated path, e.g., `!etc/legacy`. Deletes the subtree from the
//!    destination.
//! 3. Filter tag, e.g., `<filter root="/apps/site"/>`. Copies the subtree
//!    named by the `root` attribute. Single and double quotes both work.
//! 4. Structured pair of path and explicit action, which is what deployment
//!    manifests produce for entries like `{ path = "/apps", action = "delete" }`.
//!
//! Whatever the syntax, the resulting rule path is normalized: no leading or
//! trailing `/`, and `/` as the only separator.
//!
//! # Pitfalls
//!
//! A filter tag without a usable `root` attribute would produce an empty rule
//! path, and an empty rule path would select the entire content root. Such
//! specs are rejected with [`FilterError::InvalidFilterSpec`] instead, so the
//! whole parse fails before anything on disk is touched.

pub mod matcher;

pub use matcher::{normalize_path, PathMatcher, SegmentMatcher};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    sync::LazyLock,
};

/// Prefix marking a filter spec as a deletion.
pub const NEGATION_MARKER: char = '!';

/// Prefix marking a filter spec as a filter tag.
pub const FILTER_TAG_PREFIX: &str = "<filter";

static ROOT_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"root\s*=\s*["']([^"']+)["']"#).expect("root attribute pattern is valid")
});

/// Action to perform on a subtree selected by a filter rule.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    /// Replace destination subtree with package content.
    #[default]
    Copy,

    /// Remove destination subtree.
    #[serde(alias = "deleted")]
    Delete,
}

impl Display for FilterAction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Copy => fmt.write_str("copy"),
            Self::Delete => fmt.write_str("delete"),
        }
    }
}

/// Filter specification as supplied by the caller.
///
/// Raw text is classified exactly once through [`From<&str>`], so nothing
/// past this point ever needs to sniff prefixes again.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "RawFilterSpec", into = "RawFilterSpec")]
pub enum FilterSpec {
    /// Path to copy.
    Plain(String),

    /// Path or filter tag to delete, with the negation marker already
    /// stripped.
    Negated(String),

    /// Filter tag carrying a `root` attribute, kept verbatim.
    Tagged(String),

    /// Path paired with an explicit action.
    Structured { path: String, action: FilterAction },
}

impl FilterSpec {
    /// Construct structured filter spec.
    pub fn structured(path: impl Into<String>, action: FilterAction) -> Self {
        Self::Structured {
            path: path.into(),
            action,
        }
    }

    /// Split newline-delimited text into filter specs.
    ///
    /// Every non-blank line becomes one spec. Surrounding whitespace of each
    /// line is ignored.
    pub fn from_lines(text: impl AsRef<str>) -> Vec<Self> {
        text.as_ref()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Self::from)
            .collect()
    }
}

impl From<&str> for FilterSpec {
    fn from(text: &str) -> Self {
        if let Some(path) = text.strip_prefix(NEGATION_MARKER) {
            Self::Negated(path.to_owned())
        } else if text.starts_with(FILTER_TAG_PREFIX) {
            Self::Tagged(text.to_owned())
        } else {
            Self::Plain(text.to_owned())
        }
    }
}

impl From<String> for FilterSpec {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

impl Display for FilterSpec {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Plain(path) => fmt.write_str(path),
            Self::Negated(path) => write!(fmt, "{NEGATION_MARKER}{path}"),
            Self::Tagged(tag) => fmt.write_str(tag),
            Self::Structured { path, action } => write!(fmt, "{path} ({action})"),
        }
    }
}

/// Serialized layout of a filter spec in deployment manifests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum RawFilterSpec {
    Text(String),
    Structured {
        path: String,
        #[serde(default, alias = "type")]
        action: FilterAction,
    },
}

impl From<RawFilterSpec> for FilterSpec {
    fn from(raw: RawFilterSpec) -> Self {
        match raw {
            RawFilterSpec::Text(text) => Self::from(text),
            RawFilterSpec::Structured { path, action } => Self::Structured { path, action },
        }
    }
}

impl From<FilterSpec> for RawFilterSpec {
    fn from(spec: FilterSpec) -> Self {
        match spec {
            FilterSpec::Structured { path, action } => Self::Structured { path, action },
            text => Self::Text(text.to_string()),
        }
    }
}

/// Normalized filter rule.
///
/// # Invariant
///
/// - Pattern never starts or ends with `/`.
/// - Pattern only uses `/` as separator.
/// - Pattern is never empty, and never contains a `..` segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterRule {
    pattern: String,
    action: FilterAction,
}

impl FilterRule {
    /// Parse filter spec into normalized rule.
    ///
    /// # Errors
    ///
    /// - Return [`FilterError::InvalidFilterSpec`] if filter tag lacks a
    ///   `root` attribute, the path normalizes to nothing, or the path tries
    ///   to climb out of the destination root.
    pub fn parse(spec: &FilterSpec) -> Result<Self> {
        let (raw, action) = match spec {
            FilterSpec::Structured { path, action } => (resolve_tag(path, spec)?, *action),
            FilterSpec::Negated(path) => (resolve_tag(path, spec)?, FilterAction::Delete),
            FilterSpec::Tagged(tag) => (root_attribute(tag, spec)?, FilterAction::Copy),
            FilterSpec::Plain(path) => (path.as_str(), FilterAction::Copy),
        };

        let pattern = normalize_path(raw);
        if pattern.is_empty() {
            return Err(FilterError::invalid(spec, SpecDefect::EmptyPath));
        }

        if pattern.split('/').any(|segment| segment == "..") {
            return Err(FilterError::invalid(spec, SpecDefect::ParentTraversal));
        }

        Ok(Self { pattern, action })
    }

    /// Normalized path pattern relative to content root.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Action to perform on matching subtree.
    pub fn action(&self) -> FilterAction {
        self.action
    }

    /// Check if candidate path falls under this rule.
    pub fn matches(&self, candidate: impl AsRef<str>) -> bool {
        SegmentMatcher.matches(candidate.as_ref(), self)
    }
}

impl TryFrom<&FilterSpec> for FilterRule {
    type Error = FilterError;

    fn try_from(spec: &FilterSpec) -> Result<Self> {
        Self::parse(spec)
    }
}

impl Display for FilterRule {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} {}", self.action, self.pattern)
    }
}

/// Parsed filter rules partitioned by action.
///
/// # Invariant
///
/// - Original ordering is kept within each partition.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterRules {
    copy: Vec<FilterRule>,
    delete: Vec<FilterRule>,
}

impl FilterRules {
    /// Parse every filter spec.
    ///
    /// Parsing is all or nothing: the first malformed spec fails the whole
    /// listing.
    ///
    /// # Errors
    ///
    /// - Return [`FilterError::InvalidFilterSpec`] for the first malformed
    ///   spec.
    pub fn parse<'a>(specs: impl IntoIterator<Item = &'a FilterSpec>) -> Result<Self> {
        let mut rules = Self::default();
        for spec in specs {
            let rule = FilterRule::parse(spec)?;
            match rule.action {
                FilterAction::Copy => rules.copy.push(rule),
                FilterAction::Delete => rules.delete.push(rule),
            }
        }

        Ok(rules)
    }

    /// Rules selecting package content to copy.
    pub fn copy_rules(&self) -> &[FilterRule] {
        self.copy.as_slice()
    }

    /// Rules selecting destination subtrees to delete.
    pub fn delete_rules(&self) -> &[FilterRule] {
        self.delete.as_slice()
    }

    /// Total amount of rules.
    pub fn len(&self) -> usize {
        self.copy.len() + self.delete.len()
    }

    /// Check if there are no rules at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn resolve_tag<'a>(path: &'a str, spec: &FilterSpec) -> Result<&'a str> {
    if path.starts_with(FILTER_TAG_PREFIX) {
        root_attribute(path, spec)
    } else {
        Ok(path)
    }
}

fn root_attribute<'a>(tag: &'a str, spec: &FilterSpec) -> Result<&'a str> {
    ROOT_ATTRIBUTE
        .captures(tag)
        .and_then(|captures| captures.get(1))
        .map(|root| root.as_str())
        .ok_or_else(|| FilterError::invalid(spec, SpecDefect::MissingRoot))
}

/// Reason a filter spec was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecDefect {
    /// Filter tag has no extractable `root` attribute.
    MissingRoot,

    /// Path normalizes to nothing.
    EmptyPath,

    /// Path contains a `..` segment.
    ParentTraversal,
}

impl Display for SpecDefect {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::MissingRoot => fmt.write_str("filter tag has no root attribute"),
            Self::EmptyPath => fmt.write_str("path is empty"),
            Self::ParentTraversal => fmt.write_str("path escapes destination root"),
        }
    }
}

/// Filter parsing error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// Filter spec cannot be turned into a usable rule.
    #[error("invalid filter spec {spec:?}: {defect}")]
    InvalidFilterSpec { spec: String, defect: SpecDefect },
}

impl FilterError {
    fn invalid(spec: &FilterSpec, defect: SpecDefect) -> Self {
        Self::InvalidFilterSpec {
            spec: spec.to_string(),
            defect,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = FilterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("/apps/x", FilterAction::Copy, "apps/x"; "plain with leading slash")]
    #[test_case("apps/x", FilterAction::Copy, "apps/x"; "plain relative")]
    #[test_case("///apps/x/", FilterAction::Copy, "apps/x"; "plain with extra slashes")]
    #[test_case(r"\apps\x\y", FilterAction::Copy, "apps/x/y"; "plain with backslashes")]
    #[test_case("!apps/x", FilterAction::Delete, "apps/x"; "negated relative")]
    #[test_case("!/etc/y", FilterAction::Delete, "etc/y"; "negated with leading slash")]
    #[test_case(r#"<filter root="/apps/x"/>"#, FilterAction::Copy, "apps/x"; "tag double quoted")]
    #[test_case("<filter root='/apps/x'/>", FilterAction::Copy, "apps/x"; "tag single quoted")]
    #[test_case(r#"<filter root = "/conf/site" mode="merge"/>"#, FilterAction::Copy, "conf/site"; "tag with spacing")]
    #[test_case(r#"!<filter root="/apps/x"/>"#, FilterAction::Delete, "apps/x"; "negated tag")]
    #[test]
    fn parse_text_spec(raw: &str, action: FilterAction, pattern: &str) {
        use pretty_assertions::assert_eq;
        let rule = FilterRule::parse(&FilterSpec::from(raw)).unwrap();
        assert_eq!(rule.action(), action);
        assert_eq!(rule.pattern(), pattern);
    }

    #[test_case(r#"<filter mode="merge"/>"#, SpecDefect::MissingRoot; "tag without root")]
    #[test_case(r#"<filter root=""/>"#, SpecDefect::MissingRoot; "tag with empty root")]
    #[test_case("/", SpecDefect::EmptyPath; "only slash")]
    #[test_case("", SpecDefect::EmptyPath; "empty text")]
    #[test_case("!", SpecDefect::EmptyPath; "only negation marker")]
    #[test_case(r#"<filter root="/"/>"#, SpecDefect::EmptyPath; "tag with root slash")]
    #[test_case(r#"!<filter mode="merge"/>"#, SpecDefect::MissingRoot; "negated tag without root")]
    #[test_case("apps/../../etc", SpecDefect::ParentTraversal; "parent traversal")]
    #[test]
    fn reject_malformed_spec(raw: &str, defect: SpecDefect) {
        use pretty_assertions::assert_eq;
        let result = FilterRule::parse(&FilterSpec::from(raw));
        let expect = Err(FilterError::InvalidFilterSpec {
            spec: raw.into(),
            defect,
        });
        assert_eq!(result, expect);
    }

    #[test]
    fn classify_text_spec() {
        assert_eq!(FilterSpec::from("apps/x"), FilterSpec::Plain("apps/x".into()));
        assert_eq!(FilterSpec::from("!apps/x"), FilterSpec::Negated("apps/x".into()));
        assert_eq!(
            FilterSpec::from(r#"<filter root="/a"/>"#),
            FilterSpec::Tagged(r#"<filter root="/a"/>"#.into())
        );
    }

    #[test]
    fn parse_structured_spec() -> anyhow::Result<()> {
        let rule = FilterRule::parse(&FilterSpec::structured("/content/dam", FilterAction::Delete))?;
        assert_eq!(rule.pattern(), "content/dam");
        assert_eq!(rule.action(), FilterAction::Delete);

        let rule = FilterRule::try_from(&FilterSpec::structured(
            r#"<filter root="/apps/x"/>"#,
            FilterAction::Delete,
        ))?;
        assert_eq!(rule.pattern(), "apps/x");
        assert_eq!(rule.action(), FilterAction::Delete);

        Ok(())
    }

    #[test]
    fn split_newline_delimited_specs() {
        let text = indoc! {r#"
            /apps/x

              !etc/y
            <filter root="/conf/z"/>
        "#};
        let result = FilterSpec::from_lines(text);
        let expect = vec![
            FilterSpec::Plain("/apps/x".into()),
            FilterSpec::Negated("etc/y".into()),
            FilterSpec::Tagged(r#"<filter root="/conf/z"/>"#.into()),
        ];
        assert_eq!(result, expect);
    }

    #[test]
    fn partition_mixed_specs() -> anyhow::Result<()> {
        let specs = [
            FilterSpec::from(r#"<filter root="/apps/x"/>"#),
            FilterSpec::from("!etc/y"),
            FilterSpec::from("/conf/z"),
        ];
        let rules = FilterRules::parse(&specs)?;
        let copy = rules
            .copy_rules()
            .iter()
            .map(FilterRule::pattern)
            .collect::<Vec<_>>();
        let delete = rules
            .delete_rules()
            .iter()
            .map(FilterRule::pattern)
            .collect::<Vec<_>>();

        assert_eq!(copy, vec!["apps/x", "conf/z"]);
        assert_eq!(delete, vec!["etc/y"]);
        assert_eq!(rules.len(), 3);

        Ok(())
    }

    #[test]
    fn single_malformed_spec_fails_whole_parse() {
        let specs = [
            FilterSpec::from("/apps/x"),
            FilterSpec::from("<filter/>"),
            FilterSpec::from("!etc/y"),
        ];
        let result = FilterRules::parse(&specs);
        assert!(matches!(
            result,
            Err(FilterError::InvalidFilterSpec {
                defect: SpecDefect::MissingRoot,
                ..
            })
        ));
    }
}
