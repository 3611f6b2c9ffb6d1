// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path matching against filter rules.
//!
//! A rule selects its own path and everything below it. Prefix matching is
//! __segment-aware__: the rule must end exactly at a path separator of the
//! candidate, so `apps/foo` selects `apps/foo/bar` but never `apps/foobar`.

use crate::filter::FilterRule;

/// Normalize path into rule form.
///
/// Replaces every `\` with `/`, and strips leading and trailing `/`.
pub fn normalize_path(path: impl AsRef<str>) -> String {
    path.as_ref().replace('\\', "/").trim_matches('/').to_owned()
}

/// Match candidate paths to filter rules.
pub trait PathMatcher: Send + Sync + 'static {
    /// Check if candidate path falls under rule.
    fn matches(&self, candidate: &str, rule: &FilterRule) -> bool;

    /// Find first rule that candidate path falls under.
    fn first_match<'r>(
        &self,
        candidate: &str,
        rules: impl IntoIterator<Item = &'r FilterRule>,
    ) -> Option<&'r FilterRule> {
        rules.into_iter().find(|rule| self.matches(candidate, rule))
    }
}

/// Segment-aware prefix matcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct SegmentMatcher;

impl PathMatcher for SegmentMatcher {
    fn matches(&self, candidate: &str, rule: &FilterRule) -> bool {
        let pattern = normalize_path(rule.pattern());

        // INVARIANT: Empty pattern matches nothing.
        //   - Otherwise "" + "/" would make every path a match.
        if pattern.is_empty() {
            return false;
        }

        let candidate = normalize_path(candidate);
        candidate == pattern
            || candidate
                .strip_prefix(pattern.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
