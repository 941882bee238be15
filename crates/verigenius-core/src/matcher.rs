use crate::types::StudentRecord;

/// Name comparison policy for identity matching.
///
/// Historical deployments drifted between comparing both names
/// case-insensitively and comparing the last name byte-exact against its
/// upper-cased storage form. The policy is an explicit choice here so the
/// behavior cannot drift silently again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Lower-case both sides of both names before comparing. Default.
    #[default]
    CaseInsensitiveBoth,
    /// Legacy behavior: first name case-insensitive, last name byte-exact.
    CaseInsensitiveFirstExactLast,
}

impl MatchPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CaseInsensitiveBoth => "case_insensitive_both",
            Self::CaseInsensitiveFirstExactLast => "case_insensitive_first_exact_last",
        }
    }
}

/// Decides whether a claimed first/last name pair matches a stored record.
///
/// Comparison is exact after case folding; whitespace and diacritic
/// differences are mismatches. No partial or fuzzy matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMatcher {
    policy: MatchPolicy,
}

impl IdentityMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Both names must match under the configured policy.
    pub fn matches(&self, claimed_first: &str, claimed_last: &str, record: &StudentRecord) -> bool {
        let first_ok = fold(claimed_first) == fold(&record.first_name);
        let last_ok = match self.policy {
            MatchPolicy::CaseInsensitiveBoth => fold(claimed_last) == fold(&record.last_name),
            MatchPolicy::CaseInsensitiveFirstExactLast => claimed_last == record.last_name,
        };
        first_ok && last_ok
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}
