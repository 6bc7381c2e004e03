//! Version-segment substitution for qualified message names.
//!
//! A qualified name such as `com.google.fhir.r5.core.Patient` carries exactly
//! one version segment (`.r5.`). Its *reference identity* is the same name
//! with that segment replaced by the baseline token, which is how a message
//! finds its counterpart in the reference index.

use regex::{NoExpand, Regex};

/// Pattern matching a version segment together with its surrounding dots.
pub const DEFAULT_VERSION_PATTERN: &str = r"\.r[0-9]*\.";

/// Version token of the baseline package.
pub const DEFAULT_BASELINE_TOKEN: &str = "r4";

/// Derives reference identities from qualified names.
///
/// # Examples
///
/// ```
/// use protogen_core::ReferenceNaming;
///
/// let naming = ReferenceNaming::default();
/// assert_eq!(
///     naming.reference_identity("com.google.fhir.r5.core.Patient").as_deref(),
///     Some("com.google.fhir.r4.core.Patient"),
/// );
/// assert_eq!(naming.reference_identity("com.example.Patient"), None);
/// ```
#[derive(Debug, Clone)]
pub struct ReferenceNaming {
    pattern: Regex,
    baseline_token: String,
}

impl ReferenceNaming {
    /// Creates a naming rule from a version-segment pattern and a baseline
    /// token.
    ///
    /// The pattern must match the whole segment including its separating
    /// dots; the match is replaced with `.<baseline_token>.`.
    ///
    /// # Errors
    ///
    /// Returns the regex error when `pattern` does not compile.
    pub fn new(pattern: &str, baseline_token: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            baseline_token: baseline_token.into(),
        })
    }

    /// Returns the baseline token (e.g. `"r4"`).
    pub fn baseline_token(&self) -> &str {
        &self.baseline_token
    }

    /// Returns `qualified` with its first version segment replaced by the
    /// baseline token, or `None` when the name has no version segment.
    pub fn reference_identity(&self, qualified: &str) -> Option<String> {
        if !self.pattern.is_match(qualified) {
            return None;
        }
        let segment = format!(".{}.", self.baseline_token);
        Some(
            self.pattern
                .replace(qualified, NoExpand(&segment))
                .into_owned(),
        )
    }
}

impl Default for ReferenceNaming {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_VERSION_PATTERN).expect("static regex must compile"),
            baseline_token: DEFAULT_BASELINE_TOKEN.to_string(),
        }
    }
}
