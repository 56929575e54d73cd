//! Declarative rule-based validators.

use super::Validator;
use async_trait::async_trait;
use regex::Regex;

type Check<Q> = Box<dyn Fn(&Q) -> Vec<String> + Send + Sync>;

/// A validator assembled from per-field rules.
///
/// Each rule contributes its message when its check fails, so one pass
/// reports every violation.
///
/// ```rust,ignore
/// let rules = RuleSet::<CreateProduct>::new()
///     .not_empty(|p| p.name.as_str(), "Product name is required.")
///     .max_len(|p| p.name.as_str(), 150, "Product name must not exceed 150 characters.")
///     .rule(|p| p.price > 0.0, "Price must be greater than zero.");
/// ```
pub struct RuleSet<Q> {
    checks: Vec<Check<Q>>,
}

impl<Q: 'static> RuleSet<Q> {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Adds a rule that fails when `check` returns false.
    #[must_use]
    pub fn rule<F>(mut self, check: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Q) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        self.checks.push(Box::new(move |request| {
            if check(request) {
                Vec::new()
            } else {
                vec![message.clone()]
            }
        }));
        self
    }

    /// Requires a string field to contain non-whitespace text.
    #[must_use]
    pub fn not_empty<F>(self, field: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Q) -> &str + Send + Sync + 'static,
    {
        self.rule(move |request| !field(request).trim().is_empty(), message)
    }

    /// Caps a string field's length in characters.
    #[must_use]
    pub fn max_len<F>(self, field: F, max: usize, message: impl Into<String>) -> Self
    where
        F: Fn(&Q) -> &str + Send + Sync + 'static,
    {
        self.rule(move |request| field(request).chars().count() <= max, message)
    }

    /// Requires a string field to match a pattern.
    #[must_use]
    pub fn matches<F>(self, field: F, pattern: Regex, message: impl Into<String>) -> Self
    where
        F: Fn(&Q) -> &str + Send + Sync + 'static,
    {
        self.rule(move |request| pattern.is_match(field(request)), message)
    }

    /// Requires a value to lie within `min..=max`.
    #[must_use]
    pub fn range<N, F>(self, field: F, min: N, max: N, message: impl Into<String>) -> Self
    where
        N: PartialOrd + Send + Sync + 'static,
        F: Fn(&Q) -> N + Send + Sync + 'static,
    {
        self.rule(
            move |request| {
                let value = field(request);
                value >= min && value <= max
            },
            message,
        )
    }

    /// Applies `rules` to every element of a collection field.
    #[must_use]
    pub fn each<I, F>(mut self, items: F, rules: RuleSet<I>) -> Self
    where
        I: 'static,
        F: Fn(&Q) -> &[I] + Send + Sync + 'static,
    {
        self.checks.push(Box::new(move |request| {
            items(request)
                .iter()
                .flat_map(|item| rules.check(item))
                .collect()
        }));
        self
    }

    /// Runs every rule and returns the violation messages in rule order.
    #[must_use]
    pub fn check(&self, request: &Q) -> Vec<String> {
        self.checks.iter().flat_map(|check| check(request)).collect()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl<Q: 'static> Default for RuleSet<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> std::fmt::Debug for RuleSet<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.checks.len())
            .finish()
    }
}

#[async_trait]
impl<Q: Send + Sync + 'static> Validator<Q> for RuleSet<Q> {
    async fn validate(&self, request: &Q) -> Vec<String> {
        self.check(request)
    }
}
