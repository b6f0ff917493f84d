//! Token-budget-aware grouping of snippets into backend requests.

/// Decides whether a snippet is too trivial to spend a backend request on.
pub trait SkipFilter: Send + Sync {
    /// Returns true if `input` should never be sent to the backend.
    fn should_skip(&self, input: &str) -> bool;
}

/// Default skip filter.
///
/// Skips snippets that are empty, whitespace-only, contain no alphanumeric
/// character, or have fewer than `min_significant_chars` non-whitespace
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrivialInputFilter {
    /// Minimum non-whitespace characters for a snippet to be worth a request.
    pub min_significant_chars: usize,
}

impl Default for TrivialInputFilter {
    fn default() -> Self {
        Self {
            min_significant_chars: crate::config::DEFAULT_MIN_SIGNIFICANT_CHARS,
        }
    }
}

impl SkipFilter for TrivialInputFilter {
    fn should_skip(&self, input: &str) -> bool {
        let mut significant = 0usize;
        let mut has_alphanumeric = false;
        for c in input.chars().filter(|c| !c.is_whitespace()) {
            significant += 1;
            has_alphanumeric |= c.is_alphanumeric();
        }
        significant == 0 || !has_alphanumeric || significant < self.min_significant_chars
    }
}

impl<F> SkipFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn should_skip(&self, input: &str) -> bool {
        self(input)
    }
}

/// Rough model-token estimate: 1.5 tokens per whitespace-separated word.
#[must_use]
pub fn estimate_tokens(input: &str) -> usize {
    input.split_whitespace().count() * 3 / 2
}

/// An ordered, non-empty set of item indices sent as one backend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGroup {
    indices: Vec<usize>,
    estimated_tokens: usize,
}

impl BatchGroup {
    /// Member indices in order.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always false; groups are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Summed estimated token cost of the members.
    #[must_use]
    pub const fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }
}

/// Grouping of one outer chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPlan {
    /// Groups to dispatch, in order.
    pub groups: Vec<BatchGroup>,
    /// Indices excluded by the skip filter.
    pub skipped: Vec<usize>,
}

/// Greedy single-pass packing of `(index, cost)` pairs under `budget`.
///
/// A group closes when the next item would push it past `budget`. An item
/// whose own cost exceeds the budget becomes a singleton group. Order is
/// preserved within and across groups.
#[must_use]
pub fn group_by_token_counts<I>(items: I, budget: usize) -> Vec<BatchGroup>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut groups = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_tokens = 0usize;

    for (index, cost) in items {
        if !current.is_empty() && current_tokens.saturating_add(cost) > budget {
            groups.push(BatchGroup {
                indices: std::mem::take(&mut current),
                estimated_tokens: current_tokens,
            });
            current_tokens = 0;
        }
        current.push(index);
        current_tokens = current_tokens.saturating_add(cost);
    }

    if !current.is_empty() {
        groups.push(BatchGroup {
            indices: current,
            estimated_tokens: current_tokens,
        });
    }

    groups
}

/// Filters and groups `inputs` (indexed by position) under `budget`.
#[must_use]
pub fn plan_groups<S: AsRef<str>>(
    inputs: &[S],
    filter: &dyn SkipFilter,
    budget: usize,
) -> GroupPlan {
    let mut skipped = Vec::new();
    let mut costed = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let input = input.as_ref();
        if filter.should_skip(input) {
            skipped.push(index);
        } else {
            costed.push((index, estimate_tokens(input)));
        }
    }

    GroupPlan {
        groups: group_by_token_counts(costed, budget),
        skipped,
    }
}
