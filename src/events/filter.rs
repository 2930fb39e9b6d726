//! Per-entity stream filters.
//!
//! Event lines are single-line `tag:value` pair records. A filter scopes
//! matching to lines pertaining to one specific entity: every token must
//! appear as a whitespace-separated word in the line. An empty filter
//! matches every line of the host's stream.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    tokens: Vec<String>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    pub fn matches(&self, line: &str) -> bool {
        self.tokens
            .iter()
            .all(|token| line.split_whitespace().any(|word| word == token))
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Display for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}
