//! Candidate model list

use std::sync::Arc;

use thiserror::Error;

/// Errors building a [`CandidateModels`] list
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CandidateError {
    /// No candidates at all
    #[error("candidate model list is empty")]
    Empty,

    /// An identifier is empty or whitespace
    #[error("candidate model at position {0} is blank")]
    Blank(usize),

    /// The same identifier appears twice
    #[error("duplicate candidate model: {0}")]
    Duplicate(String),
}

/// Ordered, immutable list of upstream model identifiers
///
/// Earlier entries are preferred. Cloning is cheap (shared storage).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateModels(Arc<[String]>);

impl CandidateModels {
    /// Build a candidate list, trimming each identifier
    ///
    /// # Errors
    ///
    /// Rejects an empty list, blank identifiers and duplicates.
    pub fn new<I, S>(models: I) -> Result<Self, CandidateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for (position, model) in models.into_iter().enumerate() {
            let model = model.as_ref().trim();
            if model.is_empty() {
                return Err(CandidateError::Blank(position));
            }
            if list.iter().any(|m| m == model) {
                return Err(CandidateError::Duplicate(model.to_string()));
            }
            list.push(model.to_string());
        }

        if list.is_empty() {
            return Err(CandidateError::Empty);
        }
        Ok(Self(list.into()))
    }

    /// Parse a comma-separated list (`"m-a, m-b"`)
    ///
    /// # Errors
    ///
    /// Same rules as [`CandidateModels::new`].
    pub fn parse_list(list: &str) -> Result<Self, CandidateError> {
        Self::new(list.split(','))
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in preference order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Borrow as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for CandidateModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}
