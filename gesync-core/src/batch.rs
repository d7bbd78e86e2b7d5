//! Per-item outcomes of a batched remote operation.
//!
//! A batch is not atomic: every item succeeds or fails on its own, and the
//! caller inspects the report after the whole batch has completed.

/// Result of one delete/insert inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The operation succeeded. Carries the remote id when one is known.
    Ok { id: Option<String> },
    /// The target was already deleted (HTTP 410). Counts as success.
    AlreadyGone { id: Option<String> },
    /// The operation failed; the rest of the batch is unaffected.
    Failed {
        id: Option<String>,
        status: u16,
        message: String,
    },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ItemOutcome::Failed { .. })
    }
}

/// Collected outcomes of one logical operation (possibly several HTTP batches).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gone_counts_as_success() {
        let report = BatchReport {
            outcomes: vec![
                ItemOutcome::Ok { id: Some("a".into()) },
                ItemOutcome::AlreadyGone { id: Some("b".into()) },
                ItemOutcome::Failed {
                    id: Some("c".into()),
                    status: 403,
                    message: "Forbidden".into(),
                },
            ],
        };

        assert_eq!(report.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().count(), 1);
    }
}
