use serde::{Deserialize, Serialize};

/// Progress message type
#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProgressType {
    Start,
    Progress,
    Complete,
    Error,
}

/// Progress of a convert-all batch, reported after every item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub progress_type: ProgressType,
    /// Number of items finished (either way)
    pub completed_tasks: usize,
    /// Number of eligible items in this batch
    pub total_tasks: usize,
    /// Progress percentage (0-100)
    pub progress_percentage: usize,
    /// Item the update is about
    #[serde(default)]
    pub item_name: Option<String>,
    /// Error message when the item failed
    #[serde(default)]
    pub error: Option<String>,
}

impl BatchProgress {
    pub fn new(progress_type: ProgressType, completed_tasks: usize, total_tasks: usize) -> Self {
        let progress_percentage = if total_tasks > 0 {
            (completed_tasks * 100) / total_tasks
        } else {
            0
        };

        Self {
            progress_type,
            completed_tasks,
            total_tasks,
            progress_percentage,
            item_name: None,
            error: None,
        }
    }

    pub fn with_item(mut self, name: impl Into<String>) -> Self {
        self.item_name = Some(name.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_handles_empty_batches() {
        assert_eq!(BatchProgress::new(ProgressType::Start, 0, 0).progress_percentage, 0);
        assert_eq!(BatchProgress::new(ProgressType::Progress, 1, 3).progress_percentage, 33);
        assert_eq!(BatchProgress::new(ProgressType::Complete, 3, 3).progress_percentage, 100);
    }
}
