use crate::error::StepError;
use crate::step::{parse_step, Step, StepKind};

/// Steps collected by the macro editor before the macro is saved.
#[derive(Debug, Clone, Default)]
pub struct MacroDraft {
    steps: Vec<Step>,
}

impl MacroDraft {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Parses and appends one step; the draft is untouched on error.
    pub fn add(&mut self, kind: StepKind, raw_value: &str) -> Result<&Step, StepError> {
        let step = parse_step(kind, raw_value)?;
        self.steps.push(step);
        Ok(&self.steps[self.steps.len() - 1])
    }

    /// Out-of-range indexes are ignored.
    pub fn remove(&mut self, index: usize) -> Option<Step> {
        if index < self.steps.len() {
            Some(self.steps.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Hands the steps over and leaves the draft empty.
    pub fn take(&mut self) -> Vec<Step> {
        std::mem::take(&mut self.steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.steps.iter().map(Step::describe).collect()
    }
}
