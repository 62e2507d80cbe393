//! Flows: named collections of steps

use super::step::Step;
use crate::engine::{EngineError, EngineResult};
use std::collections::HashSet;

/// One conversation topic or script
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: String,
    /// Step entered when the flow starts without an explicit step
    pub default_step: String,
    pub steps: Vec<Step>,
}

impl Flow {
    pub fn new(id: impl Into<String>, default_step: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_step: default_step.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn find_step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    /// Check that step ids are unique and the default step exists
    pub fn validate(&self) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(EngineError::DuplicateStep {
                    step: step.id.clone(),
                    flow: self.id.clone(),
                });
            }
        }

        if self.find_step(&self.default_step).is_none() {
            return Err(EngineError::UnknownStep {
                step: self.default_step.clone(),
                flow: self.id.clone(),
            });
        }

        Ok(())
    }
}
