//! Pipeline construction errors.

use thiserror::Error;

/// Errors raised while assembling a pipeline or kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Two middleware claim the same stage.
    #[error("stage '{stage}' is registered more than once")]
    DuplicateStage {
        /// Name of the contested stage.
        stage: &'static str,
    },

    /// A component the kernel needs was not provided.
    #[error("missing pipeline component: {0}")]
    MissingComponent(&'static str),
}

impl PipelineError {
    /// Creates a duplicate-stage error.
    #[must_use]
    pub const fn duplicate_stage(stage: &'static str) -> Self {
        Self::DuplicateStage { stage }
    }

    /// Creates a missing-component error.
    #[must_use]
    pub const fn missing_component(component: &'static str) -> Self {
        Self::MissingComponent(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            PipelineError::duplicate_stage("routing").to_string(),
            "stage 'routing' is registered more than once"
        );
        assert_eq!(
            PipelineError::missing_component("router").to_string(),
            "missing pipeline component: router"
        );
    }
}
