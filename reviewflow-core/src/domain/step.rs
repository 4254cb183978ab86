//! Step domain types
//!
//! A pipeline is a fixed sequence of stages. Each executed stage produces
//! exactly one [`StepResult`], which is immutable once built.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Identifier of a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Ingestion,
    Transform,
    QualityTest,
}

impl StageName {
    /// Execution order of the stages
    pub const ORDER: [StageName; 3] = [
        StageName::Ingestion,
        StageName::Transform,
        StageName::QualityTest,
    ];

    /// Stable identifier used in summaries and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Ingestion => "ingestion",
            StageName::Transform => "transform",
            StageName::QualityTest => "quality_test",
        }
    }

    /// Position of the stage in [`StageName::ORDER`]
    pub fn position(&self) -> usize {
        match self {
            StageName::Ingestion => 0,
            StageName::Transform => 1,
            StageName::QualityTest => 2,
        }
    }

    /// Abort policy applied when no explicit policy is configured
    ///
    /// Ingestion and transform produce the data every later stage reads, so a
    /// failure there stops the run. Quality checks only observe data that is
    /// already materialized.
    pub fn default_policy(&self) -> StagePolicy {
        match self {
            StageName::Ingestion | StageName::Transform => StagePolicy::Blocking,
            StageName::QualityTest => StagePolicy::NonBlocking,
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a failed stage does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePolicy {
    /// A failure halts the run and fails it
    Blocking,
    /// A failure is recorded but the run continues
    NonBlocking,
}

/// Outcome of one stage, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepOutcome {
    Success,
    /// Completed, but with an issue that does not block the pipeline
    Warning,
    Failed,
}

impl StepOutcome {
    /// The more severe of two outcomes
    pub fn worst(self, other: StepOutcome) -> StepOutcome {
        self.max(other)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed)
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepOutcome::Success => write!(f, "Success"),
            StepOutcome::Warning => write!(f, "Warning"),
            StepOutcome::Failed => write!(f, "Failed"),
        }
    }
}

/// Result of executing one stage
///
/// Fields are private: the outcome is fixed when the value is built and
/// there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    name: StageName,
    outcome: StepOutcome,
    message: String,
    #[serde(rename = "duration_secs", with = "duration_secs")]
    duration: Duration,
    #[serde(default)]
    detail: JsonValue,
}

impl StepResult {
    pub fn new(name: StageName, outcome: StepOutcome, message: impl Into<String>) -> Self {
        Self {
            name,
            outcome,
            message: message.into(),
            duration: Duration::ZERO,
            detail: JsonValue::Null,
        }
    }

    pub fn success(name: StageName, message: impl Into<String>) -> Self {
        Self::new(name, StepOutcome::Success, message)
    }

    pub fn warning(name: StageName, message: impl Into<String>) -> Self {
        Self::new(name, StepOutcome::Warning, message)
    }

    pub fn failed(name: StageName, message: impl Into<String>) -> Self {
        Self::new(name, StepOutcome::Failed, message)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_detail(mut self, detail: JsonValue) -> Self {
        self.detail = detail;
        self
    }

    /// Returns the same result attributed to another stage
    pub fn relabel(mut self, name: StageName) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> StageName {
        self.name
    }

    pub fn outcome(&self) -> StepOutcome {
        self.outcome
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn detail(&self) -> &JsonValue {
        &self.detail
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_matches_positions() {
        for (idx, stage) in StageName::ORDER.iter().enumerate() {
            assert_eq!(stage.position(), idx);
        }
    }

    #[test]
    fn test_default_policies() {
        assert_eq!(StageName::Ingestion.default_policy(), StagePolicy::Blocking);
        assert_eq!(StageName::Transform.default_policy(), StagePolicy::Blocking);
        assert_eq!(
            StageName::QualityTest.default_policy(),
            StagePolicy::NonBlocking
        );
    }

    #[test]
    fn test_outcome_worst() {
        assert_eq!(
            StepOutcome::Success.worst(StepOutcome::Warning),
            StepOutcome::Warning
        );
        assert_eq!(
            StepOutcome::Failed.worst(StepOutcome::Warning),
            StepOutcome::Failed
        );
        assert_eq!(
            StepOutcome::Success.worst(StepOutcome::Success),
            StepOutcome::Success
        );
    }

    #[test]
    fn test_step_result_serializes_duration_as_seconds() {
        let step = StepResult::success(StageName::QualityTest, "ok")
            .with_duration(Duration::from_millis(1500))
            .with_detail(serde_json::json!({"restaurant_count": 20}));

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["name"], "quality_test");
        assert_eq!(json["outcome"], "Success");
        assert_eq!(json["duration_secs"], 1.5);
        assert_eq!(json["detail"]["restaurant_count"], 20);

        let back: StepResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let json = serde_json::json!({
            "name": "ingestion",
            "outcome": "Failed",
            "message": "x",
            "duration_secs": -1.0
        });
        assert!(serde_json::from_value::<StepResult>(json).is_err());
    }
}
