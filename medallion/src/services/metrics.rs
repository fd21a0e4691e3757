use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;

/// Last lifecycle point a batch run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Started,
    BronzeLoaded,
    SilverWritten,
    GoldWritten,
    Completed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Started => "started",
            RunStage::BronzeLoaded => "bronze_loaded",
            RunStage::SilverWritten => "silver_written",
            RunStage::GoldWritten => "gold_written",
            RunStage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Why a run failed and how far it got first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub stage: RunStage,
    pub message: String,
}

/// Summary of one batch run.
///
/// A failed run reports `errors = 1` with both record counts zeroed, whatever
/// progress was made; `stage` and `failure` say where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub batch_id: String,
    pub records_in: usize,
    pub records_out: usize,
    pub duration_seconds: f64,
    pub errors: u32,
    pub stage: RunStage,
    pub failure: Option<RunFailure>,
}

impl PipelineMetrics {
    /// Gold rows as a percentage of bronze rows.
    pub fn success_rate(&self) -> f64 {
        if self.records_in == 0 {
            return 0.0;
        }
        self.records_out as f64 / self.records_in as f64 * 100.0
    }

    /// Bronze rows per second.
    pub fn throughput(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }
        self.records_in as f64 / self.duration_seconds
    }

    /// Flat JSON record of the run, as logged on completion.
    pub fn to_json(&self) -> Value {
        json!({
            "batch_id": self.batch_id,
            "records_in": self.records_in,
            "records_out": self.records_out,
            "duration_seconds": self.duration_seconds,
            "errors": self.errors,
            "success_rate": self.success_rate(),
            "throughput": self.throughput(),
            "stage": self.stage,
            "failure": self.failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(records_in: usize, records_out: usize, duration_seconds: f64) -> PipelineMetrics {
        PipelineMetrics {
            batch_id: "20260220_100000".to_string(),
            records_in,
            records_out,
            duration_seconds,
            errors: 0,
            stage: RunStage::Completed,
            failure: None,
        }
    }

    #[test]
    fn test_zero_guards() {
        let m = metrics(0, 0, 0.0);

        assert_eq!(m.success_rate(), 0.0);
        assert_eq!(m.throughput(), 0.0);
    }

    #[test]
    fn test_derived_rates() {
        let m = metrics(200, 50, 4.0);

        assert_eq!(m.success_rate(), 25.0);
        assert_eq!(m.throughput(), 50.0);
    }

    #[test]
    fn test_to_json_includes_rates_and_failure() {
        let mut m = metrics(10, 5, 1.0);
        m.errors = 1;
        m.stage = RunStage::BronzeLoaded;
        m.failure = Some(RunFailure {
            stage: RunStage::BronzeLoaded,
            message: "disk full".to_string(),
        });

        let json = m.to_json();

        assert_eq!(json["success_rate"], 50.0);
        assert_eq!(json["stage"], "bronze_loaded");
        assert_eq!(json["failure"]["message"], "disk full");
        assert_eq!(json["errors"], 1);
    }
}
