use serde::{Deserialize, Serialize};

/// Structured output of one evaluation job. All five fields are mandatory;
/// a missing or out-of-range field is a pipeline failure, never a partial
/// result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// How well the CV matches the job description, 0.0 to 1.0.
    pub cv_match_rate: f64,
    pub cv_feedback: String,
    /// Project report score against the rubric, 1.0 to 5.0.
    pub project_score: f64,
    pub project_feedback: String,
    pub overall_summary: String,
}

impl EvaluationResult {
    /// Checks score ranges and non-empty feedback. Returns the first
    /// violation as a human-readable reason.
    pub fn validate(&self) -> Result<(), String> {
        if !self.cv_match_rate.is_finite() || !(0.0..=1.0).contains(&self.cv_match_rate) {
            return Err(format!(
                "cv_match_rate {} outside [0, 1]",
                self.cv_match_rate
            ));
        }
        if !self.project_score.is_finite() || !(1.0..=5.0).contains(&self.project_score) {
            return Err(format!("project_score {} outside [1, 5]", self.project_score));
        }
        if self.cv_feedback.trim().is_empty() {
            return Err("cv_feedback is empty".to_string());
        }
        if self.project_feedback.trim().is_empty() {
            return Err("project_feedback is empty".to_string());
        }
        if self.overall_summary.trim().is_empty() {
            return Err("overall_summary is empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_result() -> EvaluationResult {
        EvaluationResult {
            cv_match_rate: 0.82,
            cv_feedback: "Strong backend skills, light on NoSQL.".to_string(),
            project_score: 4.5,
            project_feedback: "Clean, containerized, well documented.".to_string(),
            overall_summary: "A solid candidate for the role.".to_string(),
        }
    }

    #[test]
    fn test_valid_result_passes() {
        assert!(valid_result().validate().is_ok());
    }

    #[test]
    fn test_range_boundaries_are_inclusive() {
        let mut r = valid_result();
        r.cv_match_rate = 0.0;
        r.project_score = 1.0;
        assert!(r.validate().is_ok());
        r.cv_match_rate = 1.0;
        r.project_score = 5.0;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_cv_match_rate_out_of_range_rejected() {
        let mut r = valid_result();
        r.cv_match_rate = 1.2;
        assert!(r.validate().is_err());
        r.cv_match_rate = -0.1;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_project_score_out_of_range_rejected() {
        let mut r = valid_result();
        r.project_score = 0.5;
        assert!(r.validate().is_err());
        r.project_score = 5.5;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let mut r = valid_result();
        r.project_score = f64::NAN;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_empty_feedback_rejected() {
        let mut r = valid_result();
        r.cv_feedback = "   ".to_string();
        assert!(r.validate().is_err());

        let mut r = valid_result();
        r.project_feedback = String::new();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_missing_field_fails_deserialization() {
        let json = r#"{
            "cv_match_rate": 0.8,
            "cv_feedback": "ok",
            "project_score": 4.0,
            "project_feedback": "ok"
        }"#;
        let result: Result<EvaluationResult, _> = serde_json::from_str(json);
        assert!(result.is_err(), "missing overall_summary must fail to parse");
    }
}
