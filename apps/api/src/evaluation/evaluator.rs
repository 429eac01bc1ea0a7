//! Evaluator — one generative call, then tolerant parsing and strict
//! validation of the structured result.

use crate::evaluation::pipeline::StageError;
use crate::evaluation::prompts::EVALUATION_SYSTEM;
use crate::llm_client::GenerativeModel;
use crate::models::evaluation::EvaluationResult;

/// Invokes the model once and parses its output. No multi-turn negotiation:
/// a malformed response is a failure carrying the raw text for diagnosis.
pub async fn evaluate(
    llm: &dyn GenerativeModel,
    prompt: &str,
) -> Result<EvaluationResult, StageError> {
    let raw = llm
        .generate(prompt, EVALUATION_SYSTEM)
        .await
        .map_err(|e| StageError::Generation(e.to_string()))?;
    parse_evaluation(&raw)
}

/// Tolerant-parser contract: strict JSON parse first; on failure strip known
/// code-fence wrappers once and retry; then validate ranges and presence.
pub fn parse_evaluation(raw: &str) -> Result<EvaluationResult, StageError> {
    let result = match serde_json::from_str::<EvaluationResult>(raw.trim()) {
        Ok(result) => result,
        Err(_) => {
            let stripped = strip_json_fences(raw);
            serde_json::from_str::<EvaluationResult>(stripped).map_err(|e| {
                StageError::MalformedEvaluation {
                    reason: format!("invalid JSON: {e}"),
                    raw_text: raw.to_string(),
                }
            })?
        }
    };

    result
        .validate()
        .map_err(|reason| StageError::MalformedEvaluation {
            reason,
            raw_text: raw.to_string(),
        })?;

    Ok(result)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_JSON: &str = r#"{
        "cv_match_rate": 0.85,
        "cv_feedback": "Strong match on backend skills.",
        "project_score": 4.0,
        "project_feedback": "Meets the brief, clean structure.",
        "overall_summary": "A capable backend candidate."
    }"#;

    #[test]
    fn test_plain_json_parses() {
        let result = parse_evaluation(VALID_JSON).unwrap();
        assert!((result.cv_match_rate - 0.85).abs() < f64::EPSILON);
        assert!((result.project_score - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fenced_json_parses() {
        let fenced = format!("```json\n{VALID_JSON}\n```");
        assert!(parse_evaluation(&fenced).is_ok());

        let bare_fence = format!("```\n{VALID_JSON}\n```");
        assert!(parse_evaluation(&bare_fence).is_ok());
    }

    #[test]
    fn test_invalid_json_is_malformed_with_raw_attached() {
        let err = parse_evaluation("the model rambled instead").unwrap_err();
        match err {
            StageError::MalformedEvaluation { raw_text, .. } => {
                assert_eq!(raw_text, "the model rambled instead");
            }
            other => panic!("expected MalformedEvaluation, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = parse_evaluation(r#"{"cv_match_rate": 0.5}"#).unwrap_err();
        assert!(matches!(err, StageError::MalformedEvaluation { .. }));
    }

    #[test]
    fn test_out_of_range_is_malformed() {
        let json = VALID_JSON.replace("0.85", "1.5");
        let err = parse_evaluation(&json).unwrap_err();
        match err {
            StageError::MalformedEvaluation { reason, .. } => {
                assert!(reason.contains("cv_match_rate"), "reason: {reason}");
            }
            other => panic!("expected MalformedEvaluation, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_feedback_is_malformed() {
        let json = VALID_JSON.replace("Strong match on backend skills.", "");
        assert!(parse_evaluation(&json).is_err());
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }
}
