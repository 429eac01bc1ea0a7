//! Prompt constants and the deterministic evaluation prompt builder.

use crate::models::reference::ScoredDocument;

/// System prompt for the evaluation call — enforces JSON-only output.
pub const EVALUATION_SYSTEM: &str =
    "You are an expert AI HR assistant screening candidates for a backend developer position. \
    You evaluate a candidate based on their CV and project report, \
    using the provided reference documents as the absolute ground truth. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Evaluation prompt template.
/// Replace: `{context}`, `{cv_text}`, `{report_text}`
const EVALUATION_PROMPT_TEMPLATE: &str = r#"Evaluate the candidate below against the reference documents.

Return ONLY a valid JSON object with this EXACT schema (no extra fields):
{
  "cv_match_rate": float (0.0 to 1.0),
  "cv_feedback": "string",
  "project_score": float (1.0 to 5.0),
  "project_feedback": "string",
  "overall_summary": "3-5 sentence summary"
}

--- CONTEXT DOCUMENTS ---
{context}
--- CANDIDATE CV ---
{cv_text}
--- CANDIDATE PROJECT REPORT ---
{report_text}"#;

/// Pure string construction: context, CV and report sections in that order.
/// An empty context slice yields an empty context section, never a
/// fabricated placeholder. Nothing is truncated here.
pub fn build_evaluation_prompt(
    context: &[ScoredDocument],
    cv_text: &str,
    report_text: &str,
) -> String {
    let context_block = context
        .iter()
        .map(|doc| format!("--- DOCUMENT: {} ---\n{}", doc.doc_type, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    EVALUATION_PROMPT_TEMPLATE
        .replace("{context}", &context_block)
        .replace("{cv_text}", cv_text)
        .replace("{report_text}", report_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reference::DocType;

    fn docs() -> Vec<ScoredDocument> {
        vec![
            ScoredDocument {
                content: "Position: Backend Developer.".to_string(),
                doc_type: DocType::JobDescription,
                score: 0.9,
            },
            ScoredDocument {
                content: "CV Evaluation Rubric.".to_string(),
                doc_type: DocType::ScoringRubric,
                score: 0.8,
            },
        ]
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_evaluation_prompt(&docs(), "cv text", "report text");
        let b = build_evaluation_prompt(&docs(), "cv text", "report text");
        assert_eq!(a, b);
    }

    #[test]
    fn test_sections_appear_in_order() {
        let prompt = build_evaluation_prompt(&docs(), "THE CV", "THE REPORT");
        let ctx = prompt.find("--- CONTEXT DOCUMENTS ---").unwrap();
        let cv = prompt.find("--- CANDIDATE CV ---").unwrap();
        let report = prompt.find("--- CANDIDATE PROJECT REPORT ---").unwrap();
        assert!(ctx < cv && cv < report);
        assert!(prompt.contains("THE CV"));
        assert!(prompt.contains("THE REPORT"));
    }

    #[test]
    fn test_context_documents_are_labelled() {
        let prompt = build_evaluation_prompt(&docs(), "cv", "report");
        assert!(prompt.contains("--- DOCUMENT: job_description ---"));
        assert!(prompt.contains("--- DOCUMENT: scoring_rubric ---"));
    }

    #[test]
    fn test_empty_context_yields_empty_section() {
        let prompt = build_evaluation_prompt(&[], "cv", "report");
        assert!(prompt.contains("--- CONTEXT DOCUMENTS ---\n\n--- CANDIDATE CV ---"));
        assert!(!prompt.contains("--- DOCUMENT:"));
    }
}
