use serde::{Deserialize, Serialize};

/// Kind of ground-truth artifact held in the reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    JobDescription,
    CaseStudyBrief,
    ScoringRubric,
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DocType::JobDescription => "job_description",
            DocType::CaseStudyBrief => "case_study_brief",
            DocType::ScoringRubric => "scoring_rubric",
        };
        f.write_str(name)
    }
}

/// A ground-truth document stored in the vector index. Immutable once
/// ingested; the whole reference set is replaced on each ingest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDocument {
    pub content: String,
    pub doc_type: DocType,
    pub embedding: Vec<f32>,
}

/// A reference document returned by a similarity search, with its score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub content: String,
    pub doc_type: DocType,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DocType::JobDescription).unwrap(),
            "\"job_description\""
        );
        assert_eq!(DocType::ScoringRubric.to_string(), "scoring_rubric");
    }
}
