//! Aggregated results read back from the backend.

use serde::{Deserialize, Serialize};

use crate::VoteWeight;

/// One tally line: the weight received by an answer of a (sub-)question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyEntry {
    pub idx_question: u32,
    pub idx_sub_question: u32,
    pub idx_answer: u32,
    pub votes: VoteWeight,
}

/// The backend's aggregation. The driver only confirms it was retrieved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(pub Vec<TallyEntry>);

impl ResultSet {
    pub fn entries(&self) -> &[TallyEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_result_shape() {
        let raw = r#"[
            {"idxQuestion": 1, "idxSubQuestion": 0, "idxAnswer": 1, "votes": "30"},
            {"idxQuestion": 1, "idxSubQuestion": 0, "idxAnswer": 2, "votes": "0.5"}
        ]"#;
        let results: ResultSet = serde_json::from_str(raw).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.entries()[0].votes, VoteWeight::from_whole(30).unwrap());
        assert_eq!(results.entries()[1].votes.to_string(), "0.5");
    }
}
