//! Election definition submitted to the backend.
//!
//! The backend takes the definition as a JSON string blob (`electionJson`);
//! its nested structure is opaque to the transport.

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// An immutable election definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// First height (logical time unit) at which the election is open.
    pub start: u32,
    /// Last height of the voting window.
    pub end: u32,
    /// Whether ballots must carry a signature.
    pub need_sig: bool,
    pub name: String,
    pub questions: Vec<Question>,
}

/// One question. `index` is zero-based and equals the position in the list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub index: u32,
    pub title: String,
    pub subtitle: Option<String>,
    /// Public address attached to the question, when the caller has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub choices: Vec<Choice>,
}

/// A group of selectable answers within a question.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub answers: Vec<String>,
}

impl Choice {
    /// An untitled choice over the given answers.
    pub fn answers<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: None,
            subtitle: None,
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl ElectionSpec {
    pub fn builder(name: impl Into<String>) -> ElectionSpecBuilder {
        ElectionSpecBuilder {
            spec: ElectionSpec {
                start: 0,
                end: 0,
                need_sig: false,
                name: name.into(),
                questions: Vec::new(),
            },
        }
    }

    /// The three-question election the scale test submits by default.
    pub fn reference() -> Self {
        Self::builder("Test Election")
            .window(3_155_000, 3_169_000)
            .need_sig(true)
            .question_with_address(
                "Q1. What is your favorite color?",
                "zcv1re3za92mksd4hga0xw6rwxlklkxsqe9nuqqtdws8mu7cynd6gee74863uq4s9aze6q2zywze20y",
                ["Red", "Green", "Blue"],
            )
            .question_with_address(
                "Q2. Is the earth flat?",
                "zcv1panzgdd6kyygjqtykys6snl9sy59tdnhrpmezdamlt0umxcgs3z4mrndy7eajpkpxerry7tvccv",
                ["Yes", "No"],
            )
            .question_with_address(
                "Q3. Do you like pizza?",
                "zcv1yk6u9k8t6087ru4vsjfzepfw9yhhgpnua27r74wmqyqetn35663c62tnfzw46vqqtu2g54jwqt8",
                ["Yes", "No"],
            )
            .build()
    }

    /// Serialize to the JSON blob expected by `storeElection`.
    pub fn to_wire(&self) -> Result<String, TypesError> {
        serde_json::to_string(self).map_err(|e| TypesError::Serialization(e.to_string()))
    }

    /// Parse an election definition from JSON (e.g. a file on disk).
    pub fn from_json(json: &str) -> Result<Self, TypesError> {
        serde_json::from_str(json).map_err(|e| TypesError::Serialization(e.to_string()))
    }

    /// Report the first structural problem, if any.
    ///
    /// Construction never validates; this is for callers loading
    /// definitions they did not build themselves.
    pub fn check(&self) -> Result<(), TypesError> {
        if self.questions.is_empty() {
            return Err(TypesError::InvalidElection("no questions".into()));
        }
        if self.start > self.end {
            return Err(TypesError::InvalidElection(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        for (position, question) in self.questions.iter().enumerate() {
            if question.index as usize != position {
                return Err(TypesError::InvalidElection(format!(
                    "question at position {position} has index {}",
                    question.index
                )));
            }
            if question.choices.is_empty() {
                return Err(TypesError::InvalidElection(format!(
                    "question {position} has no choices"
                )));
            }
            if question.choices.iter().any(|c| c.answers.is_empty()) {
                return Err(TypesError::InvalidElection(format!(
                    "question {position} has a choice without answers"
                )));
            }
        }
        Ok(())
    }
}

/// Builder that assigns contiguous question indices.
#[derive(Debug)]
pub struct ElectionSpecBuilder {
    spec: ElectionSpec,
}

impl ElectionSpecBuilder {
    pub fn window(mut self, start: u32, end: u32) -> Self {
        self.spec.start = start;
        self.spec.end = end;
        self
    }

    pub fn need_sig(mut self, need_sig: bool) -> Self {
        self.spec.need_sig = need_sig;
        self
    }

    /// Append a question with a single untitled choice.
    pub fn question<I, S>(self, title: impl Into<String>, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(title.into(), None, vec![Choice::answers(answers)])
    }

    pub fn question_with_address<I, S>(
        self,
        title: impl Into<String>,
        address: impl Into<String>,
        answers: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(
            title.into(),
            Some(address.into()),
            vec![Choice::answers(answers)],
        )
    }

    /// Append a question with explicit choices.
    pub fn question_with_choices(self, title: impl Into<String>, choices: Vec<Choice>) -> Self {
        self.push(title.into(), None, choices)
    }

    fn push(mut self, title: String, address: Option<String>, choices: Vec<Choice>) -> Self {
        let index = self.spec.questions.len() as u32;
        self.spec.questions.push(Question {
            index,
            title,
            subtitle: Some(String::new()),
            address,
            choices,
        });
        self
    }

    pub fn build(self) -> ElectionSpec {
        self.spec
    }
}
