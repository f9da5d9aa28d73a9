use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Raw stdin payload for the run; scalar or array, forwarded verbatim
    /// to the code-execution collaborator.
    pub input: serde_json::Value,
    pub expected: String,
}

/// Immutable question definition. Created at config time, read-only during
/// a session. `expected_answer` is the scoring reference and must never be
/// exposed to candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub description: String,
    pub examples: Vec<Example>,
    pub constraints: Vec<String>,
    pub test_cases: Vec<TestCase>,
    pub expected_answer: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub starter_code: String,
}

fn default_language() -> String {
    "python".to_string()
}

/// Candidate-facing view: everything the test UI renders, minus the
/// scoring reference.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub description: String,
    pub examples: Vec<Example>,
    pub constraints: Vec<String>,
    pub test_cases: Vec<TestCase>,
    pub language: String,
    pub starter_code: String,
}

impl Question {
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            title: self.title.clone(),
            difficulty: self.difficulty,
            description: self.description.clone(),
            examples: self.examples.clone(),
            constraints: self.constraints.clone(),
            test_cases: self.test_cases.clone(),
            language: self.language.clone(),
            starter_code: self.starter_code.clone(),
        }
    }
}

/// Load a catalog from a JSON file, or fall back to the built-in set.
pub fn load_catalog(path: Option<&str>) -> Result<Vec<Question>, SessionError> {
    let questions = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(Path::new(path))
                .map_err(|e| SessionError::InvalidCatalog(format!("{}: {}", path, e)))?;
            serde_json::from_str::<Vec<Question>>(&raw)
                .map_err(|e| SessionError::InvalidCatalog(format!("{}: {}", path, e)))?
        }
        None => builtin_catalog(),
    };
    validate_catalog(&questions)?;
    Ok(questions)
}

fn validate_catalog(questions: &[Question]) -> Result<(), SessionError> {
    if questions.is_empty() {
        return Err(SessionError::InvalidCatalog(
            "catalog contains no questions".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for q in questions {
        if q.id.trim().is_empty() {
            return Err(SessionError::InvalidCatalog(
                "question with empty id".to_string(),
            ));
        }
        if !seen.insert(q.id.as_str()) {
            return Err(SessionError::InvalidCatalog(format!(
                "duplicate question id: {}",
                q.id
            )));
        }
    }
    Ok(())
}

/// Default two-question assessment shipped with the engine.
pub fn builtin_catalog() -> Vec<Question> {
    vec![
        Question {
            id: "question_1".to_string(),
            title: "Two Sum".to_string(),
            difficulty: Difficulty::Medium,
            description: "Given an array of integers nums and an integer target, return \
                          indices of the two numbers such that they add up to target. You \
                          may assume that each input would have exactly one solution, and \
                          you may not use the same element twice."
                .to_string(),
            examples: vec![
                Example {
                    input: "nums = [2,7,11,15], target = 9".to_string(),
                    output: "[0,1]".to_string(),
                    explanation: "Because nums[0] + nums[1] == 9, we return [0, 1].".to_string(),
                },
                Example {
                    input: "nums = [3,2,4], target = 6".to_string(),
                    output: "[1,2]".to_string(),
                    explanation: "Because nums[1] + nums[2] == 6, we return [1, 2].".to_string(),
                },
            ],
            constraints: vec![
                "2 <= nums.length <= 10^4".to_string(),
                "-10^9 <= nums[i] <= 10^9".to_string(),
                "-10^9 <= target <= 10^9".to_string(),
                "Only one valid answer exists".to_string(),
            ],
            test_cases: vec![
                TestCase {
                    input: serde_json::json!([[2, 7, 11, 15], 9]),
                    expected: "[0,1]".to_string(),
                },
                TestCase {
                    input: serde_json::json!([[3, 2, 4], 6]),
                    expected: "[1,2]".to_string(),
                },
                TestCase {
                    input: serde_json::json!([[3, 3], 6]),
                    expected: "[0,1]".to_string(),
                },
            ],
            expected_answer: "[0,1]".to_string(),
            language: "python".to_string(),
            starter_code: "def twoSum(nums, target):\n    # Write your solution here\n    pass"
                .to_string(),
        },
        Question {
            id: "question_2".to_string(),
            title: "Reverse String".to_string(),
            difficulty: Difficulty::Easy,
            description: "Write a function that reverses a string. The input string is given \
                          as an array of characters s. You must do this by modifying the \
                          input array in-place with O(1) extra memory."
                .to_string(),
            examples: vec![
                Example {
                    input: "s = [\"h\",\"e\",\"l\",\"l\",\"o\"]".to_string(),
                    output: "[\"o\",\"l\",\"l\",\"e\",\"h\"]".to_string(),
                    explanation: "The string is reversed in place.".to_string(),
                },
                Example {
                    input: "s = [\"H\",\"a\",\"n\",\"n\",\"a\",\"h\"]".to_string(),
                    output: "[\"h\",\"a\",\"n\",\"n\",\"a\",\"H\"]".to_string(),
                    explanation: "The string is reversed in place.".to_string(),
                },
            ],
            constraints: vec![
                "1 <= s.length <= 10^5".to_string(),
                "s[i] is a printable ascii character".to_string(),
            ],
            test_cases: vec![
                TestCase {
                    input: serde_json::json!([["h", "e", "l", "l", "o"]]),
                    expected: "o,l,l,e,h".to_string(),
                },
                TestCase {
                    input: serde_json::json!([["H", "a", "n", "n", "a", "h"]]),
                    expected: "h,a,n,n,a,H".to_string(),
                },
            ],
            expected_answer: "o,l,l,e,h".to_string(),
            language: "python".to_string(),
            starter_code:
                "def reverseString(s):\n    # Write your solution here\n    pass".to_string(),
        },
    ]
}
