//! Request and response bodies of the chat API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of `GET /health`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Assistant reply from `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub disclaimer: String,
    /// Messages the server holds for this session
    #[serde(default)]
    pub conversation_length: usize,
}

/// One symptom-checker question
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    /// `text`, `choice`, `scale`, `multiselect` or `number`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionSet {
    pub questions: Vec<Question>,
}

/// Response of `POST /start_assessment`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssessmentStart {
    #[serde(default)]
    pub message: String,
    pub question: Question,
    pub total_questions: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerRequest<'a> {
    pub question_id: &'a str,
    pub answer: &'a Value,
}

/// Emergency warning raised by the symptom checker
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmergencyNotice {
    pub keyword: String,
    pub message: String,
    #[serde(default)]
    pub action: String,
}

/// What happened after submitting an answer
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnswerOutcome {
    /// Ask the next question
    Continue {
        question: Question,
        #[serde(default)]
        progress: f64,
        /// 1-based position of `question`
        current: usize,
        total: usize,
    },
    /// Every question has been answered
    Complete {
        #[serde(default)]
        answers: Map<String, Value>,
    },
    /// The main symptom needs emergency care; stop the assessment
    Emergency { emergency: EmergencyNotice },
}

#[derive(Debug, Serialize)]
pub(crate) struct DiagnosisRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<&'a Map<String, Value>>,
}

/// Differential diagnosis from `POST /get_diagnosis`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Diagnosis {
    pub diagnosis: String,
    #[serde(default)]
    pub disclaimer: String,
    #[serde(default)]
    pub patient_summary: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answer_outcome_by_status() {
        let cont: AnswerOutcome = serde_json::from_value(json!({
            "status": "continue",
            "question": { "id": "duration", "question": "When?", "type": "choice",
                          "options": ["1-3 days ago"], "required": true },
            "progress": 0.14,
            "current": 2,
            "total": 7
        }))
        .unwrap();
        assert!(matches!(cont, AnswerOutcome::Continue { current: 2, total: 7, .. }));

        let done: AnswerOutcome = serde_json::from_value(json!({
            "status": "complete",
            "message": "All questions answered",
            "answers": { "main_symptom": "headache" }
        }))
        .unwrap();
        match done {
            AnswerOutcome::Complete { answers } => {
                assert_eq!(answers["main_symptom"], "headache");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let emergency: AnswerOutcome = serde_json::from_value(json!({
            "status": "emergency",
            "emergency": { "detected": true, "keyword": "chest pain",
                           "message": "Call 911", "action": "CALL 911 OR GO TO ER" }
        }))
        .unwrap();
        assert!(matches!(
            emergency,
            AnswerOutcome::Emergency { emergency } if emergency.keyword == "chest pain"
        ));
    }

    #[test]
    fn test_diagnosis_request_omits_missing_answers() {
        let body = serde_json::to_value(DiagnosisRequest { answers: None }).unwrap();
        assert_eq!(body, json!({}));
    }
}
