//! Per-statement outcomes of a batched query.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one statement inside a `query` response.
///
/// The server answers a batched query with an array of these, one per
/// statement, in statement order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum StatementOutcome {
    /// The statement succeeded.
    #[serde(rename = "OK")]
    Ok {
        /// Statement result, `null` for statements that produce none
        #[serde(default)]
        result: Value,
        /// Execution time as reported by the server
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<String>,
    },
    /// The statement failed.
    #[serde(rename = "ERR")]
    Err {
        /// Error message reported for the statement
        #[serde(rename = "result", alias = "detail")]
        message: String,
        /// Execution time as reported by the server
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<String>,
    },
}

impl StatementOutcome {
    /// Returns the error message if the statement failed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Err { message, .. } => Some(message),
        }
    }

    /// Consumes the outcome and returns the statement result, if it succeeded.
    pub fn into_result(self) -> Option<Value> {
        match self {
            Self::Ok { result, .. } => Some(result),
            Self::Err { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_outcomes_parse_in_order() {
        let outcomes: Vec<StatementOutcome> = serde_json::from_value(json!([
            {"status": "OK", "time": "10µs", "result": [{"id": "person:1"}]},
            {"status": "ERR", "time": "2µs", "result": "Parse error on line 1"},
            {"status": "OK"}
        ]))
        .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].error_message(), None);
        assert_eq!(outcomes[1].error_message(), Some("Parse error on line 1"));
        assert_eq!(outcomes[2].clone().into_result(), Some(Value::Null));
    }

    #[test]
    fn test_error_detail_alias() {
        let outcome: StatementOutcome =
            serde_json::from_value(json!({"status": "ERR", "detail": "bad table"})).unwrap();
        assert_eq!(outcome.error_message(), Some("bad table"));
        assert_eq!(outcome.into_result(), None);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let parsed = serde_json::from_value::<StatementOutcome>(json!({"status": "MAYBE"}));
        assert!(parsed.is_err());
    }
}
