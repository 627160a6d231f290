//! Batched queries
//!
//! A `query` request carries a statement string (possibly several statements)
//! and optional bound variables. The server answers with one outcome per
//! statement. If any statement failed the whole call fails, with every
//! per-statement message joined by `;`, even when other statements succeeded.

use rpcdb_protocol::{QUERY_METHOD, StatementOutcome};
use serde_json::Value;
use serde_json::value::to_raw_value;

use super::core::Client;
use crate::error::{Error, Result};

impl Client {
    /// Runs a batched query and returns one result per statement.
    ///
    /// ```rust,ignore
    /// let results = client
    ///     .query("SELECT * FROM person WHERE age > $min", Some(json!({"min": 18})))
    ///     .await?;
    /// ```
    ///
    /// Statements that produce no result still occupy their slot, as `null`.
    ///
    /// # Errors
    ///
    /// [`Error::Batch`] if any statement failed; otherwise the same errors as
    /// [`Client::send`].
    pub async fn query(&self, statement: &str, vars: Option<Value>) -> Result<Vec<Value>> {
        let params = match vars {
            Some(vars) => to_raw_value(&(statement, vars))?,
            None => to_raw_value(&[statement])?,
        };

        let reply = self.inner.dispatch(QUERY_METHOD, Some(&params)).await?;
        normalize_batch(reply.result, &reply.request)
    }
}

/// Turns a `query` result into per-statement values, or one aggregated error.
pub(crate) fn normalize_batch(result: Value, request: &str) -> Result<Vec<Value>> {
    let outcomes: Vec<StatementOutcome> = serde_json::from_value(result)
        .map_err(|e| Error::UnexpectedResponse(format!("query result: {e}")))?;

    let messages: Vec<String> = outcomes
        .iter()
        .filter_map(StatementOutcome::error_message)
        .map(str::to_string)
        .collect();

    if !messages.is_empty() {
        tracing::debug!(
            "{} of {} statements failed",
            messages.len(),
            outcomes.len()
        );
        return Err(Error::Batch {
            messages,
            request: request.to_string(),
        });
    }

    Ok(outcomes
        .into_iter()
        .filter_map(StatementOutcome::into_result)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const REQUEST: &str = r#"{"id":3,"method":"query","params":["SELECT 1; SELECT bogus;"]}"#;

    #[test]
    fn test_all_statements_succeed() {
        let values = normalize_batch(
            json!([
                {"status": "OK", "time": "5µs", "result": [1]},
                {"status": "OK", "time": "1µs"},
                {"status": "OK", "result": [{"name": "ada"}]}
            ]),
            REQUEST,
        )
        .unwrap();

        assert_eq!(values, vec![json!([1]), Value::Null, json!([{"name": "ada"}])]);
    }

    #[test]
    fn test_one_failure_fails_the_batch() {
        let err = normalize_batch(
            json!([
                {"status": "OK", "result": [1]},
                {"status": "ERR", "result": "There was a problem with the database: bogus"}
            ]),
            REQUEST,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "There was a problem with the database: bogus");
        assert_eq!(err.request(), Some(REQUEST));
    }

    #[test]
    fn test_failures_join_in_statement_order() {
        let err = normalize_batch(
            json!([
                {"status": "ERR", "result": "first"},
                {"status": "OK", "result": []},
                {"status": "ERR", "result": "third"}
            ]),
            REQUEST,
        )
        .unwrap_err();

        match err {
            Error::Batch { messages, .. } => assert_eq!(messages, vec!["first", "third"]),
            other => panic!("expected batch error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(normalize_batch(json!([]), REQUEST).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn test_non_array_result_is_unexpected() {
        let err = normalize_batch(json!({"status": "OK"}), REQUEST).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }
}
