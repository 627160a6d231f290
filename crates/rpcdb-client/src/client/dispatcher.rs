//! Request dispatch
//!
//! A call registers a pending entry with the correlator, writes the request
//! envelope to the connection and waits for the matching response. The
//! response's `result` is returned as is; an `error` member turns into
//! [`Error::Server`] carrying the request that caused it.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::value::RawValue;

use super::core::{Client, ClientInner};
use super::session::Link;
use crate::error::{Error, Result};

/// Successful outcome of one request.
#[derive(Debug)]
pub(crate) struct Reply {
    /// The response's `result` member, `null` when absent
    pub(crate) result: Value,
    /// The request envelope that was sent
    pub(crate) request: String,
}

impl ClientInner {
    /// Sends one request on `link` and waits for its response.
    ///
    /// Used both for caller requests and for the scoping call during setup,
    /// which is why it takes the link instead of calling `ensure_ready`.
    pub(crate) async fn dispatch_on(
        &self,
        link: &Link,
        method: &str,
        params: Option<&RawValue>,
    ) -> Result<Reply> {
        let mut pending = self
            .correlator
            .register(link.connection, method, params)?;
        tracing::debug!(
            "Sending request {} ({}) on connection #{}",
            pending.id(),
            method,
            link.connection
        );

        if let Err(e) = link.transport.send(pending.request().to_string()).await {
            let error = Error::from(e);
            self.correlator.reject(pending.id(), error.clone());
            return Err(error);
        }

        let response = match self.config.request_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, pending.wait())
                .await
                .map_err(|_| {
                    tracing::warn!(
                        "Request {} ({}) timed out after {:?}",
                        pending.id(),
                        method,
                        timeout
                    );
                    Error::Timeout {
                        method: method.to_string(),
                        timeout,
                    }
                })??,
            None => pending.wait().await?,
        };

        if let Some(error) = response.error {
            tracing::debug!("Request {} ({}) failed: {}", pending.id(), method, error);
            return Err(Error::Server {
                message: error.message.clone(),
                error,
                request: pending.request().to_string(),
            });
        }

        Ok(Reply {
            result: response.result.unwrap_or(Value::Null),
            request: pending.request().to_string(),
        })
    }

    /// Ensures a ready connection, then dispatches on it.
    pub(crate) async fn dispatch(&self, method: &str, params: Option<&RawValue>) -> Result<Reply> {
        let link = self.ensure_ready().await?;
        self.dispatch_on(&link, method, params).await
    }
}

impl Client {
    /// Sends a request and returns the response's `result`.
    ///
    /// `params`, when given, must be JSON text; it is placed into the request
    /// envelope verbatim. The connection is created (and scoped) on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParams`] if `params` is not valid JSON
    /// - [`Error::Transport`] if the connection cannot be opened or is lost
    ///   before the response arrives
    /// - [`Error::Server`] if the response carries an `error` member
    pub async fn send(&self, method: &str, params: Option<&str>) -> Result<Value> {
        let params = params
            .map(|text| {
                RawValue::from_string(text.to_string())
                    .map_err(|e| Error::InvalidParams(e.to_string()))
            })
            .transpose()?;

        let reply = self.inner.dispatch(method, params.as_deref()).await?;
        Ok(reply.result)
    }

    /// Sends a request with serializable params and deserializes the result.
    pub async fn request<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::value::to_raw_value(params)?;
        let reply = self.inner.dispatch(method, Some(&params)).await?;
        serde_json::from_value(reply.result)
            .map_err(|e| Error::UnexpectedResponse(format!("{method}: {e}")))
    }
}
