//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use linefind_protocol::{Query, QueryResult};

/// High-level client for linefind.
///
/// Each query opens its own connection.
#[derive(Debug, Clone)]
pub struct Client {
    config: ConnectionConfig,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Asks the server whether `text` is a line of its file.
    ///
    /// Queries longer than the server's read buffer are rejected here,
    /// since the server would only see a truncated prefix.
    pub async fn query(&self, text: &str) -> Result<QueryResult, ClientError> {
        let query = Query::new(text)?;
        let mut conn = Connection::open(&self.config).await?;

        let result = match conn.send_query(&query).await {
            Ok(()) => conn.read_response().await,
            Err(e) => Err(e),
        };
        conn.close().await;

        tracing::debug!("Query {:?} -> {:?}", query.as_str(), result);
        result
    }
}
