//! Query and response message types.

use crate::error::ProtocolError;
use crate::{MAX_QUERY_BYTES, RESPONSE_EXISTS, RESPONSE_NOT_FOUND};
use std::fmt;

/// A single query received from a client.
///
/// The text is whatever arrived in one read, minus NUL padding. No other
/// normalization is applied: whitespace and newlines are part of the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Query(String);

impl Query {
    /// Creates a query to send, rejecting text the server would truncate.
    pub fn new(text: impl Into<String>) -> Result<Self, ProtocolError> {
        let text = text.into();
        if text.len() > MAX_QUERY_BYTES {
            return Err(ProtocolError::QueryTooLarge {
                size: text.len(),
                max: MAX_QUERY_BYTES,
            });
        }
        Ok(Self(text))
    }

    /// Decodes the bytes of a single server-side read.
    ///
    /// Only the first [`MAX_QUERY_BYTES`] bytes are considered. Leading and
    /// trailing NUL bytes are stripped; interior NULs are kept.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let bytes = &buf[..buf.len().min(MAX_QUERY_BYTES)];
        let text = std::str::from_utf8(bytes)?;
        Ok(Self(text.trim_matches('\0').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of matching a query against the line set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryResult {
    /// The query equals at least one line.
    Exists,
    /// The query equals no line.
    NotFound,
}

impl QueryResult {
    pub fn from_found(found: bool) -> Self {
        if found {
            QueryResult::Exists
        } else {
            QueryResult::NotFound
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryResult::Exists)
    }

    /// Returns the response text without its line terminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryResult::Exists => RESPONSE_EXISTS,
            QueryResult::NotFound => RESPONSE_NOT_FOUND,
        }
    }

    /// Returns the exact bytes written to the wire, newline included.
    pub fn encode(&self) -> &'static [u8] {
        match self {
            QueryResult::Exists => b"STRING EXISTS\n",
            QueryResult::NotFound => b"STRING NOT FOUND\n",
        }
    }

    /// Parses a response line as sent by the server.
    ///
    /// A single trailing `\n` or `\r\n` is accepted.
    pub fn parse_response(line: &str) -> Result<Self, ProtocolError> {
        let trimmed = line
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or(line);
        match trimmed {
            "" => Err(ProtocolError::EmptyResponse),
            RESPONSE_EXISTS => Ok(QueryResult::Exists),
            RESPONSE_NOT_FOUND => Ok(QueryResult::NotFound),
            other => Err(ProtocolError::UnexpectedResponse(other.to_string())),
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_strips_nul_padding() {
        let mut buf = [0u8; 16];
        buf[..5].copy_from_slice(b"alpha");
        let query = Query::decode(&buf).unwrap();
        assert_eq!(query.as_str(), "alpha");

        let query = Query::decode(b"\0\0beta\0").unwrap();
        assert_eq!(query.as_str(), "beta");
    }

    #[test]
    fn test_decode_keeps_interior_nul_and_whitespace() {
        let query = Query::decode(b"a\0b \n").unwrap();
        assert_eq!(query.as_str(), "a\0b \n");
    }

    #[test]
    fn test_decode_all_nul_is_empty() {
        let query = Query::decode(&[0u8; 64]).unwrap();
        assert!(query.is_empty());
        assert!(Query::decode(b"").unwrap().is_empty());
    }

    #[test]
    fn test_decode_truncates_to_buffer_size() {
        let buf = vec![b'x'; MAX_QUERY_BYTES + 100];
        let query = Query::decode(&buf).unwrap();
        assert_eq!(query.len(), MAX_QUERY_BYTES);
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let result = Query::decode(&[0xff, 0xfe, b'a']);
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_new_rejects_oversized_query() {
        assert!(Query::new("x".repeat(MAX_QUERY_BYTES)).is_ok());
        let err = Query::new("x".repeat(MAX_QUERY_BYTES + 1)).unwrap_err();
        assert!(err.to_string().contains("query too large"));
    }

    #[test]
    fn test_response_bytes() {
        assert_eq!(QueryResult::Exists.encode(), b"STRING EXISTS\n");
        assert_eq!(QueryResult::NotFound.encode(), b"STRING NOT FOUND\n");
        assert_eq!(
            QueryResult::Exists.encode(),
            format!("{}\n", RESPONSE_EXISTS).as_bytes()
        );
        assert_eq!(
            QueryResult::NotFound.encode(),
            format!("{}\n", RESPONSE_NOT_FOUND).as_bytes()
        );
    }

    #[test]
    fn test_parse_response() {
        assert_eq!(
            QueryResult::parse_response("STRING EXISTS\n").unwrap(),
            QueryResult::Exists
        );
        assert_eq!(
            QueryResult::parse_response("STRING NOT FOUND\r\n").unwrap(),
            QueryResult::NotFound
        );
        assert!(matches!(
            QueryResult::parse_response(""),
            Err(ProtocolError::EmptyResponse)
        ));
        assert!(matches!(
            QueryResult::parse_response("STRING MAYBE\n"),
            Err(ProtocolError::UnexpectedResponse(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_decode_ignores_trailing_padding(text in "[^\\x00]{0,200}", pad in 0usize..64) {
            let mut buf = text.clone().into_bytes();
            buf.extend(std::iter::repeat(0u8).take(pad));
            let query = Query::decode(&buf).unwrap();
            prop_assert_eq!(query.as_str(), text.as_str());
        }
    }
}
