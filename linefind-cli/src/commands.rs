//! Query input and output formatting.

use colored::Colorize;
use linefind_client::ClientError;
use linefind_protocol::QueryResult;
use std::fmt;
use std::io::BufRead;

/// Reads one query per input line.
pub fn read_queries(reader: impl BufRead) -> std::io::Result<Vec<String>> {
    reader.lines().collect()
}

/// Formats an answered query.
pub fn format_answer(query: &str, answer: QueryResult, raw: bool) -> String {
    if raw {
        return answer.to_string();
    }
    let status = match answer {
        QueryResult::Exists => answer.as_str().green(),
        QueryResult::NotFound => answer.as_str().yellow(),
    };
    format!("{:?}: {}", query, status)
}

/// Formats a query that got no answer.
pub fn format_failure(query: &str, error: &ClientError) -> String {
    format!("{:?}: {}: {}", query, "Error".red(), error)
}

/// How a single query ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Found,
    Missing,
    Failed,
}

impl From<&Result<QueryResult, ClientError>> for Outcome {
    fn from(result: &Result<QueryResult, ClientError>) -> Self {
        match result {
            Ok(answer) if answer.is_found() => Outcome::Found,
            Ok(_) => Outcome::Missing,
            Err(_) => Outcome::Failed,
        }
    }
}

/// Tally of a batch of queries.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub found: usize,
    pub missing: usize,
    pub failed: usize,
}

impl Summary {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Found => self.found += 1,
            Outcome::Missing => self.missing += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// 1 if any query failed, 2 if any was not found and `fail_missing` is
    /// set, 0 otherwise.
    pub fn exit_code(&self, fail_missing: bool) -> u8 {
        if self.failed > 0 {
            1
        } else if fail_missing && self.missing > 0 {
            2
        } else {
            0
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} found, {} not found, {} failed",
            self.found, self.missing, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linefind_protocol::ProtocolError;

    #[test]
    fn test_read_queries() {
        let input = "alpha\r\nbeta\n\ngamma";
        let queries = read_queries(input.as_bytes()).unwrap();
        assert_eq!(queries, vec!["alpha", "beta", "", "gamma"]);
    }

    #[test]
    fn test_format_answer() {
        colored::control::set_override(false);
        assert_eq!(
            format_answer("alpha", QueryResult::Exists, false),
            "\"alpha\": STRING EXISTS"
        );
        assert_eq!(
            format_answer("alpha", QueryResult::NotFound, true),
            "STRING NOT FOUND"
        );
        assert_eq!(
            format_failure("a", &ClientError::ConnectionClosed),
            "\"a\": Error: connection closed before a response was received"
        );
    }

    #[test]
    fn test_summary_exit_codes() {
        let mut summary = Summary::default();
        summary.record(Outcome::Found);
        summary.record(Outcome::Missing);
        assert_eq!(summary.exit_code(false), 0);
        assert_eq!(summary.exit_code(true), 2);
        assert_eq!(summary.to_string(), "1 found, 1 not found, 0 failed");

        summary.record(Outcome::Failed);
        assert_eq!(summary.exit_code(true), 1);
    }

    #[test]
    fn test_outcome_from_result() {
        let found: Result<QueryResult, ClientError> = Ok(QueryResult::Exists);
        let missing: Result<QueryResult, ClientError> = Ok(QueryResult::NotFound);
        let failed: Result<QueryResult, ClientError> =
            Err(ClientError::Protocol(ProtocolError::EmptyResponse));
        assert_eq!(Outcome::from(&found), Outcome::Found);
        assert_eq!(Outcome::from(&missing), Outcome::Missing);
        assert_eq!(Outcome::from(&failed), Outcome::Failed);
    }
}
