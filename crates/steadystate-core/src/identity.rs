//! Composite identity tokens
//!
//! A resource's durable handle is a single string: its key parts joined with
//! a separator that is fixed per resource kind. The host persists nothing
//! else between invocations, so every lifecycle entry point decodes the
//! token here before touching the remote system.

use crate::error::{CoreError, Result};

/// Encoding rules for one resource kind's identity token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityCodec {
    separator: &'static str,
    labels: &'static [&'static str],
}

impl IdentityCodec {
    /// `labels` names each key part in order (used in error messages)
    pub const fn new(separator: &'static str, labels: &'static [&'static str]) -> Self {
        Self { separator, labels }
    }

    pub fn separator(&self) -> &'static str {
        self.separator
    }

    pub fn part_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &'static [&'static str] {
        self.labels
    }

    /// Human readable format, e.g. `instanceID,origin`
    pub fn format(&self) -> String {
        self.labels.join(self.separator)
    }

    /// Join key parts into a token.
    ///
    /// Parts are assumed to be non-empty and free of the separator (except
    /// the last one); violating that is a caller bug, not user input.
    pub fn encode<S: AsRef<str>>(&self, parts: &[S]) -> String {
        debug_assert_eq!(parts.len(), self.part_count());
        debug_assert!(parts.iter().all(|p| !p.as_ref().is_empty()));

        parts
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(self.separator)
    }

    /// Split a token into exactly `part_count` non-empty parts.
    ///
    /// The split is bounded, so the last part may itself contain the
    /// separator. Anything else is `MalformedIdentity`.
    pub fn decode(&self, token: &str) -> Result<Vec<String>> {
        let parts: Vec<String> = token
            .splitn(self.part_count(), self.separator)
            .map(str::to_string)
            .collect();

        if parts.len() != self.part_count() || parts.iter().any(String::is_empty) {
            return Err(CoreError::MalformedIdentity {
                token: token.to_string(),
                expected: self.format(),
            });
        }

        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: IdentityCodec = IdentityCodec::new(",", &["instanceID", "origin"]);
    const FLOW: IdentityCodec =
        IdentityCodec::new(":", &["instanceID", "phoneNumberID", "contactFlowID"]);

    #[test]
    fn test_encode_decode_round_trip() {
        let token = ORIGIN.encode(&["inst-1", "origin-A"]);
        assert_eq!(token, "inst-1,origin-A");
        assert_eq!(ORIGIN.decode(&token).unwrap(), vec!["inst-1", "origin-A"]);

        let token = FLOW.encode(&["inst-1", "phone-1", "flow-1"]);
        assert_eq!(token, "inst-1:phone-1:flow-1");
        assert_eq!(
            FLOW.decode(&token).unwrap(),
            vec!["inst-1", "phone-1", "flow-1"]
        );
    }

    #[test]
    fn test_last_part_may_contain_separator() {
        let parts = ORIGIN.decode("inst-1,https://a.example.com,b").unwrap();
        assert_eq!(parts, vec!["inst-1", "https://a.example.com,b"]);

        let parts = FLOW.decode("inst-1:phone-1:arn:aws:flow/1").unwrap();
        assert_eq!(parts[2], "arn:aws:flow/1");
    }

    #[test]
    fn test_decode_rejects_wrong_part_count() {
        for token in ["inst-1", "", "inst-1:phone-1"] {
            let err = if token.contains(':') {
                FLOW.decode(token).unwrap_err()
            } else {
                ORIGIN.decode(token).unwrap_err()
            };
            assert!(matches!(err, CoreError::MalformedIdentity { .. }), "{token}");
        }
    }

    #[test]
    fn test_decode_rejects_empty_parts() {
        for token in [",origin-A", "inst-1,", ","] {
            let err = ORIGIN.decode(token).unwrap_err();
            assert!(matches!(err, CoreError::MalformedIdentity { .. }), "{token}");
        }
        assert!(FLOW.decode("inst-1::flow-1").is_err());
    }

    #[test]
    fn test_error_names_expected_format() {
        let err = FLOW.decode("inst-1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected format of ID (inst-1), expected instanceID:phoneNumberID:contactFlowID"
        );
    }
}
