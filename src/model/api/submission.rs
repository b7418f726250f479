use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    common::biometric::{BiometricKind, UnknownBiometricKind},
    mongodb::Id,
};

/// A vote exactly as submitted. Every field is optional here so that gaps
/// are reported as malformed submissions rather than as parse failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSubmission {
    pub voter_primary_key: Option<String>,
    pub biometric_kind: Option<String>,
    pub biometric_payload: Option<String>,
    pub device_token: Option<String>,
    pub position_id: Option<String>,
    pub candidate_id: Option<String>,
}

/// Raw biometric material presented with a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Biometric {
    pub kind: BiometricKind,
    pub payload: String,
}

/// A submission that has passed structural validation.
///
/// Exactly one of `biometric` and `device_token` is guaranteed to be usable
/// as the voter's secondary identity: if `biometric` is `None`, then
/// `device_token` is `Some`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub voter_primary_key: String,
    pub biometric: Option<Biometric>,
    pub device_token: Option<String>,
    pub position_id: Id,
    pub candidate_id: Id,
}

impl ValidSubmission {
    pub fn biometric_kind(&self) -> BiometricKind {
        self.biometric
            .as_ref()
            .map(|b| b.kind)
            .unwrap_or(BiometricKind::None)
    }
}

/// Reasons a submission is structurally unacceptable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedSubmission {
    #[error("Request body is not a valid vote: {0}")]
    Unparsable(String),
    #[error("Missing required field `{0}`")]
    Missing(&'static str),
    #[error("Voter key '{0}' is not in the institution's format")]
    InvalidVoterKey(String),
    #[error(transparent)]
    UnknownBiometricKind(#[from] UnknownBiometricKind),
    #[error("A {0} biometric was declared but no payload was given")]
    MissingBiometricPayload(BiometricKind),
    #[error("A device token is required when voting without a biometric")]
    MissingDeviceToken,
    #[error("Field `{field}` is not a valid ID: '{value}'")]
    InvalidId { field: &'static str, value: String },
}

impl VoteSubmission {
    /// Check that all required fields are present and well-formed.
    pub fn validate(self, voter_key: &Regex) -> Result<ValidSubmission, MalformedSubmission> {
        let voter_primary_key = required(self.voter_primary_key, "voterPrimaryKey")?;
        let position_id = required(self.position_id, "positionId")?;
        let candidate_id = required(self.candidate_id, "candidateId")?;

        if !voter_key.is_match(&voter_primary_key) {
            return Err(MalformedSubmission::InvalidVoterKey(voter_primary_key));
        }

        let kind = required(self.biometric_kind, "biometricKind")?.parse::<BiometricKind>()?;
        // Hashed exactly as sent.
        let payload = self.biometric_payload.filter(|p| !p.trim().is_empty());
        let device_token = present(self.device_token);

        let biometric = if kind.is_biometric() {
            let payload = payload.ok_or(MalformedSubmission::MissingBiometricPayload(kind))?;
            Some(Biometric { kind, payload })
        } else if device_token.is_none() {
            return Err(MalformedSubmission::MissingDeviceToken);
        } else {
            None
        };

        Ok(ValidSubmission {
            voter_primary_key,
            biometric,
            device_token,
            position_id: parse_id(position_id, "positionId")?,
            candidate_id: parse_id(candidate_id, "candidateId")?,
        })
    }
}

/// Treat blank strings as absent.
fn present(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(field: Option<String>, name: &'static str) -> Result<String, MalformedSubmission> {
    present(field).ok_or(MalformedSubmission::Missing(name))
}

fn parse_id(value: String, field: &'static str) -> Result<Id, MalformedSubmission> {
    value
        .parse::<Id>()
        .map_err(|_| MalformedSubmission::InvalidId { field, value })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn matric() -> Regex {
        Regex::new(r"^[A-Z]{3}/\d{2}/\d{2}/\d{4}$").unwrap()
    }

    #[test]
    fn valid_device_submission() {
        let (position, candidate) = (Id::new(), Id::new());
        let valid = VoteSubmission::example("CSC/20/01/0001", position, candidate)
            .validate(&matric())
            .unwrap();

        assert_eq!(valid.voter_primary_key, "CSC/20/01/0001");
        assert_eq!(valid.biometric, None);
        assert_eq!(valid.biometric_kind(), BiometricKind::None);
        assert_eq!(valid.device_token.as_deref(), Some("dev1"));
        assert_eq!(valid.position_id, position);
        assert_eq!(valid.candidate_id, candidate);
    }

    #[test]
    fn valid_fingerprint_submission_needs_no_device() {
        let valid =
            VoteSubmission::example_fingerprint("CSC/20/01/0001", "ridge-data", Id::new(), Id::new())
                .validate(&matric())
                .unwrap();

        assert_eq!(
            valid.biometric,
            Some(Biometric {
                kind: BiometricKind::Fingerprint,
                payload: "ridge-data".to_string(),
            })
        );
        assert_eq!(valid.device_token, None);
    }

    #[test]
    fn missing_and_blank_fields() {
        let mut submission = VoteSubmission::example("CSC/20/01/0001", Id::new(), Id::new());
        submission.position_id = None;
        assert_eq!(
            submission.validate(&matric()),
            Err(MalformedSubmission::Missing("positionId"))
        );

        let mut submission = VoteSubmission::example("CSC/20/01/0001", Id::new(), Id::new());
        submission.voter_primary_key = Some("   ".to_string());
        assert_eq!(
            submission.validate(&matric()),
            Err(MalformedSubmission::Missing("voterPrimaryKey"))
        );

        let mut submission = VoteSubmission::example("CSC/20/01/0001", Id::new(), Id::new());
        submission.biometric_kind = None;
        assert_eq!(
            submission.validate(&matric()),
            Err(MalformedSubmission::Missing("biometricKind"))
        );
    }

    #[test]
    fn voter_key_must_match_format() {
        let submission = VoteSubmission::example("csc-20-01-1", Id::new(), Id::new());
        assert_eq!(
            submission.validate(&matric()),
            Err(MalformedSubmission::InvalidVoterKey("csc-20-01-1".to_string()))
        );
    }

    #[test]
    fn unknown_biometric_kind() {
        let mut submission = VoteSubmission::example("CSC/20/01/0001", Id::new(), Id::new());
        submission.biometric_kind = Some("iris".to_string());
        assert!(matches!(
            submission.validate(&matric()),
            Err(MalformedSubmission::UnknownBiometricKind(_))
        ));
    }

    #[test]
    fn biometric_needs_payload() {
        let mut submission =
            VoteSubmission::example_fingerprint("CSC/20/01/0001", "x", Id::new(), Id::new());
        submission.biometric_payload = Some(String::new());
        assert_eq!(
            submission.validate(&matric()),
            Err(MalformedSubmission::MissingBiometricPayload(
                BiometricKind::Fingerprint
            ))
        );
    }

    #[test]
    fn biometric_payload_is_kept_verbatim() {
        let valid =
            VoteSubmission::example_fingerprint("CSC/20/01/0001", "  ridges\n", Id::new(), Id::new())
                .validate(&matric())
                .unwrap();
        assert_eq!(valid.biometric.unwrap().payload, "  ridges\n");
    }

    #[test]
    fn no_biometric_needs_device() {
        let mut submission = VoteSubmission::example("CSC/20/01/0001", Id::new(), Id::new());
        submission.device_token = None;
        assert_eq!(
            submission.validate(&matric()),
            Err(MalformedSubmission::MissingDeviceToken)
        );
    }

    #[test]
    fn ids_must_parse() {
        let mut submission = VoteSubmission::example("CSC/20/01/0001", Id::new(), Id::new());
        submission.candidate_id = Some("C2".to_string());
        assert_eq!(
            submission.validate(&matric()),
            Err(MalformedSubmission::InvalidId {
                field: "candidateId",
                value: "C2".to_string(),
            })
        );
    }

    #[test]
    fn deserialises_camel_case_with_gaps() {
        let submission: VoteSubmission = serde_json::from_str(
            r#"{"voterPrimaryKey": "CSC/20/01/0001", "biometricKind": "face"}"#,
        )
        .unwrap();
        assert_eq!(
            submission.voter_primary_key.as_deref(),
            Some("CSC/20/01/0001")
        );
        assert_eq!(submission.biometric_kind.as_deref(), Some("face"));
        assert_eq!(submission.position_id, None);
    }
}
