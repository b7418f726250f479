use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of biometric material a voter presented, if any.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiometricKind {
    /// No biometric; the voter must identify their device instead.
    None,
    Face,
    Fingerprint,
}

impl BiometricKind {
    /// Whether this kind carries a biometric payload.
    pub fn is_biometric(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Face => "face",
            Self::Fingerprint => "fingerprint",
        }
    }
}

impl Display for BiometricKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognised biometric kind '{0}', expected one of none, face, fingerprint")]
pub struct UnknownBiometricKind(pub String);

impl FromStr for BiometricKind {
    type Err = UnknownBiometricKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "face" => Ok(Self::Face),
            "fingerprint" => Ok(Self::Fingerprint),
            other => Err(UnknownBiometricKind(other.to_string())),
        }
    }
}

impl From<BiometricKind> for Bson {
    fn from(kind: BiometricKind) -> Self {
        to_bson(&kind).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_kinds() {
        for kind in [
            BiometricKind::None,
            BiometricKind::Face,
            BiometricKind::Fingerprint,
        ] {
            assert_eq!(kind.as_str().parse::<BiometricKind>(), Ok(kind));
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!("Face".parse::<BiometricKind>().is_err());
        assert!("iris".parse::<BiometricKind>().is_err());
    }
}
