#![forbid(unsafe_code)]

use crate::{ContractViolation, SchemaVersion, Validate};

pub const INSIGNE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Hex-encoded access tokens are minted from this many random bytes.
pub const ACCESS_TOKEN_BYTES: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InsigneId(String);

impl InsigneId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for InsigneId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "insigne_id",
                reason: "must not be empty",
            });
        }
        if self.0.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "insigne_id",
                reason: "must be <= 64 chars",
            });
        }
        if !self.0.is_ascii() {
            return Err(ContractViolation::InvalidValue {
                field: "insigne_id",
                reason: "must be ASCII",
            });
        }
        Ok(())
    }
}

/// External submission identifier as delivered by the form vendor.
/// Vendors disagree on shape; anything non-empty ASCII up to 128 chars is
/// accepted and used verbatim as the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SubmissionId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "submission_id",
                reason: "must not be empty",
            });
        }
        if self.0.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "submission_id",
                reason: "must be <= 128 chars",
            });
        }
        if !self.0.is_ascii() {
            return Err(ContractViolation::InvalidValue {
                field: "submission_id",
                reason: "must be ASCII",
            });
        }
        Ok(())
    }
}

/// Owner-facing bearer credential. Minted once at record creation and
/// immutable afterwards; lowercase hex of `ACCESS_TOKEN_BYTES` random bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(token.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for AccessToken {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.len() < ACCESS_TOKEN_BYTES * 2 {
            return Err(ContractViolation::InvalidValue {
                field: "access_token",
                reason: "must be >= 48 hex chars",
            });
        }
        if !self
            .0
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(ContractViolation::InvalidValue {
                field: "access_token",
                reason: "must be lowercase hex",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(addr: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(addr.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for EmailAddress {
    fn validate(&self) -> Result<(), ContractViolation> {
        let s = self.0.trim();
        if s.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must not be empty",
            });
        }
        if s.len() > 320 {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must be <= 320 chars",
            });
        }
        if !s.contains('@') {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must contain '@'",
            });
        }
        Ok(())
    }
}

/// Report lifecycle states, ordered by `rank`. Re-applying a transition to a
/// record already at or past the target state is an idempotent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InsigneStatus {
    Draft,
    Generating,
    AwaitingApproval,
    Approved,
    Delivered,
}

impl InsigneStatus {
    pub const fn rank(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Generating => 1,
            Self::AwaitingApproval => 2,
            Self::Approved => 3,
            Self::Delivered => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generating => "generating",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Delivered => "delivered",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "generating" => Some(Self::Generating),
            "awaiting_approval" => Some(Self::AwaitingApproval),
            "approved" => Some(Self::Approved),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

/// Owner/operator-facing read projection of one record. Content fields stay
/// `None` until the generation step has written them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InsigneSnapshot {
    pub insigne_id: String,
    pub status: String,
    pub motto_latin: Option<String>,
    pub report_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ranks_are_strictly_ordered() {
        let all = [
            InsigneStatus::Draft,
            InsigneStatus::Generating,
            InsigneStatus::AwaitingApproval,
            InsigneStatus::Approved,
            InsigneStatus::Delivered,
        ];
        for pair in all.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn status_strings_roundtrip() {
        for s in [
            InsigneStatus::Draft,
            InsigneStatus::Generating,
            InsigneStatus::AwaitingApproval,
            InsigneStatus::Approved,
            InsigneStatus::Delivered,
        ] {
            assert_eq!(InsigneStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(InsigneStatus::parse("forged"), None);
    }

    #[test]
    fn access_token_must_be_lowercase_hex() {
        assert!(AccessToken::new("a".repeat(48)).is_ok());
        assert!(AccessToken::new("A".repeat(48)).is_err());
        assert!(AccessToken::new("a".repeat(47)).is_err());
        assert!(AccessToken::new("g".repeat(48)).is_err());
    }

    #[test]
    fn email_requires_at_sign() {
        assert!(EmailAddress::new("client@example.com").is_ok());
        assert!(EmailAddress::new("not-an-address").is_err());
        assert!(EmailAddress::new("").is_err());
    }
}
