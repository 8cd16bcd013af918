//! Caller capabilities

use crate::ReporterId;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What an authenticated caller is allowed to do.
    ///
    /// Resolved once per call by the identity provider; handlers check the
    /// set instead of scattering role comparisons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CapabilitySet: u8 {
        /// May submit table reports for assigned tables
        const SUBMIT = 0b0000_0001;
        /// May toggle supervisor validation on reported tables
        const VALIDATE = 0b0000_0010;
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::empty()
    }
}

impl CapabilitySet {
    /// A field witness: submits, never validates.
    pub fn witness() -> Self {
        Self::SUBMIT
    }

    /// A supervisor: validates and may also submit.
    pub fn supervisor() -> Self {
        Self::SUBMIT | Self::VALIDATE
    }

    pub fn can_submit(&self) -> bool {
        self.contains(Self::SUBMIT)
    }

    pub fn can_validate(&self) -> bool {
        self.contains(Self::VALIDATE)
    }
}

// Manual serde implementation for CapabilitySet (bitflags 2.x + serde)
impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CapabilitySet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Self::from_bits(bits).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid CapabilitySet bits: {:#04x}", bits))
        })
    }
}

#[cfg(feature = "openapi")]
impl utoipa::ToSchema for CapabilitySet {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("CapabilitySet")
    }
}

#[cfg(feature = "openapi")]
impl utoipa::PartialSchema for CapabilitySet {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .schema_type(utoipa::openapi::schema::SchemaType::Type(
                utoipa::openapi::schema::Type::Integer,
            ))
            .description(Some("Caller capabilities as a u8 bitfield"))
            .minimum(Some(0.0))
            .maximum(Some(3.0))
            .into()
    }
}

/// An authenticated caller with its resolved capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallerIdentity {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub reporter_id: ReporterId,
    pub display_name: String,
    pub capabilities: CapabilitySet,
}

impl CallerIdentity {
    pub fn new(reporter_id: ReporterId, display_name: &str, capabilities: CapabilitySet) -> Self {
        Self {
            reporter_id,
            display_name: display_name.to_string(),
            capabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;

    #[test]
    fn witness_cannot_validate() {
        let caps = CapabilitySet::witness();
        assert!(caps.can_submit());
        assert!(!caps.can_validate());
    }

    #[test]
    fn supervisor_can_do_both() {
        let caps = CapabilitySet::supervisor();
        assert!(caps.can_submit());
        assert!(caps.can_validate());
    }

    #[test]
    fn capability_set_serializes_as_bits() {
        let caps = CapabilitySet::supervisor();
        let json = serde_json::to_string(&caps).unwrap();
        assert_eq!(json, "3");
        let back: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, caps);
    }

    #[test]
    fn unknown_bits_are_rejected() {
        let result: Result<CapabilitySet, _> = serde_json::from_str("255");
        assert!(result.is_err());
    }

    #[test]
    fn caller_identity_round_trips() {
        let caller = CallerIdentity::new(
            ReporterId::now_v7(),
            "Marta Quintero",
            CapabilitySet::witness(),
        );
        let json = serde_json::to_string(&caller).unwrap();
        let back: CallerIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, caller);
    }
}
