use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Tenant identifier a session is scoped to.
///
/// Every backend call made on behalf of a session carries this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Provider-issued stable user id (the OAuth `sub` claim, e.g. `auth0|123`).
///
/// Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserSub(pub String);

impl From<&str> for UserSub {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Onboarding progress of the tenant owner.
///
/// Unknown steps written by newer frontends are preserved verbatim in
/// [`OnboardingStep::Other`] so a decode/encode cycle never loses them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OnboardingStep {
    #[default]
    BusinessInfo,
    Subscription,
    Payment,
    Setup,
    Completed,
    Other(String),
}

impl OnboardingStep {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::BusinessInfo => "business_info",
            Self::Subscription => "subscription",
            Self::Payment => "payment",
            Self::Setup => "setup",
            Self::Completed => "completed",
            Self::Other(s) => s,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OnboardingStep {
    fn from(s: String) -> Self {
        match s.as_str() {
            "business_info" | "business-info" => Self::BusinessInfo,
            "subscription" => Self::Subscription,
            "payment" => Self::Payment,
            "setup" => Self::Setup,
            "completed" | "complete" => Self::Completed,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for OnboardingStep {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<OnboardingStep> for String {
    fn from(step: OnboardingStep) -> Self {
        match step {
            OnboardingStep::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_steps_parse() {
        assert_eq!(OnboardingStep::from("business_info"), OnboardingStep::BusinessInfo);
        assert_eq!(OnboardingStep::from("subscription"), OnboardingStep::Subscription);
        assert_eq!(OnboardingStep::from("completed"), OnboardingStep::Completed);
        assert_eq!(OnboardingStep::from("complete"), OnboardingStep::Completed);
    }

    #[test]
    fn unknown_step_is_preserved() {
        let step = OnboardingStep::from("team_invite");
        assert_eq!(step, OnboardingStep::Other("team_invite".into()));
        assert_eq!(String::from(step), "team_invite");
    }

    #[test]
    fn step_serializes_as_plain_string() {
        let json = serde_json::to_string(&OnboardingStep::Subscription).unwrap();
        assert_eq!(json, "\"subscription\"");
        let parsed: OnboardingStep = serde_json::from_str("\"completed\"").unwrap();
        assert!(parsed.is_completed());
    }

    #[test]
    fn tenant_id_is_transparent() {
        let id = TenantId::from("tenant-9");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"tenant-9\"");
        assert_eq!(id.to_string(), "tenant-9");
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_tenant(_: &TenantId) {}
        fn takes_sub(_: &UserSub) {}

        takes_tenant(&TenantId::from("x"));
        takes_sub(&UserSub::from("x"));
        // takes_tenant(&UserSub::from("x"));  // Compile error!
    }
}
