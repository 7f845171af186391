use serde::{Deserialize, Serialize};

use crate::types::{OnboardingStep, TenantId, UserSub};

/// Identity portion of a session, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SessionUser {
    pub email: String,
    pub sub: UserSub,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl SessionUser {
    /// Create a user with only the required `email` and `sub` fields.
    #[must_use]
    pub fn new(email: impl Into<String>, sub: impl Into<UserSub>) -> Self {
        Self {
            email: email.into(),
            sub: sub.into(),
            name: None,
            picture: None,
            email_verified: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }

    #[must_use]
    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = Some(verified);
        self
    }
}

/// Decrypted content of the session cookie.
///
/// Holds exactly one field per concept. The camelCase / snake_case aliases
/// that older consumers read are produced by [`crate::wire`] when the payload
/// crosses the cookie boundary, never stored here.
///
/// `user.email` and `user.sub` are fixed for the lifetime of a session; a
/// different identity means a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct SessionPayload {
    pub user: SessionUser,
    /// Backend session token, sent as the bearer credential on tenant-scoped calls.
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub needs_onboarding: bool,
    pub onboarding_completed: bool,
    pub current_step: OnboardingStep,
    pub subscription_plan: Option<String>,
    pub business_name: Option<String>,
    pub business_type: Option<String>,
}

impl SessionPayload {
    /// A fresh session for `user` that still has to go through onboarding.
    #[must_use]
    pub fn new(user: SessionUser) -> Self {
        Self {
            user,
            access_token: None,
            id_token: None,
            tenant_id: None,
            needs_onboarding: true,
            onboarding_completed: false,
            current_step: OnboardingStep::BusinessInfo,
            subscription_plan: None,
            business_name: None,
            business_type: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Mark onboarding as finished, keeping every derived flag consistent.
    #[must_use]
    pub fn completed(mut self) -> Self {
        self.mark_onboarding_completed();
        self
    }

    /// `onboarding_completed` implies `!needs_onboarding` and the `completed` step.
    pub fn mark_onboarding_completed(&mut self) {
        self.onboarding_completed = true;
        self.needs_onboarding = false;
        self.current_step = OnboardingStep::Completed;
    }

    /// Copy of the payload without provider or backend tokens, for client-visible responses.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            access_token: None,
            id_token: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser::new("a@b.com", "auth0|1")
    }

    #[test]
    fn new_session_needs_onboarding() {
        let payload = SessionPayload::new(user());
        assert!(payload.needs_onboarding);
        assert!(!payload.onboarding_completed);
        assert_eq!(payload.current_step, OnboardingStep::BusinessInfo);
        assert!(payload.tenant_id.is_none());
    }

    #[test]
    fn completing_onboarding_sets_derived_flags() {
        let payload = SessionPayload::new(user()).completed();
        assert!(payload.onboarding_completed);
        assert!(!payload.needs_onboarding);
        assert!(payload.current_step.is_completed());
    }

    #[test]
    fn redacted_drops_tokens_only() {
        let mut payload = SessionPayload::new(user())
            .with_access_token("tok1")
            .with_tenant_id("tenant-9");
        payload.id_token = Some("id".into());

        let redacted = payload.redacted();
        assert!(redacted.access_token.is_none());
        assert!(redacted.id_token.is_none());
        assert_eq!(redacted.tenant_id, payload.tenant_id);
        assert_eq!(redacted.user, payload.user);
    }
}
