use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::payload::SessionPayload;
use crate::types::{OnboardingStep, TenantId};
use crate::wire;

/// Partial update to a live session, as posted by client code after an
/// onboarding or subscription step.
///
/// Fields are read with the same alias tables as the session cookie, so a
/// body may carry several spellings of one field; the canonical one wins.
/// Identity (`user.email`, `user.sub`) is deliberately absent: it cannot be
/// changed without a new login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
#[non_exhaustive]
pub struct SessionUpdate {
    pub tenant_id: Option<TenantId>,
    pub needs_onboarding: Option<bool>,
    pub onboarding_completed: Option<bool>,
    pub current_step: Option<OnboardingStep>,
    pub subscription_plan: Option<String>,
    pub business_name: Option<String>,
    pub business_type: Option<String>,
}

impl TryFrom<Map<String, Value>> for SessionUpdate {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        Ok(Self {
            tenant_id: field(&map, wire::TENANT_ID)?,
            needs_onboarding: field(&map, wire::NEEDS_ONBOARDING)?,
            onboarding_completed: field(&map, wire::ONBOARDING_COMPLETED)?,
            current_step: field(&map, wire::CURRENT_STEP)?,
            subscription_plan: field(&map, wire::SUBSCRIPTION_PLAN)?,
            business_name: field(&map, wire::BUSINESS_NAME)?,
            business_type: field(&map, wire::BUSINESS_TYPE)?,
        })
    }
}

fn field<T: DeserializeOwned>(map: &Map<String, Value>, aliases: &[&str]) -> Result<Option<T>, String> {
    wire::take(map, aliases).map_err(|e| match e {
        Error::InvalidSession(detail) => detail,
        other => other.to_string(),
    })
}

impl SessionUpdate {
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn with_onboarding_completed(mut self, completed: bool) -> Self {
        self.onboarding_completed = Some(completed);
        self
    }

    #[must_use]
    pub fn with_needs_onboarding(mut self, needs: bool) -> Self {
        self.needs_onboarding = Some(needs);
        self
    }

    #[must_use]
    pub fn with_current_step(mut self, step: impl Into<OnboardingStep>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    #[must_use]
    pub fn with_subscription_plan(mut self, plan: impl Into<String>) -> Self {
        self.subscription_plan = Some(plan.into());
        self
    }

    /// No recognized field was present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into `payload`, then restore the onboarding invariants:
    ///
    /// - `onboarding_completed = true` forces `needs_onboarding = false` and
    ///   the `completed` step, whatever else the update carried;
    /// - otherwise an explicit `onboarding_completed = false` or
    ///   `needs_onboarding = true` clears the completed state. An explicit
    ///   `needs_onboarding` is kept as sent; without one it becomes `true`.
    ///
    /// Updates that touch neither flag never change the onboarding state.
    pub fn apply(self, payload: &mut SessionPayload) {
        let step_given = self.current_step.is_some();

        if let Some(tenant_id) = self.tenant_id {
            payload.tenant_id = Some(tenant_id);
        }
        if let Some(step) = self.current_step {
            payload.current_step = step;
        }
        if let Some(plan) = self.subscription_plan {
            payload.subscription_plan = Some(plan);
        }
        if let Some(name) = self.business_name {
            payload.business_name = Some(name);
        }
        if let Some(kind) = self.business_type {
            payload.business_type = Some(kind);
        }
        if let Some(needs) = self.needs_onboarding {
            payload.needs_onboarding = needs;
        }

        match (self.onboarding_completed, self.needs_onboarding) {
            (Some(true), _) => payload.mark_onboarding_completed(),
            (Some(false), needs) | (None, needs @ Some(true)) => {
                reopen_onboarding(payload, step_given, needs.unwrap_or(true));
            }
            (None, _) => {}
        }
    }
}

fn reopen_onboarding(payload: &mut SessionPayload, step_given: bool, needs_onboarding: bool) {
    payload.onboarding_completed = false;
    payload.needs_onboarding = needs_onboarding;
    if !step_given && payload.current_step.is_completed() {
        payload.current_step = OnboardingStep::BusinessInfo;
    }
}
