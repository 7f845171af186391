//! Cookie-boundary representation of [`SessionPayload`].
//!
//! Legacy consumers read the same concept under different names
//! (`tenantId` / `tenant_id`, five spellings of "onboarding done", six of the
//! subscription plan). This module is the only place those aliases exist:
//! every alias of a field is written together, and on read the first
//! present alias wins, canonical name first. New code reads the canonical
//! struct fields only.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::payload::{SessionPayload, SessionUser};
use crate::types::{OnboardingStep, TenantId};

const USER: &str = "user";
const ACCESS_TOKEN: &[&str] = &["accessToken"];
const ID_TOKEN: &[&str] = &["idToken"];
pub(crate) const TENANT_ID: &[&str] = &["tenantId", "tenant_id"];
pub(crate) const NEEDS_ONBOARDING: &[&str] = &["needsOnboarding", "needs_onboarding"];
pub(crate) const ONBOARDING_COMPLETED: &[&str] = &[
    "onboardingCompleted",
    "onboarding_completed",
    "isOnboarded",
    "setupComplete",
    "setup_complete",
];
pub(crate) const CURRENT_STEP: &[&str] = &["currentStep", "current_onboarding_step"];
pub(crate) const SUBSCRIPTION_PLAN: &[&str] = &[
    "subscriptionPlan",
    "subscription_plan",
    "selectedPlan",
    "selected_plan",
    "subscriptionType",
    "subscription_type",
];
pub(crate) const BUSINESS_NAME: &[&str] = &["businessName", "business_name"];
pub(crate) const BUSINESS_TYPE: &[&str] = &["businessType", "business_type"];

/// Every alias of the onboarding-completed flag, for callers that verify legacy readers.
pub const ONBOARDING_COMPLETED_ALIASES: &[&str] = ONBOARDING_COMPLETED;
/// Every alias of the subscription plan.
pub const SUBSCRIPTION_PLAN_ALIASES: &[&str] = SUBSCRIPTION_PLAN;

/// Expand a payload into its aliased JSON object.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if a field cannot be represented as JSON.
pub fn to_value(payload: &SessionPayload) -> Result<Value, Error> {
    let mut map = Map::new();
    let user = serde_json::to_value(&payload.user).map_err(|e| Error::Encoding(e.to_string()))?;
    map.insert(USER.into(), user);

    put_opt(&mut map, ACCESS_TOKEN, payload.access_token.as_deref());
    put_opt(&mut map, ID_TOKEN, payload.id_token.as_deref());
    put_opt(&mut map, TENANT_ID, payload.tenant_id.as_ref().map(TenantId::as_str));
    put(&mut map, NEEDS_ONBOARDING, Value::Bool(payload.needs_onboarding));
    put(&mut map, ONBOARDING_COMPLETED, Value::Bool(payload.onboarding_completed));
    put(&mut map, CURRENT_STEP, Value::String(payload.current_step.to_string()));
    put_opt(&mut map, SUBSCRIPTION_PLAN, payload.subscription_plan.as_deref());
    put_opt(&mut map, BUSINESS_NAME, payload.business_name.as_deref());
    put_opt(&mut map, BUSINESS_TYPE, payload.business_type.as_deref());

    Ok(Value::Object(map))
}

/// Collapse an aliased JSON object back into the canonical payload.
///
/// # Errors
///
/// Returns [`Error::InvalidSession`] if the value is not an object, the
/// `user` identity is missing, or a field has the wrong JSON type.
pub fn from_value(value: Value) -> Result<SessionPayload, Error> {
    let Value::Object(mut map) = value else {
        return Err(Error::InvalidSession("payload is not a JSON object".into()));
    };

    let user_value = map
        .remove(USER)
        .ok_or_else(|| Error::InvalidSession("missing user".into()))?;
    let user: SessionUser = serde_json::from_value(user_value)
        .map_err(|e| Error::InvalidSession(format!("user: {e}")))?;

    let onboarding_completed: bool = take(&map, ONBOARDING_COMPLETED)?.unwrap_or(false);
    let needs_onboarding: bool = take(&map, NEEDS_ONBOARDING)?.unwrap_or(!onboarding_completed);
    let current_step: OnboardingStep = take(&map, CURRENT_STEP)?.unwrap_or(if onboarding_completed {
        OnboardingStep::Completed
    } else {
        OnboardingStep::BusinessInfo
    });

    let mut payload = SessionPayload {
        user,
        access_token: take(&map, ACCESS_TOKEN)?,
        id_token: take(&map, ID_TOKEN)?,
        tenant_id: take(&map, TENANT_ID)?,
        needs_onboarding,
        onboarding_completed,
        current_step,
        subscription_plan: take(&map, SUBSCRIPTION_PLAN)?,
        business_name: take(&map, BUSINESS_NAME)?,
        business_type: take(&map, BUSINESS_TYPE)?,
    };
    // Older writers could leave the aliases contradicting each other.
    if payload.onboarding_completed {
        payload.mark_onboarding_completed();
    }
    Ok(payload)
}

pub(crate) fn to_json(payload: &SessionPayload) -> Result<String, Error> {
    let value = to_value(payload)?;
    serde_json::to_string(&value).map_err(|e| Error::Encoding(e.to_string()))
}

pub(crate) fn from_json(bytes: &[u8]) -> Result<SessionPayload, Error> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::InvalidSession(format!("not JSON: {e}")))?;
    from_value(value)
}

fn put(map: &mut Map<String, Value>, aliases: &[&str], value: Value) {
    for alias in aliases {
        map.insert((*alias).to_owned(), value.clone());
    }
}

fn put_opt(map: &mut Map<String, Value>, aliases: &[&str], value: Option<&str>) {
    if let Some(v) = value {
        put(map, aliases, Value::String(v.to_owned()));
    }
}

pub(crate) fn take<T: DeserializeOwned>(map: &Map<String, Value>, aliases: &[&str]) -> Result<Option<T>, Error> {
    let Some((alias, value)) = aliases
        .iter()
        .find_map(|alias| map.get(*alias).filter(|v| !v.is_null()).map(|v| (alias, v)))
    else {
        return Ok(None);
    };
    serde_json::from_value(value.clone())
        .map(Some)
        .map_err(|e| Error::InvalidSession(format!("{alias}: {e}")))
}
