use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header::LOCATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::config::{AuthSettings, SessionAuthConfig};
use super::cookies::{self, TransientValues, WriteOptions};
use super::error::AuthError;
use super::extractor::AuthSession;
use super::state::AuthState;
use super::traits::UsedCodeStore;
use super::types::{SessionStatus, UpdateResult};
use crate::payload::SessionPayload;
use crate::replay::ReplayGuard;
use crate::types::OnboardingStep;
use crate::update::SessionUpdate;
use crate::wire;

/// Create the session authentication router.
///
/// Mounts, under the configured auth path (default `/api/auth`):
/// `login`, `exchange`, `callback`, `session`, `session/update` and `logout`.
/// Must be called inside a Tokio runtime for the used-code purge to run.
pub fn auth_routes<S: UsedCodeStore>(config: SessionAuthConfig, code_store: S) -> Router {
    let auth_path = config.settings.auth_path.clone();

    let mut replay = ReplayGuard::new(code_store, config.settings.replay_window);
    if let Some(every) = config.settings.replay_sweep_interval {
        replay = replay.with_sweep(every);
    }

    let state = AuthState {
        client: Arc::new(config.client),
        replay: Arc::new(replay),
        cookies: config.settings.session_cookies(),
        settings: Arc::new(config.settings),
    };

    Router::new()
        .route(&format!("{auth_path}/login"), get(login::<S>))
        .route(&format!("{auth_path}/exchange"), get(exchange::<S>))
        .route(&format!("{auth_path}/callback"), get(callback::<S>))
        .route(&format!("{auth_path}/session"), get(session::<S>))
        .route(&format!("{auth_path}/session/update"), post(update_session::<S>))
        .route(
            &format!("{auth_path}/logout"),
            get(logout::<S>).post(logout::<S>),
        )
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<S: UsedCodeStore>(State(state): State<AuthState<S>>, jar: CookieJar) -> Response {
    let auth_req = state.client.authorization_url();
    let jar = cookies::add_transient(
        jar,
        &auth_req,
        state.settings.secure_cookies,
        &state.settings.auth_path,
    );
    (jar, found(&auth_req.url)).into_response()
}

// ── Exchange ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ExchangeParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Always answers with a redirect: the browser lands here from the provider.
async fn exchange<S: UsedCodeStore>(
    State(state): State<AuthState<S>>,
    jar: CookieJar,
    params: Result<Query<ExchangeParams>, QueryRejection>,
) -> Response {
    let transient = cookies::read_transient(&jar);
    let jar = cookies::clear_transient(jar, state.settings.secure_cookies, &state.settings.auth_path);

    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Malformed exchange query");
            let err = AuthError::Exchange("invalid_request".into());
            return (jar, login_error(&state.settings.error_redirect, &err)).into_response();
        }
    };

    let payload = match establish(&state, params, &transient).await {
        Ok(payload) => payload,
        Err(err) => return (jar, login_error(&state.settings.error_redirect, &err)).into_response(),
    };

    match write_session(&state, jar.clone(), &payload) {
        Ok(jar) => {
            tracing::info!(
                sub = %payload.user.sub,
                needs_onboarding = payload.needs_onboarding,
                "Session established"
            );
            (jar, found(&state.settings.callback_path())).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, sub = %payload.user.sub, "Session cookie could not be written");
            (jar, login_error(&state.settings.error_redirect, &err)).into_response()
        }
    }
}

/// Provider error → code present → state → replay claim → backend exchange.
///
/// The code is claimed before the backend call: a failed exchange cannot be
/// retried with the same code.
async fn establish<S: UsedCodeStore>(
    state: &AuthState<S>,
    params: ExchangeParams,
    transient: &TransientValues,
) -> Result<SessionPayload, AuthError> {
    if let Some(code) = params.error {
        tracing::warn!(error = %code, description = ?params.error_description, "OAuth2 error from identity provider");
        return Err(AuthError::Provider {
            code,
            description: params.error_description,
        });
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCode)?;

    if let (Some(received), Some(issued)) = (&params.state, &transient.state) {
        if received != issued {
            tracing::warn!("OAuth state mismatch");
            return Err(AuthError::StateMismatch);
        }
    }

    tracing::debug!(
        verifier_present = transient.verifier.is_some(),
        nonce_present = transient.nonce.is_some(),
        "Redeeming authorization code"
    );

    match state.replay.try_claim(&code).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(security_event = true, "Authorization code replay rejected");
            return Err(AuthError::Replay);
        }
        Err(e) => {
            tracing::error!(error = %e, "Used-code store unavailable, rejecting exchange");
            return Err(AuthError::Store(e.to_string()));
        }
    }

    let response = state
        .client
        .exchange_code(&code, transient.verifier.as_deref(), params.state.as_deref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Token exchange failed");
            AuthError::from(e)
        })?;

    Ok(response.into_session())
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<S: UsedCodeStore>(
    State(state): State<AuthState<S>>,
    session: Result<AuthSession, AuthError>,
) -> Response {
    match session {
        Ok(AuthSession(payload)) => found(&post_login_target(&state.settings, &payload)),
        Err(err) => {
            tracing::debug!(error = %err, "Callback without a usable session");
            login_error(&state.settings.error_redirect, &AuthError::Unauthenticated)
        }
    }
}

/// Where a freshly authenticated user belongs.
fn post_login_target(settings: &AuthSettings, payload: &SessionPayload) -> String {
    if payload.needs_onboarding && !payload.onboarding_completed {
        let base = settings.onboarding_redirect.trim_end_matches('/');
        return match &payload.current_step {
            OnboardingStep::Completed => base.to_owned(),
            step => format!("{base}/{}", urlencoding::encode(step.as_str())),
        };
    }
    match &payload.tenant_id {
        Some(tenant) => format!("/{}/dashboard", urlencoding::encode(tenant.as_str())),
        None => settings.dashboard_redirect.clone(),
    }
}

// ── Session ────────────────────────────────────────────────────────

/// Login state for client code. Undecodable cookies read as logged out and are cleared.
async fn session<S: UsedCodeStore>(State(state): State<AuthState<S>>, jar: CookieJar) -> Response {
    match state.cookies.read(&jar) {
        Ok(Some(payload)) => match wire::to_value(&payload.redacted()) {
            Ok(session) => Json(SessionStatus::authenticated(session)).into_response(),
            Err(e) => AuthError::from(e).into_response(),
        },
        Ok(None) => (StatusCode::UNAUTHORIZED, Json(SessionStatus::anonymous())).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Discarding undecodable session cookie");
            let jar = state.cookies.clear(jar, WriteOptions::default());
            (StatusCode::UNAUTHORIZED, jar, Json(SessionStatus::anonymous())).into_response()
        }
    }
}

async fn update_session<S: UsedCodeStore>(
    State(state): State<AuthState<S>>,
    jar: CookieJar,
    session: Result<AuthSession, AuthError>,
    body: Result<Json<SessionUpdate>, JsonRejection>,
) -> Response {
    // No write unless the existing session decodes.
    let AuthSession(mut payload) = match session {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };
    let update = match body {
        Ok(Json(update)) => update,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(UpdateResult::failed(rejection.body_text())),
            )
                .into_response();
        }
    };

    let refresh_only = update.is_empty();
    update.apply(&mut payload);

    match write_session(&state, jar, &payload) {
        Ok(jar) => {
            tracing::debug!(
                sub = %payload.user.sub,
                tenant_id = ?payload.tenant_id,
                onboarding_completed = payload.onboarding_completed,
                "Session updated"
            );
            let message = if refresh_only { "Session refreshed" } else { "Session updated" };
            (jar, Json(UpdateResult::ok(message))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: UsedCodeStore>(State(state): State<AuthState<S>>, jar: CookieJar) -> Response {
    let jar = state.cookies.clear(jar, WriteOptions::default());
    (jar, found(&state.settings.logout_redirect)).into_response()
}

// ── Helpers ────────────────────────────────────────────────────────

/// Primary session cookie plus the display companion, same attributes.
fn write_session<S>(
    state: &AuthState<S>,
    jar: CookieJar,
    payload: &SessionPayload,
) -> Result<CookieJar, AuthError> {
    let options = WriteOptions::default();
    let jar = state.cookies.write(jar, payload, options)?;
    Ok(state.cookies.write_display(jar, payload, options)?)
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_owned())]).into_response()
}

fn login_error(error_redirect: &str, err: &AuthError) -> Response {
    let mut location = format!("{error_redirect}?error={}", urlencoding::encode(err.code()));
    if let Some(details) = err.details() {
        location.push_str("&details=");
        location.push_str(&urlencoding::encode(details));
    }
    found(&location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::SessionUser;
    use crate::oauth::{AuthClient, OAuthConfig};

    fn settings() -> AuthSettings {
        let client = AuthClient::new(OAuthConfig::new(
            "https://login.example.com/authorize".parse().unwrap(),
            "client",
            "https://app.example.com/api/auth/exchange".parse().unwrap(),
            "https://backend.example.com/api/auth/exchange".parse().unwrap(),
        ));
        SessionAuthConfig::new(client).settings
    }

    fn payload() -> SessionPayload {
        SessionPayload::new(SessionUser::new("a@b.com", "auth0|1"))
    }

    #[test]
    fn onboarding_users_resume_their_step() {
        let mut p = payload();
        assert_eq!(post_login_target(&settings(), &p), "/onboarding/business_info");
        p.current_step = OnboardingStep::Subscription;
        assert_eq!(post_login_target(&settings(), &p), "/onboarding/subscription");
    }

    #[test]
    fn onboarded_users_land_on_tenant_dashboard() {
        let p = payload().with_tenant_id("tenant-9").completed();
        assert_eq!(post_login_target(&settings(), &p), "/tenant-9/dashboard");

        let p = payload().completed();
        assert_eq!(post_login_target(&settings(), &p), "/dashboard");
    }

    #[test]
    fn error_redirect_carries_code_and_details() {
        let response = login_error("/auth/error", &AuthError::Exchange("bad grant".into()));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[LOCATION],
            "/auth/error?error=exchange_failed&details=bad%20grant"
        );
    }
}
