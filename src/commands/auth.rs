//! Email sign in and sign out.
//!
//! `orb login` emails a six digit code and exchanges it for a session, which is
//! stored with owner-only permissions. Commands that call edge functions load
//! that session through [`active_session`], refreshing it when it is about to
//! expire.

use anyhow::Context;
use cliclack::{input, intro, log, note, outro, spinner};
use console::style;

use crate::backend::auth::{is_complete_code, sanitize_code, OTP_LENGTH};
use crate::backend::{AuthService, BackendError};
use crate::config::{AuthSession, OrbConfig, SessionStore};

const MAX_CODE_ATTEMPTS: usize = 3;

fn auth_service(config: &OrbConfig) -> AuthService {
    AuthService::new(&config.backend.url, &config.backend.anon_key)
}

/// Loads the stored session, refreshing it if it expires within a minute.
///
/// # Errors
/// - `NotSignedIn` if there is no stored session
/// - If the refresh is rejected or the session cannot be saved
pub async fn active_session(config: &OrbConfig) -> anyhow::Result<AuthSession> {
    config.backend.ensure_configured()?;
    let store = SessionStore::open_default()?;
    let Some(session) = store.load()? else {
        return Err(BackendError::NotSignedIn.into());
    };

    if !session.needs_refresh(chrono::Utc::now().timestamp()) {
        return Ok(session);
    }

    tracing::info!("Access token expiring, refreshing session");
    let refreshed = auth_service(config)
        .refresh(&session)
        .await
        .context("Session expired. Run 'orb login' to sign in again")?;
    store.save(&refreshed)?;
    Ok(refreshed)
}

/// Signs in with an emailed one-time code.
///
/// # Errors
/// - If the prompts are cancelled
/// - If the code cannot be sent or is rejected three times
pub async fn handle_login() -> Result<(), anyhow::Error> {
    tracing::info!("=== orb Login ===");

    // cliclack reports the interruption itself; the default handler would kill
    // the process before the terminal is restored.
    if let Err(e) = ctrlc::set_handler(|| {}) {
        tracing::debug!("Could not install Ctrl-C handler: {}", e);
    }

    let config = OrbConfig::load()?;
    config.backend.ensure_configured()?;
    let store = SessionStore::open_default()?;
    let auth = auth_service(&config);

    intro(style(" orb login ").on_white().black())?;

    if let Some(existing) = store.load()? {
        let who = existing.user.email.as_deref().unwrap_or(&existing.user.id);
        note("Already signed in", format!("as {who}; signing in again replaces it"))?;
    }

    let email: String = input("Email")
        .placeholder("you@example.com")
        .validate(|value: &String| {
            if value.trim().is_empty() {
                Err("Email is required")
            } else {
                Ok(())
            }
        })
        .interact()
        .map_err(|e| anyhow::anyhow!("Login cancelled: {e}"))?;
    let email = email.trim().to_string();

    let progress = spinner();
    progress.start("Sending code...");
    if let Err(e) = auth.send_otp(&email).await {
        progress.error(e.to_string());
        return Err(e.into());
    }
    progress.stop(format!("Code sent to {email}"));

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let raw: String = input(format!("{OTP_LENGTH}-digit code"))
            .validate(|value: &String| {
                if is_complete_code(&sanitize_code(value)) {
                    Ok(())
                } else {
                    Err(format!("Enter the {OTP_LENGTH} digits from your email"))
                }
            })
            .interact()
            .map_err(|e| anyhow::anyhow!("Login cancelled: {e}"))?;
        let code = sanitize_code(&raw);

        match auth.verify_otp(&email, &code).await {
            Ok(session) => {
                store.save(&session)?;
                outro(format!("Signed in as {email}"))?;
                return Ok(());
            }
            Err(BackendError::Rejected(message)) if attempt < MAX_CODE_ATTEMPTS => {
                tracing::warn!("Code rejected (attempt {}): {}", attempt, message);
                log::error(message)?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(anyhow::anyhow!("Too many invalid codes"))
}

/// Revokes the current session and deletes it locally.
///
/// The local session is removed even if the server cannot be reached.
pub async fn handle_logout() -> Result<(), anyhow::Error> {
    tracing::info!("=== orb Logout ===");

    let config = OrbConfig::load()?;
    let store = SessionStore::open_default()?;

    let Some(session) = store.load()? else {
        println!("Not signed in.");
        return Ok(());
    };

    if let Err(e) = auth_service(&config).sign_out(&session).await {
        tracing::warn!("Server sign out failed, clearing local session anyway: {}", e);
    }
    store.clear()?;

    println!("{} Signed out.", style("✓").green());
    Ok(())
}
