//! Reflection across recent journal entries.

use console::style;

use crate::backend::EdgeFunctionClient;
use crate::config::OrbConfig;

/// Asks the backend for an insight over recent entries and prints it.
///
/// # Errors
/// - If the user is not signed in
/// - If the edge function fails
pub async fn handle_insight() -> Result<(), anyhow::Error> {
    tracing::info!("=== orb Insight Command ===");

    let config = OrbConfig::load()?;
    let session = super::auth::active_session(&config).await?;
    let client = EdgeFunctionClient::new(
        &config.backend.url,
        &config.backend.anon_key,
        &session.access_token,
    );

    let insight = client.generate_insight().await?;
    tracing::info!("Insight received ({} characters)", insight.insight.len());

    println!();
    println!("{}", style("Insight").bold());
    println!();
    println!("{}", insight.insight.trim());
    Ok(())
}
