//! CLI handlers for `login` and `check-config`.

use std::path::Path;

use uuid::Uuid;

use crate::config::AuthConfig;
use crate::service::LoginService;

/// Handle `swift-auth login`.
pub async fn handle_login(
    config_path: Option<&Path>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AuthConfig::load(config_path)?;
    let service = LoginService::http(config)?;
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());

    let started = service.start_login(&session_id).await?;
    println!("Session: {session_id}");
    println!("Scan this QR payload with the Swift app:");
    println!("{}", started.qr_payload);
    println!("Waiting for authorization...");

    let status = tokio::select! {
        status = service.wait_for_outcome(&session_id) => status?,
        _ = tokio::signal::ctrl_c() => {
            service.cancel(&session_id);
            eprintln!("Login cancelled");
            std::process::exit(130);
        }
    };

    let user = status.into_user(&session_id)?;
    println!("Login successful, redirect to {}", service.success_redirect());
    if let Some(token) = user.token {
        println!("Token: {token}");
    }
    if !user.profile.is_empty() {
        println!("{}", serde_json::to_string_pretty(&user.profile)?);
    }
    Ok(())
}

/// Handle `swift-auth check-config`.
pub fn handle_check_config(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AuthConfig::load(config_path)?;
    println!("{config:#?}");
    println!("Configuration OK");
    Ok(())
}
