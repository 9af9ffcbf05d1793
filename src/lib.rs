//! Remote QR-code login.
//!
//! A web server delegates login to an external identity provider: it asks the
//! provider for a one-time QR code and correlation id, shows the code to the
//! browser, and polls the provider until the user's phone completes the login
//! out-of-band.
//!
//! # Quick Start
//!
//! ```no_run
//! use swift_qr_auth::prelude::*;
//!
//! # async fn example() -> swift_qr_auth::error::Result<()> {
//! let service = LoginService::http(AuthConfig::from_env()?)?;
//! let started = service.start_login("session-42").await?;
//! println!("render QR: {}", started.qr_payload);
//!
//! match service.get_login_status("session-42")? {
//!     LoginStatus::Pending => println!("still waiting"),
//!     LoginStatus::Authenticated(_) => println!("redirect to {}", service.success_redirect()),
//!     LoginStatus::Failed(reason) => println!("login failed: {reason}"),
//!     LoginStatus::Expired => println!("QR code expired"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod poll;
pub mod prelude;
pub mod provider;
pub mod service;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;
