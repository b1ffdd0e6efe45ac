//! Subcommand implementations

use anyhow::{anyhow, Result};
use clap::Args;
use wd_core::config::SuperuserConfig;
use wd_services::{Services, SuperuserOutcome};

#[derive(Args, Debug, Default)]
pub struct SuperuserArgs {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
}

/// Superuser details after applying configured fallbacks
#[derive(Debug, PartialEq, Eq)]
pub struct SuperuserAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl SuperuserArgs {
    pub fn resolve(self, fallback: &SuperuserConfig) -> Result<SuperuserAccount> {
        let email = self
            .email
            .or_else(|| fallback.email.clone())
            .ok_or_else(|| anyhow!("Superuser email is required (--email or FIRST_SUPERUSER_EMAIL)"))?;
        let password = self
            .password
            .or_else(|| fallback.password.clone())
            .ok_or_else(|| {
                anyhow!("Superuser password is required (--password or FIRST_SUPERUSER_PASSWORD)")
            })?;
        Ok(SuperuserAccount {
            email,
            password,
            first_name: self.first_name.unwrap_or_else(|| fallback.first_name.clone()),
            last_name: self.last_name.unwrap_or_else(|| fallback.last_name.clone()),
        })
    }
}

pub async fn create_superuser(
    services: &Services,
    args: SuperuserArgs,
    fallback: &SuperuserConfig,
) -> Result<String> {
    let account = args.resolve(fallback)?;
    let outcome = services
        .users
        .ensure_superuser(&account.email, &account.password, &account.first_name, &account.last_name)
        .await?;

    Ok(match outcome {
        SuperuserOutcome::Created(user) => format!("Superuser created: {} ({})", user.email, user.id),
        SuperuserOutcome::AlreadyExists(user) => {
            format!("User already exists: {} ({})", user.email, user.role)
        }
    })
}

pub async fn cleanup_sessions(services: &Services) -> Result<String> {
    let report = services.sweep().await?;
    Ok(format!(
        "Deactivated {} expired sessions, purged {} audit entries",
        report.sessions_deactivated, report.audit_entries_purged
    ))
}
