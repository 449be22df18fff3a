// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use chrono::Duration;
use clap::Parser;
use cli::{Cli, Commands};
use portier_core::permissions;
use portier_core::token::{self, TokenService};
use serde_json::json;

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::Secret { len, out } => {
            if len == 0 {
                return Err(Error::Custom("secret length must be positive".into()));
            }
            let secret = token::generate_secret(len);
            match out {
                Some(path) => {
                    std::fs::write(&path, &secret)?;
                    log::info!("secret written to {}", path.display());
                }
                None => println!("{secret}"),
            }
        }
        Commands::Issue {
            secret,
            email,
            roles,
            access_ttl,
            refresh_ttl,
        } => {
            let service = service(&secret, access_ttl, refresh_ttl)?;
            let pair = service.issue_pair(&email, &permissions::resolve(&roles))?;
            log::info!("issued token pair for {email}");
            println!("{}", serde_json::to_string_pretty(&pair)?);
        }
        Commands::Inspect {
            secret,
            refresh,
            token,
        } => {
            let service = service(&secret, 0, 0)?;
            let claims = if refresh {
                json!({ "email": service.validate_refresh(&token)? })
            } else {
                let claims = service.validate_access(&token)?;
                json!({
                    "permissions": claims.permissions,
                    "exp": claims.exp,
                    "expired": claims.is_expired(),
                })
            };
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }

    Ok(())
}

fn service(secret: &str, access_ttl: i64, refresh_ttl: i64) -> Result<TokenService> {
    if secret.is_empty() {
        return Err(Error::Custom("signing secret must not be empty".into()));
    }
    Ok(TokenService::new(
        secret.as_bytes(),
        Duration::seconds(access_ttl),
        Duration::seconds(refresh_ttl),
    ))
}
