use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "portier", version, about = "Portier token tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Generate a random signing secret.
    Secret {
        /// Number of characters.
        #[arg(long, default_value_t = 64)]
        len: usize,

        /// Write the secret to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Sign a token pair for an email and a set of roles.
    Issue {
        #[arg(long, env = "JWT_SECRET")]
        secret: String,

        #[arg(long)]
        email: String,

        /// Role to resolve into permissions; repeatable.
        #[arg(long = "role", default_value = "student")]
        roles: Vec<String>,

        /// Access token lifetime in seconds.
        #[arg(long, default_value_t = portier_core::token::DEFAULT_ACCESS_TTL_SECS)]
        access_ttl: i64,

        /// Refresh token lifetime in seconds.
        #[arg(long, default_value_t = portier_core::token::DEFAULT_REFRESH_TTL_SECS)]
        refresh_ttl: i64,
    },

    /// Verify a token and print its claims.
    Inspect {
        #[arg(long, env = "JWT_SECRET")]
        secret: String,

        /// Treat the token as a refresh token.
        #[arg(long, default_value_t = false)]
        refresh: bool,

        token: String,
    },
}
