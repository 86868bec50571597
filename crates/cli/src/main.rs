//! `tollgate` — operator tool for the auth core.
//!
//! Runs login/verify/session flows against the seeded demo credential store.
//! Signing settings come from `JWT_SECRET`, `JWT_ACCESS_TTL_SECS` and
//! `JWT_REFRESH_TTL_SECS`.

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use tollgate_auth::{
    AuthConfig, AuthSessionService, AuthorizationResolver, KeyValueStore, RequestAuthenticator,
    Requirement, RevocationRegistry, TokenCodec, authorize_outcome,
};
use tollgate_infra::InMemoryCredentialStore;
use tollgate_observability::LogFormat;

#[derive(Parser)]
#[command(name = "tollgate", about = "Token issuance and verification tool", version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogArg::Pretty, global = true)]
    log_format: LogArg,

    /// Redis URL for shared revocation state (requires the `redis` feature)
    #[arg(long, env = "TOLLGATE_REDIS_URL", global = true)]
    redis_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, ValueEnum)]
enum LogArg {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the token pair
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Verify a token and print its claims
    Verify {
        token: String,
    },

    /// Log in, call a guarded route, log out, and call it again
    Session {
        #[arg(short, long, default_value = "admin")]
        username: String,
        #[arg(short, long, default_value = tollgate_infra::SEED_PASSWORD)]
        password: String,
        /// Authority the route demands (`ROLE_<code>` or a permission code)
        #[arg(short, long, default_value = "user:view")]
        require: Vec<String>,
    },
}

struct Services {
    codec: TokenCodec,
    sessions: AuthSessionService,
    authenticator: RequestAuthenticator,
}

fn build(config: &AuthConfig, redis_url: Option<&str>) -> anyhow::Result<Services> {
    let store = InMemoryCredentialStore::seeded()
        .context("failed to seed credential store")?
        .arc();
    let registry = RevocationRegistry::new(key_value_store(redis_url)?);
    let codec = TokenCodec::new(config);
    let resolver = AuthorizationResolver::new(store);

    Ok(Services {
        sessions: AuthSessionService::new(codec.clone(), registry.clone(), resolver.clone()),
        authenticator: RequestAuthenticator::new(codec.clone(), registry, resolver),
        codec,
    })
}

#[cfg(feature = "redis")]
fn key_value_store(redis_url: Option<&str>) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match redis_url {
        Some(url) => {
            tracing::info!("using redis for revocation state");
            Ok(Arc::new(
                tollgate_infra::RedisKeyValueStore::new(url).context("invalid redis url")?,
            ))
        }
        None => Ok(tollgate_auth::InMemoryKeyValueStore::arc()),
    }
}

#[cfg(not(feature = "redis"))]
fn key_value_store(redis_url: Option<&str>) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    if redis_url.is_some() {
        bail!("redis support not compiled in; rebuild with --features redis");
    }
    Ok(tollgate_auth::InMemoryKeyValueStore::arc())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.log_format {
        LogArg::Json => tollgate_observability::init(),
        LogArg::Pretty => tollgate_observability::tracing::init(LogFormat::Pretty, None),
    }

    let config = AuthConfig::from_env().context("invalid auth configuration")?;
    tracing::debug!(?config, "auth configuration loaded");
    let services = build(&config, cli.redis_url.as_deref())?;

    match cli.command {
        Commands::Login { username, password } => {
            let response = services.sessions.login(&username, &password).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Verify { token } => {
            let claims = services.codec.validate(token.trim())?;
            let report = json!({
                "claims": claims,
                "issuedAt": claims.issued_at(),
                "expiresAt": claims.expires_at(),
                "remainingSecs": claims.remaining_ttl(Utc::now()).num_seconds(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Session {
            username,
            password,
            require,
        } => run_session(&services, &username, &password, &require).await?,
    }

    Ok(())
}

async fn run_session(
    services: &Services,
    username: &str,
    password: &str,
    require: &[String],
) -> anyhow::Result<()> {
    let required: Vec<Requirement> = require.iter().map(|r| Requirement::parse(r)).collect();
    let pair = services.sessions.login(username, password).await?;
    let header = format!("Bearer {}", pair.access_token);

    let outcome = services.authenticator.authenticate(Some(&header)).await?;
    let me = services.sessions.current_user(&outcome)?;
    println!("authenticated as {} ({})", me.username, me.user_id);
    match authorize_outcome(&outcome, &required) {
        Ok(()) => println!("route allowed"),
        Err(e) => println!("route refused: {e}"),
    }

    services.sessions.logout(&pair.access_token).await?;
    println!("logged out");

    let after = services.authenticator.authenticate(Some(&header)).await?;
    match authorize_outcome(&after, &required) {
        Ok(()) => bail!("revoked token was still accepted"),
        Err(e) => println!("same token after logout: {e}"),
    }
    Ok(())
}
