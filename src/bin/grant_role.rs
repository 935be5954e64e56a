//! Set a user's role in the store. Admins can only be created this way.
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use k2k_portal::db::{self, NewUser};
use k2k_portal::{config, model::Role};

#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Identity-provider user id
    #[arg(long)]
    uid: String,

    /// admin or customer
    #[arg(long, value_parser = parse_role)]
    role: Role,

    /// Create the user record if it does not exist yet
    #[arg(long)]
    create: bool,
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    if args.create {
        let user = db::upsert_user(
            &pool,
            &NewUser {
                uid: &args.uid,
                role: Some(args.role),
                ..Default::default()
            },
        )
        .await?;
        println!("{} -> {}", user.uid, user.role);
        return Ok(());
    }

    if !db::set_user_role(&pool, &args.uid, args.role).await? {
        return Err(anyhow!(
            "no user record for {}; pass --create to add one",
            args.uid
        ));
    }
    println!("{} -> {}", args.uid, args.role);
    Ok(())
}
