use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use futures_util::TryStreamExt;
use microfeed_common::{User, UserInfo};
use microfeed_core::{
    accounts::{self, NewUser},
    config::{Settings, DEFAULT_CONFIG_FILE},
    relationships,
    storage::Store,
    AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Operator CLI over the flat-file microfeed store
#[derive(Parser, Debug)]
#[command(name = "microfeed", version, about)]
struct Cli {
    /// Config file (TOML); `MICROFEED_*` env vars override it
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new user
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        nickname: String,
        #[arg(long)]
        password: String,
    },
    /// Check an email/password pair, optionally issuing a remember token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        remember: bool,
    },
    /// Activate an account with the token printed at registration
    Activate { nickname: String, token: String },
    /// Issue a password reset token
    RequestReset { email: String },
    /// Set a new password with a reset token
    ResetPassword {
        nickname: String,
        token: String,
        #[arg(long)]
        password: String,
    },
    /// Check a remember token
    CheckToken { nickname: String, token: String },
    /// Clear a user's remember token
    Forget { nickname: String },
    /// Follow a user
    Follow { follower: String, followed: String },
    /// Unfollow a user
    Unfollow { follower: String, followed: String },
    /// Publish a micropost
    Post { author: String, body: String },
    /// Print a user's feed, newest first
    Feed {
        nickname: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete a user and everything they own
    Delete { nickname: String },
}

async fn user_by_nickname(state: &AppState, nickname: &str) -> anyhow::Result<User> {
    state
        .store
        .find_user_by_nickname(nickname.trim_start_matches('@'))
        .await?
        .ok_or_else(|| anyhow!("no user with nickname '{nickname}'"))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(state: AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Register {
            name,
            email,
            nickname,
            password,
        } => {
            let user = state
                .register(NewUser {
                    name,
                    email,
                    nickname,
                    password,
                })
                .await?;
            // stands in for the activation email
            let token = state.auth.create_activation(user.id).await?;
            println!("activation token: {token}");
            print_json(&UserInfo::from(user))?;
        },
        Command::Activate { nickname, token } => {
            let user = user_by_nickname(&state, &nickname).await?;
            let user = state.auth.activate(user.id, &token).await?;
            print_json(&UserInfo::from(user))?;
        },
        Command::RequestReset { email } => match state.auth.create_password_reset(&email).await? {
            Some((user, token)) => println!("reset token for {}: {token}", user.nickname),
            None => println!("no account with that email"),
        },
        Command::ResetPassword {
            nickname,
            token,
            password,
        } => {
            let user = user_by_nickname(&state, &nickname).await?;
            let user = state.auth.reset_password(user.id, &token, password).await?;
            print_json(&UserInfo::from(user))?;
        },
        Command::Login {
            email,
            password,
            remember,
        } => {
            let user = state.auth.log_in(&email, &password).await?;
            if remember {
                let token = state.auth.remember(user.id).await?;
                println!("remember token: {token}");
            }
            print_json(&UserInfo::from(user))?;
        },
        Command::CheckToken { nickname, token } => {
            let user = user_by_nickname(&state, &nickname).await?;
            match state.auth.remembered_user(user.id, &token).await? {
                Some(user) => println!("valid for {}", user.nickname),
                None => println!("invalid"),
            }
        },
        Command::Forget { nickname } => {
            let user = user_by_nickname(&state, &nickname).await?;
            state.auth.forget(user.id).await?;
        },
        Command::Follow { follower, followed } => {
            let follower = user_by_nickname(&state, &follower).await?;
            let followed = user_by_nickname(&state, &followed).await?;
            state.follow(follower.id, followed.id).await?;
        },
        Command::Unfollow { follower, followed } => {
            let follower = user_by_nickname(&state, &follower).await?;
            let followed = user_by_nickname(&state, &followed).await?;
            relationships::unfollow(state.store.as_ref(), follower.id, followed.id).await?;
        },
        Command::Post { author, body } => {
            let author = user_by_nickname(&state, &author).await?;
            let micropost = state.post(author.id, &body).await?;
            print_json(&micropost)?;
        },
        Command::Feed { nickname, limit } => {
            let viewer = user_by_nickname(&state, &nickname).await?;
            let feed = state.feed(viewer.id).await?;
            let items: Vec<_> = match limit {
                Some(limit) => feed.page(None, limit).await?,
                None => feed.stream().try_collect().await?,
            };
            print_json(&items)?;
        },
        Command::Delete { nickname } => {
            let user = user_by_nickname(&state, &nickname).await?;
            accounts::delete_account(state.store.as_ref(), user.id).await?;
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    info!(data_dir = %settings.data_dir.display(), "opening store");
    let state = AppState::open(settings)?;

    run(state, cli.command).await
}
