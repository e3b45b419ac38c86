mod command;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use command::{FeedCommand, LoginCommand};
use firechat::auth::IdentityProvider;
use firechat::chat::client::ChatClient;
use firechat::chat::form::AuthMode;
use firechat::chat::gate::View;
use firechat::config::FirebaseConfig;
use firechat::firestore::DocumentStore;
use firechat::FirebaseApp;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "firechat")]
#[command(about = "Terminal chat room on Firebase Auth and Cloud Firestore")]
struct Cli {
    /// Firebase web app config (JSON). Defaults to FIREBASE_* environment variables.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Start in sign-up mode instead of sign-in
    #[arg(long)]
    sign_up: bool,

    /// Pre-fill the email field
    #[arg(long)]
    email: Option<String>,
}

/// Which login field the next input line fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    Email,
    Password,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("firechat=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<FirebaseConfig> {
    match &cli.config {
        Some(path) => FirebaseConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => FirebaseConfig::from_env().context("failed to load config from the environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::debug!(project = %config.project_id, "config loaded");

    let app = FirebaseApp::new(config);
    let provider: Arc<dyn IdentityProvider> = Arc::new(app.auth());
    let store: Arc<dyn DocumentStore> = Arc::new(app.firestore());

    let mut client = ChatClient::mount(provider, store);
    let mut step = prepare_form(&mut client, &cli);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    render::screen(&client, step);

    loop {
        let view = client.view();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if handle_line(&mut client, &mut step, line.trim_end()).await == Flow::Quit {
                    break;
                }
            }
            alive = client.next_change() => {
                if !alive {
                    break;
                }
            }
        }

        if view != client.view() && client.view() == View::Login {
            step = prepare_form(&mut client, &cli);
        }
        render::screen(&client, step);
    }

    client.teardown();
    Ok(())
}

/// Applies the command-line defaults to a freshly mounted login form.
fn prepare_form(client: &mut ChatClient, cli: &Cli) -> LoginStep {
    let Some(form) = client.form_mut() else {
        return LoginStep::Email;
    };
    if cli.sign_up && form.mode() != AuthMode::SignUp {
        form.toggle_mode();
    }
    match &cli.email {
        Some(email) => {
            form.set_email(email.as_str());
            LoginStep::Password
        }
        None => LoginStep::Email,
    }
}

async fn handle_line(client: &mut ChatClient, step: &mut LoginStep, line: &str) -> Flow {
    match client.view() {
        View::Login => handle_login_line(client, step, line).await,
        View::ChatRoom => handle_feed_line(client, line),
    }
}

async fn handle_login_line(client: &mut ChatClient, step: &mut LoginStep, line: &str) -> Flow {
    let Some(form) = client.form_mut() else {
        return Flow::Continue;
    };
    form.dismiss_alert();

    match LoginCommand::parse(line) {
        LoginCommand::Quit => return Flow::Quit,
        LoginCommand::Toggle => form.toggle_mode(),
        LoginCommand::Input(value) => match *step {
            LoginStep::Email => {
                if !value.is_empty() {
                    form.set_email(value);
                }
                *step = LoginStep::Password;
            }
            LoginStep::Password => {
                form.set_password(value);
                *step = LoginStep::Email;
                // The alert is rendered from the form on failure.
                let _ = form.submit().await;
                client.apply_pending();
            }
        },
    }
    Flow::Continue
}

fn handle_feed_line(client: &mut ChatClient, line: &str) -> Flow {
    let Some(feed) = client.feed_mut() else {
        return Flow::Continue;
    };

    match FeedCommand::parse(line) {
        FeedCommand::Quit => return Flow::Quit,
        FeedCommand::Send(text) => {
            let mut input = feed.input().to_string();
            input.push_str(text);
            feed.set_input(input);
            feed.send_input();
        }
        FeedCommand::Select(row) => {
            let id = row
                .checked_sub(1)
                .and_then(|i| feed.messages().get(i))
                .map(|m| m.id.clone());
            match id {
                Some(id) => feed.toggle_select(&id),
                None => render::notice(&format!("no message #{row}")),
            }
        }
        FeedCommand::Delete => {
            if feed.delete_selected().is_none() {
                render::notice("select one of your own messages first (/select N)");
            }
        }
        FeedCommand::ToggleEmoji => feed.toggle_emoji_picker(),
        FeedCommand::PickEmoji(emoji) => feed.pick_emoji(emoji),
        FeedCommand::Logout => {
            feed.sign_out();
        }
        FeedCommand::Unknown(command) => render::notice(&format!(
            "unknown command {command}; try /select N, /delete, /emoji, /logout, /quit"
        )),
    }
    Flow::Continue
}
