use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use outreach::api_client::ApiClient;
use outreach::config::Config;
use outreach::errors::ClientError;
use outreach::guard::{Navigator, RouteGuard};
use outreach::models::resume::ParseMode;
use outreach::models::{GeneratedEmail, SendState};
use outreach::outbox::SendQueue;
use outreach::services::{auth, emails, payment};
use outreach::session::SessionStore;
use outreach::storage::{FileStorage, MemoryStorage, Storage};
use outreach::upload::{PollState, ResumeUploader, UploadFile, UploadRequest};
use outreach::wizard::EmailWizard;

#[derive(Parser)]
#[command(name = "outreach", version, about = "Résumé-driven cold email outreach")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session token
    Login { email: String, password: String },
    /// Create an account; a verification email follows
    Signup {
        name: String,
        email: String,
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Upload a PDF résumé and wait for parsing
    Upload {
        file: PathBuf,
        #[arg(long, default_value = "ai")]
        mode: String,
    },
    /// Show the cached résumé
    Resume,
    /// Ask the backend to parse the current résumé again
    RetryParse,
    /// List companies matching the résumé
    Companies {
        #[arg(long)]
        query: Option<String>,
    },
    /// Generate drafts for picked companies (1-based, all when omitted) into a JSON file
    Generate {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, value_delimiter = ',')]
        pick: Vec<usize>,
        #[arg(long, default_value = "drafts.json")]
        out: PathBuf,
    },
    /// Send drafts from a JSON file, one at a time
    Send {
        emails: PathBuf,
        #[arg(long)]
        retry_failed: bool,
    },
    /// Show subscription status
    PaymentStatus,
    /// Show where the route guard sends a path
    Guard { path: String },
}

struct App {
    config: Config,
    client: ApiClient,
    session: SessionStore,
    session_storage: MemoryStorage,
    navigator: Navigator,
}

impl App {
    fn build(config: Config) -> Result<Self> {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(config.local_storage_path()));
        let client = ApiClient::new(
            config.api_url.clone(),
            Duration::from_secs(config.http_timeout_secs),
            storage.clone(),
        )
        .context("Failed to build HTTP client")?;
        let session = SessionStore::restore(storage);
        let guard = RouteGuard::new(Arc::new(client.clone()), session.clone());
        let navigator = Navigator::new(client.clone(), guard);
        Ok(Self {
            config,
            client,
            session,
            session_storage: MemoryStorage::new(),
            navigator,
        })
    }

    /// Navigates to `path` and fails if the guard sends the user elsewhere.
    async fn enter(&self, path: &str) -> Result<()> {
        let navigation = self.navigator.navigate(path).await;
        if navigation.path != path {
            bail!(
                "Cannot open {path}: redirected to {} (sign in or renew your subscription)",
                navigation.path
            );
        }
        Ok(())
    }

    async fn resume_id(&self) -> Result<String> {
        self.session
            .resume()
            .await
            .map(|r| r.id)
            .ok_or_else(|| anyhow!("No resume uploaded yet. Run `outreach upload <file>` first"))
    }
}

/// The text a user would see in a toast.
fn toast(e: ClientError) -> anyhow::Error {
    anyhow!(e.message())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("outreach v{} against {}", env!("CARGO_PKG_VERSION"), config.api_url);
    let app = App::build(config)?;

    match cli.command {
        Command::Login { email, password } => {
            app.client.set_current_route("/login");
            let response = auth::login(&app.client, &email, &password)
                .await
                .map_err(toast)?;
            app.session.update_user(Some(response.user.clone())).await;
            println!("Signed in as {} <{}>", response.user.name, response.user.email);
        }
        Command::Signup {
            name,
            email,
            password,
        } => {
            app.client.set_current_route("/signup");
            let response = auth::register(&app.client, &app.session_storage, &name, &email, &password)
                .await
                .map_err(toast)?;
            let address = auth::pending_verification_email(&app.session_storage).unwrap_or(email);
            println!("{} (verification sent to {address})", response.message);
        }
        Command::Logout => {
            app.session.logout().await.map_err(toast)?;
            println!("Signed out");
        }
        Command::Whoami => {
            app.enter("/dashboard").await?;
            match app.session.current_user().await {
                Some(user) => println!("{} <{}>", user.name, user.email),
                None => println!("Not signed in"),
            }
        }
        Command::Upload { file, mode } => {
            app.enter("/dashboard").await?;
            let user = app
                .session
                .current_user()
                .await
                .ok_or_else(|| anyhow!("Not signed in"))?;
            let parse_mode = match mode.as_str() {
                "ai" => ParseMode::Ai,
                "basic" => ParseMode::Basic,
                other => bail!("Unknown parse mode '{other}' (use ai or basic)"),
            };
            let file = UploadFile::from_path(&file).await.map_err(toast)?;

            let mut uploader = ResumeUploader::new(
                Arc::new(app.client.clone()),
                app.session.clone(),
                app.config.poll_policy(),
            );
            let handle = uploader
                .upload(UploadRequest {
                    file,
                    name: user.name,
                    email: user.email,
                    parse_mode,
                })
                .await
                .map_err(toast)?;
            println!("Uploaded resume {}", handle.id);

            if let Some(poll) = uploader.active() {
                println!("Parsing...");
                match poll.wait().await {
                    PollState::Done(parsed) => println!(
                        "Parsed: {} skills, {} experience entries, {} projects",
                        parsed.skills.len(),
                        parsed.experience.len(),
                        parsed.projects.len()
                    ),
                    PollState::Failed(message) => bail!(message),
                    PollState::TimedOut => bail!(ClientError::Timeout.message()),
                    PollState::Idle | PollState::Polling => {}
                }
            }
        }
        Command::Resume => match app.session.resume().await {
            Some(resume) => println!("{}", serde_json::to_string_pretty(&resume)?),
            None => println!("No resume cached"),
        },
        Command::RetryParse => {
            app.enter("/dashboard").await?;
            let id = app.resume_id().await?;
            let handle = outreach::services::resumes::retry_parse(&app.client, &id)
                .await
                .map_err(toast)?;
            let mut uploader = ResumeUploader::new(
                Arc::new(app.client.clone()),
                app.session.clone(),
                app.config.poll_policy(),
            );
            let outcome = uploader.start_polling(handle).wait().await;
            println!("{outcome:?}");
        }
        Command::Companies { query } => {
            app.enter("/emails").await?;
            let resume_id = app.resume_id().await?;
            let companies = emails::find_companies(&app.client, &resume_id, query.as_deref())
                .await
                .map_err(toast)?;
            for (i, company) in companies.iter().enumerate() {
                println!(
                    "{:>3}. {} {}",
                    i + 1,
                    company.name,
                    company.industry.as_deref().unwrap_or("")
                );
            }
        }
        Command::Generate { query, pick, out } => {
            app.enter("/emails").await?;
            let resume_id = app.resume_id().await?;
            let mut wizard = EmailWizard::new(Arc::new(app.client.clone()), resume_id);
            if wizard.find_companies(query.as_deref()).await.map_err(toast)? == 0 {
                bail!("No companies found");
            }
            if pick.is_empty() {
                wizard.select_all().map_err(toast)?;
            } else {
                for n in pick {
                    wizard.toggle(n.saturating_sub(1)).map_err(toast)?;
                }
            }
            wizard.generate().await.map_err(toast)?;
            let drafts = wizard.proceed_to_send().map_err(toast)?;
            std::fs::write(&out, serde_json::to_string_pretty(&drafts)?)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} drafts to {}", drafts.len(), out.display());
        }
        Command::Send {
            emails: path,
            retry_failed,
        } => {
            app.enter("/emails").await?;
            let resume_id = app.resume_id().await?;
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let drafts: Vec<GeneratedEmail> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a list of emails", path.display()))?;

            let sender = Arc::new(emails::CompanyEmailSender::new(app.client.clone(), resume_id));
            let queue = SendQueue::new(sender, app.config.pacing_policy());
            let summary = queue.send_all(&drafts).await.map_err(toast)?;

            if retry_failed {
                for draft in &drafts {
                    if queue.status(&draft.recipient).state == SendState::Failed {
                        queue.retry(draft).await;
                    }
                }
            }
            for draft in &drafts {
                let status = queue.status(&draft.recipient);
                println!(
                    "{:<40} {:?} (attempts: {}){}",
                    draft.recipient,
                    status.state,
                    status.attempts,
                    status.error.map(|e| format!(" - {e}")).unwrap_or_default()
                );
            }
            println!(
                "Batch: {} sent, {} failed; {} sent in total",
                summary.sent,
                summary.failed,
                queue.sent_count()
            );
        }
        Command::PaymentStatus => {
            app.enter("/payment").await?;
            let status = payment::payment_status(&app.client).await.map_err(toast)?;
            let valid = status.is_valid_at(chrono::Utc::now());
            match status.expiry_date {
                Some(expiry) => println!("Subscription valid: {valid} (expires {expiry})"),
                None => println!("Subscription valid: {valid}"),
            }
        }
        Command::Guard { path } => {
            let navigation = app.navigator.navigate(&path).await;
            match navigation.from {
                Some(from) => println!("{from} -> {}", navigation.path),
                None => println!("{} allowed", navigation.path),
            }
        }
    }

    Ok(())
}
