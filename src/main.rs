use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use receipt_client_core::{
    application::{
        ports::{
            http::HttpTransport,
            navigation::Navigator,
            notify::Notifier,
            storage::{DurableStore, KeyValueStore},
            time::Clock,
        },
        services::{ClientDependencies, ClientServices},
        upload::UploadOutcome,
    },
    config::AppConfig,
    domain::upload::{UploadFile, UploadStage, file::content_type_for},
    infrastructure::{
        http::ReqwestTransport,
        navigation::LoggingNavigator,
        notifications::TracingNotifier,
        storage::JsonFileStore,
        time::SystemClock,
    },
};
use std::{path::PathBuf, sync::Arc};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "receipt-client")]
#[command(about = "Sign in and upload receipts from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Email a sign-in link
    RequestLink { email: String },
    /// Exchange the token from a sign-in link for a session
    Login { token: String },
    /// Show the signed-in user's profile
    Profile,
    /// Upload a receipt and follow its processing
    Upload { path: PathBuf },
    /// Show the processing status of a receipt
    Status { receipt_id: String },
    /// End the session
    Logout,
}

#[tokio::main]
async fn main() {
    if let Err(err) = bootstrap().await {
        tracing::error!(error = %err, "fatal error");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn bootstrap() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let transport: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::new(config.api_base_url(), config.api_timeout())
            .context("building HTTP client")?,
    );
    let short_lived: Arc<dyn KeyValueStore> =
        Arc::new(JsonFileStore::open(config.storage_dir().join("session.json"))?);
    let durable: Arc<dyn DurableStore> =
        Arc::new(JsonFileStore::open(config.storage_dir().join("durable.json"))?);
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let navigator = Arc::new(LoggingNavigator::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let services = ClientServices::new(
        ClientDependencies {
            transport,
            short_lived,
            durable,
            notifier,
            navigator: Arc::clone(&navigator) as Arc<dyn Navigator>,
            clock,
        },
        config.client_settings(),
    )?;

    let result = run(cli.command, &services).await;
    if let Some(route) = navigator.current() {
        println!("next: {route}");
    }
    services.shutdown();
    result
}

async fn run(command: Command, services: &ClientServices) -> Result<()> {
    match command {
        Command::RequestLink { email } => {
            services.auth.request_magic_link(&email).await?;
            println!("Sign-in link sent to {email}.");
        }
        Command::Login { token } => {
            let login = services.auth.verify_magic_link(&token).await?;
            let greeting = if login.is_new_user { "Welcome" } else { "Welcome back" };
            println!("{greeting}, {}.", login.user.display_name());
        }
        Command::Profile => {
            let profile = services.auth.fetch_profile().await?;
            println!("{} <{}>", profile.display_name(), profile.email);
            println!("email verified: {}", profile.is_email_verified);
            if let Some(pending) = services.session.snapshot().pending_email {
                println!("pending email: {pending}");
            }
        }
        Command::Upload { path } => upload(services, path).await?,
        Command::Status { receipt_id } => {
            let status = services.receipts.upload_status(&receipt_id).await?;
            println!("status: {}", status.status());
            if let Some(progress) = status.progress() {
                println!("progress: {progress}%");
            }
            if let Some(stage) = status.current_stage {
                println!("stage: {stage}");
            }
            if let Some(message) = status.error_message {
                println!("error: {message}");
            }
        }
        Command::Logout => {
            services.auth.logout().await?;
            println!("Signed out.");
        }
    }
    Ok(())
}

async fn upload(services: &ClientServices, path: PathBuf) -> Result<()> {
    if !services.session.is_authenticated() {
        bail!("not signed in; run `receipt-client login <token>` first");
    }
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "receipt".to_owned(), |name| name.to_string_lossy().into_owned());
    let file = UploadFile::new(file_name.clone(), content_type_for(&file_name), bytes);

    let controller = services.upload_controller();
    let mut updates = controller.watch();
    match controller.start_upload(file).await? {
        UploadOutcome::Processing { receipt_id } => println!("uploaded; receipt {receipt_id} is processing"),
        UploadOutcome::Duplicate {
            existing_receipt_id,
            message,
        } => {
            println!("{message}");
            if let Some(id) = existing_receipt_id {
                println!("existing receipt: {id}");
            }
            return Ok(());
        }
        UploadOutcome::Superseded => return Ok(()),
    }

    let mut last_progress = None;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                controller.cancel();
                println!("cancelled");
                break;
            }
        }
        let state = updates.borrow_and_update().clone();
        match state.stage {
            UploadStage::Processing if last_progress != Some(state.processing_progress) => {
                last_progress = Some(state.processing_progress);
                let phase = state.current_phase.as_deref().unwrap_or("processing");
                println!("{phase}: {}%", state.processing_progress);
            }
            UploadStage::Complete => println!("done"),
            UploadStage::Select => break,
            _ => {}
        }
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .unwrap_or_else(|| "info,receipt_client_core=warn,notification=info".to_string());

    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    if subscriber.try_init().is_err() {
        tracing::warn!("tracing subscriber already initialised");
    }
}
