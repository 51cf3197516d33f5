use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::future::try_join_all;
use tracing::{debug, warn};

use efacture_core::auth::Credential;
use efacture_core::models::FilePayload;
use efacture_core::utils::{format_bytes, format_timestamp, preview_secret};
use efacture_core::{store, Config, PlatformClient, Preferences, UploadWorkflow};

/// Build the platform client and its token store around one HTTP client.
pub fn connect(config: Config) -> Result<Arc<PlatformClient>> {
    let http = PlatformClient::build_http_client(config.platform.request_timeout)
        .context("Failed to build HTTP client")?;
    let store = store::from_config(&config.store, http.clone());
    debug!(store = store.name(), "Token store ready");
    Ok(Arc::new(PlatformClient::with_http(http, config.platform, store)))
}

pub async fn authenticate(client: &PlatformClient, login: Option<String>) -> Result<()> {
    let mut prefs = Preferences::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load preferences; using defaults");
        Preferences::default()
    });

    let login = match login.or_else(|| prefs.last_login.clone()) {
        Some(login) => login,
        None => prompt_login()?,
    };
    let password = match std::env::var("EFACTURE_PASSWORD") {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    let credential = Credential::new(login, password);
    if !credential.is_complete() {
        return Err(anyhow!("Login and password are required"));
    }

    println!("Authenticating as {}...", credential.login);
    let response = client
        .authenticate(&credential.login, &credential.password)
        .await
        .context("Authentication failed")?;

    prefs.last_login = Some(credential.login.clone());
    if let Err(e) = prefs.save() {
        warn!(error = %e, "Failed to save preferences");
    }

    match response.display_name {
        Some(name) => println!("Authenticated as {}", name),
        None => println!("Authenticated"),
    }
    if let Some(token) = client.store().fetch(client.config().subscription_id.trim()).await? {
        println!("Token valid until {}", format_timestamp(&token.expires_at));
    }
    Ok(())
}

pub async fn upload(client: Arc<PlatformClient>, paths: &[PathBuf], complete: bool) -> Result<()> {
    let files = try_join_all(paths.iter().map(|path| async move {
        FilePayload::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }))
    .await?;

    let mut workflow = UploadWorkflow::new(client);

    let mut phases = workflow.subscribe();
    let progress = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = phases.borrow_and_update().clone();
            eprintln!("[{}] {}", phase.name(), phase);
        }
    });

    let result = run_upload(&mut workflow, files, complete).await;

    drop(workflow);
    if let Err(e) = progress.await {
        warn!(error = %e, "Progress printer stopped abnormally");
    }
    result
}

async fn run_upload(workflow: &mut UploadWorkflow, files: Vec<FilePayload>, complete: bool) -> Result<()> {
    let total: u64 = files.iter().map(FilePayload::size).sum();
    let count = files.len();
    workflow.select_files(files)?;

    let session = workflow
        .create_session()
        .await
        .context("Failed to create upload session")?;
    println!("Upload id: {}", session.upload_id);

    workflow
        .upload_content()
        .await
        .context("Failed to upload file content")?;
    println!("Uploaded {} file(s), {}", count, format_bytes(total));

    if complete {
        let job = workflow.complete().await.context("Failed to complete upload")?;
        println!("Job id: {}", job.job_id);
    }
    Ok(())
}

pub async fn complete(client: &PlatformClient, upload_id: &str) -> Result<()> {
    let job = client
        .complete_upload(upload_id)
        .await
        .with_context(|| format!("Failed to complete upload {}", upload_id))?;
    println!("Job id: {}", job.job_id);
    Ok(())
}

pub async fn token(client: &PlatformClient) -> Result<()> {
    let subscription_id = client.config().subscription_id()?;
    let token = client
        .store()
        .fetch(subscription_id)
        .await
        .context("Failed to read token store")?;

    let Some(token) = token else {
        println!("No token stored for subscription {}", subscription_id);
        return Ok(());
    };

    println!("Subscription: {}", token.subscription_id);
    println!("Login:        {}", token.login);
    println!("Expires at:   {}", format_timestamp(&token.expires_at));
    if token.is_expired() {
        println!("Status:       expired");
    } else {
        println!("Status:       valid ({} min left)", token.minutes_until_expiry());
    }
    println!("Token:        {}", preview_secret(&token.token));
    Ok(())
}

fn prompt_login() -> Result<String> {
    print!("Login: ");
    io::stdout().flush()?;

    let mut login = String::new();
    io::stdin().read_line(&mut login)?;
    Ok(login.trim().to_string())
}
