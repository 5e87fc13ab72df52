use std::path::PathBuf;

use anyhow::{bail, Context};
use client_logging::client_info;
use research_client::{
    CancellationToken, PdfDocument, PollOutcome, ResearchClient,
};
use url::Url;

use crate::render;
use crate::Command;

pub async fn run(client: &ResearchClient, command: Command) -> anyhow::Result<()> {
    let session = &client.session;
    match command {
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            println!("Signed in as {}", render::user(&user));
            settle_prefetch(client).await;
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let user = session.register(&username, &email, &password).await?;
            println!("Registered and signed in as {}", render::user(&user));
            settle_prefetch(client).await;
        }
        Command::Logout => {
            session.logout().await?;
            println!("Signed out.");
        }
        Command::Whoami => {
            session.init().await;
            match session.current_user() {
                Some(user) => println!("{}", render::user(&user)),
                None => println!("Not signed in."),
            }
            if let Some(prefetch) = session.take_prefetch() {
                prefetch.abort();
            }
        }
        Command::OauthStart => {
            let url = session.sign_in_with_external_provider().await?;
            println!("Open this URL to continue sign-in:\n{url}");
        }
        Command::OauthCallback { url } => {
            let callback = Url::parse(&url).context("callback is not a URL")?;
            let user = session.complete_external_sign_in(&callback).await?;
            println!("Signed in as {}", render::user(&user));
            settle_prefetch(client).await;
        }
        Command::Submit {
            topic,
            context,
            no_wait,
        } => {
            require_session(client).await?;
            let job = client
                .research
                .submit(&topic, context.as_deref())
                .await?;
            println!("Submitted {} ({:?})", job.id, job.status);
            if !no_wait {
                watch(client, &job.id).await?;
            }
        }
        Command::Watch { id } => {
            require_session(client).await?;
            watch(client, &id).await?;
        }
        Command::Show { id } => {
            require_session(client).await?;
            let report = client.research.report(&id).await?;
            println!("{}", render::report(&report));
        }
        Command::History => {
            require_session(client).await?;
            let history = client.research.history().await?;
            println!("{}", render::history(&history));
        }
        Command::Pdf { id, output } => {
            require_session(client).await?;
            let document = client.research.download_pdf(&id).await?;
            let path =
                output.unwrap_or_else(|| PathBuf::from(PdfDocument::suggested_filename(&id)));
            std::fs::write(&path, &document.bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Saved {} ({} bytes)", path.display(), document.bytes.len());
        }
        Command::Prefetch => {
            require_session(client).await?;
            let summary = client.prefetch.prefetch_all().await;
            println!(
                "Cached {} of {} reports",
                summary.cached, summary.history_len
            );
            for id in summary.failed {
                println!("  skipped {id}");
            }
        }
    }
    Ok(())
}

/// Restores the stored session, leaving the cache warm-up to the command itself.
async fn require_session(client: &ResearchClient) -> anyhow::Result<()> {
    let session = &client.session;
    session.init().await;
    if let Some(prefetch) = session.take_prefetch() {
        prefetch.abort();
    }
    if !session.is_authenticated() {
        bail!("Not signed in. Run `research login` first.");
    }
    Ok(())
}

/// The process exits right after sign-in, so the detached warm-up is given a chance to land.
async fn settle_prefetch(client: &ResearchClient) {
    if let Some(prefetch) = client.session.take_prefetch() {
        match prefetch.await {
            Ok(summary) => client_info!(
                "Prefetched {} of {} reports",
                summary.cached,
                summary.history_len
            ),
            Err(err) => client_info!("Prefetch did not finish: {}", err),
        }
    }
}

async fn watch(client: &ResearchClient, id: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = client
        .poller
        .watch(id, &cancel, &render::ProgressPrinter)
        .await;
    interrupt.abort();

    match outcome? {
        PollOutcome::Completed(report) => println!("{}", render::report(&report)),
        PollOutcome::Failed(message) => bail!(message),
        PollOutcome::Cancelled => println!("Stopped watching {id}."),
    }
    Ok(())
}
