use std::{future::Future, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use shortreels_core::{
    ApiClient, ClientConfig, ConfigOverrides, Environment, MAX_WORDS, MIN_WORDS, PaymentOutcome,
    RequestStatus, Session, ShortreelsError, ViewReceiver, can_generate, events::AvailabilityNotice,
    format_price, view_channel, word_count,
};
use url::Url;

use crate::{checkout::TerminalCheckout, view::Renderer};

mod checkout;
mod signals;
mod trace;
mod view;

/// CLI wrapper for Environment enum (needed for clap ValueEnum)
#[derive(Clone, ValueEnum)]
enum CliEnvironment {
    Local,
    Production,
}

impl From<CliEnvironment> for Environment {
    fn from(cli: CliEnvironment) -> Self {
        match cli {
            CliEnvironment::Local => Environment::Local,
            CliEnvironment::Production => Environment::Production,
        }
    }
}

#[derive(Parser)]
#[command(name = "shortreels")]
#[command(about = "Turn a short text into a video, follow it to the preview and unlock the full copy")]
struct Cli {
    /// Backend to use. Defaults to SHORTREELS_ENV, then production
    #[arg(long, global = true)]
    env: Option<CliEnvironment>,

    /// Backend host (e.g. "http://localhost:8000"), overrides --env
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory holding the saved session
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a video from 5 to 50 words and follow it (Ctrl-C cancels)
    Generate {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Resume saved requests and follow them
    Watch,
    /// Look up a request on the backend
    Status { request_id: String },
    /// Cancel a running request
    Cancel { request_id: String },
    /// Which copies of a video are still downloadable
    Availability { request_id: String },
    /// Pay to remove the watermark
    Pay { request_id: String },
    /// Continue from a payment landing URL
    Redirect { url: String },
    /// Save a video to disk
    Download {
        request_id: String,

        /// Target directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Download the free watermarked preview instead of the paid copy
        #[arg(long)]
        preview: bool,
    },
    /// Current watermark removal price
    Pricing,
    /// Backend capacity, health and active requests
    Server,
    /// Cancel everything immediately and forget the saved session
    Reset,
    /// Count words and check whether the text can be submitted
    Words {
        #[arg(num_args = 0..)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    trace::init_tracing(cli.verbose);

    if let Command::Words { text } = &cli.command {
        print_words(&text.join(" "));
        return Ok(());
    }

    let config = match ClientConfig::load(ConfigOverrides {
        environment: cli.env.map(Into::into),
        base_url: cli.base_url,
        state_dir: cli.state_dir,
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    println!(
        "\n{}  {}\n",
        style("shortreels").cyan().bold(),
        style(format!("{} ({})", config.host, config.environment.name())).dim()
    );

    let (tx, mut view) = view_channel();
    let session = Session::new(ApiClient::new(config), tx);

    if let Err(e) = run(cli.command, &session, &mut view).await {
        let message = match e.downcast_ref::<ShortreelsError>() {
            Some(err) => err.user_message(),
            None => e.to_string(),
        };
        tracing::debug!(error = %e, "command failed");
        eprintln!("{} {}", style("Error:").red().bold(), message);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Command, session: &Session, view: &mut ViewReceiver) -> Result<()> {
    match command {
        Command::Generate { text } => with_state(session, generate(session, view, text)).await,
        Command::Watch => with_state(session, watch(session, view)).await,
        Command::Cancel { request_id } => with_state(session, cancel(session, view, request_id)).await,
        Command::Pay { request_id } => with_state(session, pay(session, view, request_id)).await,
        Command::Redirect { url } => with_state(session, redirect(session, view, url)).await,
        Command::Reset => {
            session.resume().await;
            session.reset().await?;
            println!("{} Session cleared", style("✓").green().bold());
            Ok(())
        }
        Command::Status { request_id } => status(session, &request_id).await,
        Command::Availability { request_id } => availability(session, &request_id).await,
        Command::Download {
            request_id,
            out,
            preview,
        } => {
            let path = session.download(&request_id, preview, &out).await?;
            Renderer::new(&[request_id]).flush(view);
            println!("{} Saved {}", style("✓").green().bold(), path.display());
            Ok(())
        }
        Command::Pricing => pricing(session).await,
        Command::Server => server(session).await,
        Command::Words { .. } => Ok(()),
    }
}

/// Run `work` with the background timers up and save the session afterwards.
async fn with_state<F>(session: &Session, work: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    session.start();
    let result = work.await;
    session.dispose().await;
    result
}

fn print_words(text: &str) {
    let count = word_count(text);
    let verdict = if can_generate(text) {
        style("ready to generate".to_string()).green()
    } else {
        style(format!("needs {}-{} words", MIN_WORDS, MAX_WORDS)).yellow()
    };
    println!("{} words, {}", count, verdict);
}

/// Print the outcome of `request_id`. A finished request has now been seen
/// and is forgotten.
fn print_request(session: &Session, request_id: &str) {
    let Some(request) = session.request(request_id) else {
        println!(
            "{} Request {} is no longer tracked",
            style("!").yellow().bold(),
            request_id
        );
        return;
    };

    match request.status {
        RequestStatus::Completed => {
            if let Some(url) = &request.paid_video_url {
                println!("{} Full video: {}", style("✓").green().bold(), url);
            } else if let Some(url) = &request.watermarked_url {
                println!("{} Preview: {}", style("✓").green().bold(), url);
                println!(
                    "  {}",
                    style(format!("Remove the watermark: shortreels pay {}", request_id)).dim()
                );
            }
        }
        RequestStatus::Failed => println!(
            "{} {}",
            style("✗").red().bold(),
            request.error.as_deref().unwrap_or("Video generation failed")
        ),
        RequestStatus::Cancelled => {
            println!("{} Generation cancelled", style("!").yellow().bold())
        }
        other => println!(
            "{} Still {:?}, resume with `shortreels watch`",
            style("…").dim(),
            other
        ),
    }
    if request.is_terminal() {
        session.acknowledge(request_id);
    }
}

async fn generate(session: &Session, view: &mut ViewReceiver, text: Vec<String>) -> Result<()> {
    session.resume().await;
    // only the new request is followed
    view.drain();

    let request_id = session.submit(&text.join(" ")).await?;
    println!(
        "{} Submitted {}",
        style("✓").green().bold(),
        style(&request_id).dim()
    );

    let mut renderer = Renderer::new(std::slice::from_ref(&request_id));
    renderer.follow(session, view).await;
    print_request(session, &request_id);
    Ok(())
}

async fn watch(session: &Session, view: &mut ViewReceiver) -> Result<()> {
    let mut ids = session.resume().await;
    if let Some(current) = session.current_request_id()
        && !ids.contains(&current)
    {
        ids.push(current);
    }
    if ids.is_empty() {
        println!("{} Nothing to follow", style("✓").green().bold());
        return Ok(());
    }

    let mut renderer = Renderer::new(&ids);
    renderer.follow(session, view).await;
    for id in &ids {
        print_request(session, id);
    }
    Ok(())
}

async fn cancel(session: &Session, view: &mut ViewReceiver, request_id: String) -> Result<()> {
    session.resume().await;
    view.drain();

    if session.request(&request_id).is_some() {
        session.cancel(&request_id).await?;
    } else {
        session
            .api()
            .cancel_generation(&request_id, false)
            .await
            .map_err(ShortreelsError::from)?;
    }
    Renderer::new(&[request_id]).flush(view);
    println!("{} Cancelled", style("✓").green().bold());
    Ok(())
}

async fn pay(session: &Session, view: &mut ViewReceiver, request_id: String) -> Result<()> {
    session.resume().await;
    view.drain();

    let checkout = TerminalCheckout::new();
    let outcome = session.pay(&request_id, &checkout).await;
    Renderer::new(std::slice::from_ref(&request_id)).flush(view);

    match outcome? {
        PaymentOutcome::Unlocked { paid_video_url } => {
            println!(
                "  {}",
                style(format!(
                    "Download: shortreels download {} ({})",
                    request_id, paid_video_url
                ))
                .dim()
            );
            session.acknowledge(&request_id);
        }
        PaymentOutcome::Dismissed | PaymentOutcome::Failed { .. } => {}
    }
    Ok(())
}

async fn redirect(session: &Session, view: &mut ViewReceiver, raw: String) -> Result<()> {
    let landing = Url::parse(&raw)?;
    session.resume().await;
    view.drain();

    let clean = session.resume_from_redirect(&landing).await;
    let request_id = session.current_request_id();
    let followed: Vec<String> = request_id.iter().cloned().collect();
    let mut renderer = Renderer::new(&followed);
    renderer.flush(view);
    let clean = clean?;

    if let Some(id) = &request_id {
        if session.request(id).is_some_and(|r| !r.is_terminal()) {
            renderer.follow(session, view).await;
        }
        print_request(session, id);
    }
    println!("  {}", style(clean.as_str()).dim());
    Ok(())
}

async fn status(session: &Session, request_id: &str) -> Result<()> {
    let response = session
        .api()
        .lookup_request(request_id)
        .await
        .map_err(ShortreelsError::from)?;

    println!("{} {:?}", style("Status:").bold(), response.status);
    if let Some(step) = &response.current_step {
        println!("  {} {}", style("Step:").dim(), step);
    }
    if let Some(progress) = response.progress {
        println!("  {} {:.0}%", style("Progress:").dim(), progress);
    }
    if let Some(position) = response.queue_position {
        println!("  {} {}", style("Queue position:").dim(), position);
    }
    if let Some(eta) = &response.estimated_time {
        println!("  {} {}", style("Estimated wait:").dim(), eta);
    }
    if let Some(message) = &response.message {
        println!("  {} {}", style("Message:").dim(), message);
    }
    if let Some(error) = &response.error {
        println!("  {} {}", style("Error:").red(), error);
    }
    if let Some(url) = &response.watermarked_url {
        println!("  {} {}", style("Preview:").dim(), session.api().config().resolve(url));
    }
    if let Some(url) = &response.non_watermarked_url {
        println!("  {} {}", style("Full video:").dim(), session.api().config().resolve(url));
    }
    Ok(())
}

async fn availability(session: &Session, request_id: &str) -> Result<()> {
    let record = session
        .api()
        .video_status(request_id)
        .await
        .map_err(ShortreelsError::from)?;

    if !record.any_available() {
        println!(
            "{} Video {} is no longer available",
            style("!").yellow().bold(),
            request_id
        );
        return Ok(());
    }

    let mark = |available: bool| {
        if available {
            style("yes").green()
        } else {
            style("no").dim()
        }
    };
    println!("  {} {}", style("Preview:").dim(), mark(record.watermarked_available));
    println!("  {} {}", style("Full video:").dim(), mark(record.non_watermarked_available));
    println!("  {} {}", style("Paid:").dim(), mark(record.is_paid));
    if let Some(notice) = AvailabilityNotice::for_record(&record) {
        println!("  {}", style(notice.message()).dim());
    }
    Ok(())
}

async fn pricing(session: &Session) -> Result<()> {
    let pricing = session.fetch_pricing().await?;
    println!(
        "{} Watermark removal: {} {}",
        style("✓").green().bold(),
        style(&pricing.formatted_price).bold(),
        style(format!(
            "({}, {} {} smallest unit)",
            format_price(pricing.price, &pricing.currency),
            pricing.amount_in_smallest_unit,
            pricing.currency
        ))
        .dim()
    );
    Ok(())
}

async fn server(session: &Session) -> Result<()> {
    let api = session.api();
    let (status, health, active) =
        tokio::join!(api.server_status(), api.health(), api.active_requests());
    let status = status.map_err(ShortreelsError::from)?;
    let health = health.map_err(ShortreelsError::from)?;
    let active = active.map_err(ShortreelsError::from)?;

    let health_label = if health.is_healthy() {
        style(health.status.clone()).green()
    } else {
        style(health.status.clone()).red()
    };
    println!("{} {}", style("Health:").bold(), health_label);
    println!(
        "{} {} ({}/{} processing, {} queued, {} free)",
        style("Server:").bold(),
        status.status,
        status.active_requests,
        status.max_concurrent,
        status.queue_size,
        status.available_slots.max(0)
    );

    if active.active_requests.is_empty() {
        println!("  {}", style("No active requests").dim());
    }
    for entry in &active.active_requests {
        let position = entry
            .queue_position
            .map(|p| format!(" #{}", p))
            .unwrap_or_default();
        println!(
            "  {} {:?}{} {:.0}% {}",
            style(&entry.request_id).dim(),
            entry.status,
            position,
            entry.progress,
            entry.current_step.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
