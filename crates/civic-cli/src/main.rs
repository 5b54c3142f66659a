mod config;

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use civic_api::geocode::{FallbackGeocoder, LocationIqGeocoder, MapboxGeocoder, ReverseGeocoder};
use civic_api::{ApiClient, ApiConfig, CivicApi};
use civic_gateway::{WsClient, WsConfig};
use civic_pages::discussion::{Delivery, SendError};
use civic_pages::polls::KindFilter;
use civic_pages::verification::VerificationState;
use civic_pages::{
    AnnouncementsPage, DiscussionPage, EmergencyPage, LocationPage, PageState, PollsPage, Toast,
    VerificationPage,
};
use civic_types::api::{PostResults, VoteRequest};
use civic_types::models::{Coordinates, PostKind};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "civic")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Announcements, polls, emergency contacts and discussions for your community")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (overrides CIVIC_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List announcements
    Announcements {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// List emergency services
    Emergency {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// List polls and surveys
    Polls {
        #[arg(short, long, value_enum, default_value = "all")]
        kind: KindArg,
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Vote on a poll or answer a survey
    #[command(group(ArgGroup::new("answer").required(true).args(["option", "response", "rating"])))]
    Vote {
        post_id: String,
        /// Poll option text
        #[arg(long)]
        option: Option<String>,
        /// Free-text survey response
        #[arg(long)]
        response: Option<String>,
        /// Survey rating
        #[arg(long)]
        rating: Option<u8>,
    },

    /// Show the results of a poll or survey
    Results { post_id: String },

    /// Confirm registration with the emailed code
    Verify { code: String },

    /// List your discussions
    Chats,

    /// Join a discussion: lines from stdin are sent, new messages are printed.
    /// `/quit` or end of input leaves.
    Chat { chat_id: String },

    /// Name the place at the given coordinates
    Locate {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    All,
    Polls,
    Surveys,
}

impl From<KindArg> for KindFilter {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::All => KindFilter::All,
            KindArg::Polls => KindFilter::Polls,
            KindArg::Surveys => KindFilter::Surveys,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "civic=info,civic_api=info,civic_gateway=info,civic_pages=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url)?;
    }

    let client = ApiClient::new(ApiConfig {
        base_url: config.api_url.clone(),
        token: config.token.clone(),
        timeout: config.http_timeout,
    })
    .with_context(|| format!("invalid API url {}", config.api_url))?;
    info!("Using API at {}", client.base_url());

    match cli.command {
        Commands::Announcements { search } => announcements(Arc::new(client), search).await,
        Commands::Emergency { search } => emergency(Arc::new(client), search).await,
        Commands::Polls { kind, search } => polls(Arc::new(client), kind.into(), search).await,
        Commands::Vote {
            post_id,
            option,
            response,
            rating,
        } => {
            let vote = match (option, response, rating) {
                (Some(option), _, _) => VoteRequest::Option(option),
                (_, Some(response), _) => VoteRequest::Response(response),
                (_, _, Some(rating)) => VoteRequest::Rating(rating),
                _ => bail!("one of --option, --response or --rating is required"),
            };
            vote_on(Arc::new(client), &post_id, vote).await
        }
        Commands::Results { post_id } => results(Arc::new(client), &post_id).await,
        Commands::Verify { code } => verify(Arc::new(client), &code).await,
        Commands::Chats => chats(&config, client).await,
        Commands::Chat { chat_id } => chat(&config, client, &chat_id).await,
        Commands::Locate { lat, lon } => {
            locate(
                &config,
                &client,
                Coordinates {
                    latitude: lat,
                    longitude: lon,
                },
            )
            .await
        }
    }
}

fn print_toast(toast: Option<Toast>) {
    if let Some(toast) = toast {
        eprintln!("{}", toast.text);
    }
}

async fn announcements(api: Arc<dyn CivicApi>, search: Option<String>) -> anyhow::Result<()> {
    let mut page = AnnouncementsPage::new(api);
    page.load().await;
    page.set_query(search.unwrap_or_default());

    if let Some(banner) = page.banner() {
        println!("{}", banner);
        return Ok(());
    }
    for card in page.cards(Utc::now()) {
        println!("{}", card.title);
        if let Some(location) = &card.location {
            println!("  @ {}", location);
        }
        if !card.summary.is_empty() {
            println!("  {}", card.summary);
        }
        if let Some(posted) = &card.posted {
            println!("  {}", posted);
        }
    }
    Ok(())
}

async fn emergency(api: Arc<dyn CivicApi>, search: Option<String>) -> anyhow::Result<()> {
    let mut page = EmergencyPage::new(api);
    page.load().await;
    page.set_query(search.unwrap_or_default());

    if let Some(banner) = page.banner() {
        println!("{}", banner);
        return Ok(());
    }
    for service in page.visible() {
        println!("{:<32} {:<16} {}", service.title, service.contact, service.location);
    }
    Ok(())
}

async fn polls(api: Arc<dyn CivicApi>, kind: KindFilter, search: Option<String>) -> anyhow::Result<()> {
    let mut page = PollsPage::new(api);
    page.load().await;
    page.set_filter(kind);
    page.set_query(search.unwrap_or_default());

    if let Some(banner) = page.banner() {
        println!("{}", banner);
        return Ok(());
    }
    for post in page.visible() {
        let kind = match post.kind {
            PostKind::Poll => "poll",
            PostKind::Survey => "survey",
        };
        let voted = if post.has_voted { " (voted)" } else { "" };
        println!("[{}] {} {}{}", kind, post.id, post.title, voted);
        for option in &post.options {
            println!("    {:<24} {}", option.text, option.votes);
        }
        if let Some(scale) = post.rating_scale {
            println!("    rating 1-{}", scale);
        }
    }
    Ok(())
}

async fn vote_on(api: Arc<dyn CivicApi>, post_id: &str, vote: VoteRequest) -> anyhow::Result<()> {
    let mut page = PollsPage::new(api);
    page.load().await;
    if let PageState::Failed(e) = page.state() {
        bail!("could not load posts: {}", e);
    }

    let result = page.vote(post_id, vote).await;
    print_toast(page.take_toast());
    result?;
    Ok(())
}

async fn results(api: Arc<dyn CivicApi>, post_id: &str) -> anyhow::Result<()> {
    let mut page = PollsPage::new(api);
    match page.load_results(post_id).await {
        Some(PostResults::Ratings(summary)) => {
            println!("average {:.2} from {} ratings", summary.average, summary.count);
        }
        Some(PostResults::Responses(responses)) => {
            for response in responses {
                println!("- {}", response);
            }
        }
        Some(results) => {
            for (option, count) in results.tally().unwrap_or_default() {
                println!("{:<24} {}", option, count);
            }
        }
        None => {
            print_toast(page.take_toast());
            bail!("no results for {}", post_id);
        }
    }
    Ok(())
}

async fn verify(api: Arc<dyn CivicApi>, code: &str) -> anyhow::Result<()> {
    let mut page = VerificationPage::new(api);
    match page.submit(code).await {
        VerificationState::Verified(message) => {
            println!("{}", message);
            Ok(())
        }
        VerificationState::Failed(message) => bail!("{}", message),
        VerificationState::Idle => Ok(()),
    }
}

fn user_id(config: &Config, client: &ApiClient) -> anyhow::Result<String> {
    config
        .user_id
        .clone()
        .or_else(|| client.claims().and_then(|c| c.user_id().map(str::to_string)))
        .context("no user id: set CIVIC_USER_ID or CIVIC_TOKEN")
}

async fn open_discussion(config: &Config, client: ApiClient) -> anyhow::Result<DiscussionPage> {
    let me = user_id(config, &client)?;
    let socket = Arc::new(WsClient::new(WsConfig::new(config.socket_url.clone())));
    let mut page = DiscussionPage::mount(Arc::new(client), socket, &me).await;
    print_toast(page.take_toast());
    Ok(page)
}

async fn chats(config: &Config, client: ApiClient) -> anyhow::Result<()> {
    let page = open_discussion(config, client).await?;
    if let Some(banner) = page.chats_banner() {
        println!("{}", banner);
    } else {
        for entry in page.chats().items() {
            let latest = entry
                .chat
                .latest_message
                .as_ref()
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            println!("{:<26} {:<24} {}", entry.chat.id, entry.title, latest);
        }
    }
    page.unmount().await;
    Ok(())
}

async fn chat(config: &Config, client: ApiClient, chat_id: &str) -> anyhow::Result<()> {
    let mut page = open_discussion(config, client).await?;
    page.open_chat(chat_id).await;
    if let Some(banner) = page.messages_banner() {
        println!("{}", banner);
    }

    let mut printed = 0;
    let mut live = page.is_live();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let transcript = page.transcript(Utc::now());
        for line in transcript.iter().skip(printed) {
            let when = line.when.as_deref().unwrap_or_default();
            println!("[{}] {}: {}", when, line.author, line.text);
        }
        printed = transcript.len();

        tokio::select! {
            line = lines.next_line() => {
                let Some(text) = line? else { break };
                if text.trim() == "/quit" {
                    break;
                }
                match page.send(&text).await {
                    Ok(()) | Err(SendError::Empty) => {}
                    Err(e) => {
                        print_toast(page.take_toast());
                        eprintln!("not sent: {}", e);
                    }
                }
            }
            delivery = page.next_event(), if live => {
                match delivery {
                    Some(Delivery::Unread(other)) => {
                        eprintln!("(new message in {}, {} unread)", other, page.unread(&other));
                    }
                    Some(_) => {}
                    None => {
                        live = false;
                        eprintln!("live updates stopped");
                    }
                }
            }
        }
    }

    page.unmount().await;
    Ok(())
}

async fn locate(config: &Config, client: &ApiClient, at: Coordinates) -> anyhow::Result<()> {
    let mut providers: Vec<Arc<dyn ReverseGeocoder>> = Vec::new();
    if let Some(mapbox) = &config.mapbox {
        providers.push(Arc::new(MapboxGeocoder::new(
            client.http().clone(),
            &mapbox.base_url,
            mapbox.key.clone(),
        )?));
    }
    if let Some(liq) = &config.locationiq {
        providers.push(Arc::new(LocationIqGeocoder::new(
            client.http().clone(),
            &liq.base_url,
            liq.key.clone(),
        )?));
    }
    let chain = FallbackGeocoder::new(providers);
    if chain.is_empty() {
        bail!("no geocoding provider configured: set CIVIC_MAPBOX_TOKEN or CIVIC_LOCATIONIQ_KEY");
    }

    let mut page = LocationPage::new(Arc::new(chain));
    match page.locate(at).await {
        PageState::Loaded(place) => {
            println!("{} (via {})", place.name, place.provider);
            Ok(())
        }
        PageState::Failed(e) => bail!("{}", e),
        _ => Ok(()),
    }
}
