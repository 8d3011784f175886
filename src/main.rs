use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use scraper::{Html, Selector};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

use chapter_forge::chapters::ChapterPipeline;
use chapter_forge::config::LoggingConfig;
use chapter_forge::messages::{self, ExtensionRequest};
use chapter_forge::{ChapterSession, Config, LLMProvider, SnapshotPage, TranscriptExtractor};

const DEFAULT_PAGE_URL: &str = "https://www.youtube.com/watch";

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    if let Err(e) = run(matches).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("Chapter Forge")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Generate YouTube chapters from a watch page transcript")
        .arg(
            Arg::new("page")
                .short('p')
                .long("page")
                .value_name("FILE")
                .help("Saved HTML of a YouTube watch page")
                .required_unless_present("transcript")
        )
        .arg(
            Arg::new("transcript")
                .short('t')
                .long("transcript")
                .value_name("FILE")
                .help("Already extracted transcript text")
                .conflicts_with("page")
        )
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("Watch page URL (defaults to the page's canonical link)")
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
        )
        .arg(
            Arg::new("provider")
                .long("provider")
                .value_name("NAME")
                .help("Model provider: openai, anthropic or lmstudio")
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("MODEL")
                .help("Model name")
        )
        .arg(
            Arg::new("info")
                .long("info")
                .help("Print video id and title as JSON and exit")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("transcript-only")
                .long("transcript-only")
                .help("Print the extracted transcript and exit")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("no-spelling")
                .long("no-spelling")
                .help("Skip the spelling correction pass")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("copy")
                .long("copy")
                .help("Copy the chapters to the system clipboard")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
}

async fn run(matches: ArgMatches) -> Result<()> {
    // Configured level replaces the default filter after loading the config
    let verbose = matches.get_flag("verbose");
    let explicit_filter = if verbose {
        Some(EnvFilter::new("chapter_forge=debug,info"))
    } else {
        EnvFilter::try_from_default_env().ok()
    };
    let has_explicit_filter = explicit_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(explicit_filter.unwrap_or_else(|| EnvFilter::new(LoggingConfig::default().level)));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if !has_explicit_filter {
        filter_handle.reload(EnvFilter::new(&config.logging.level))?;
    }

    if let Some(name) = matches.get_one::<String>("provider") {
        let provider = LLMProvider::from_name(name)
            .with_context(|| format!("Unknown provider: {}", name))?;
        if provider != config.llm.provider {
            config.llm.provider = provider;
            config.llm.model = provider.default_model().to_string();
            config.llm.api_key = provider.api_key_env().and_then(|k| std::env::var(k).ok());
        }
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config.llm.model = model.clone();
    }
    if matches.get_flag("no-spelling") {
        config.pipeline.enable_spelling_correction = false;
    }

    info!("🚀 Chapter Forge starting...");

    let extractor = TranscriptExtractor::new(config.extractor.clone());

    let page = match matches.get_one::<String>("page") {
        Some(path) => Some(load_page(PathBuf::from(path), matches.get_one::<String>("url")).await?),
        None => None,
    };

    if let Some(page) = &page {
        if matches.get_flag("info") {
            let reply = messages::handle_request(&extractor, page, &ExtensionRequest::GetVideoInfo).await;
            println!("{}", serde_json::to_string_pretty(&reply)?);
            return Ok(());
        }

        if matches.get_flag("transcript-only") {
            let transcript = extractor.fetch_transcript(page).await?;
            println!("{}", transcript);
            return Ok(());
        }
    }

    config.validate()?;
    info!("{}", config.summary());

    let pipeline = ChapterPipeline::from_config(&config.llm, config.pipeline.clone()).await?;
    let mut session = ChapterSession::new(extractor, pipeline);
    if matches.get_flag("copy") {
        session = attach_clipboard(session);
    }

    let outcome = match (&page, matches.get_one::<String>("transcript")) {
        (Some(page), _) => session.generate_for_page(page).await?,
        (None, Some(path)) => {
            let transcript = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read transcript {}", path))?;
            session.generate_for_transcript(&transcript).await?
        }
        (None, None) => anyhow::bail!("Either --page or --transcript is required"),
    };

    if !outcome.result.corrected && config.pipeline.enable_spelling_correction {
        warn!("⚠️ Spelling correction skipped, showing the uncorrected draft");
    }
    info!("⏱️ Video duration: {}", outcome.result.video_duration);

    println!("{}", outcome.result.chapters);
    Ok(())
}

async fn load_page(path: PathBuf, url: Option<&String>) -> Result<SnapshotPage> {
    let html = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read page {}", path.display()))?;

    let url = match url {
        Some(url) => url.clone(),
        None => canonical_url(&html).unwrap_or_else(|| DEFAULT_PAGE_URL.to_string()),
    };

    info!("📄 Loaded page snapshot: {} ({})", path.display(), url);
    Ok(SnapshotPage::new(url, html))
}

fn canonical_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    [r#"link[rel="canonical"]"#, r#"meta[property="og:url"]"#]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document.select(&selector).next().and_then(|e| {
                e.value()
                    .attr("href")
                    .or_else(|| e.value().attr("content"))
                    .map(str::to_string)
            })
        })
}

#[cfg(feature = "clipboard")]
fn attach_clipboard(session: ChapterSession) -> ChapterSession {
    match chapter_forge::SystemClipboard::new() {
        Ok(clipboard) => session.with_clipboard(Box::new(clipboard)),
        Err(e) => {
            warn!("Clipboard unavailable: {}", e);
            session
        }
    }
}

#[cfg(not(feature = "clipboard"))]
fn attach_clipboard(session: ChapterSession) -> ChapterSession {
    warn!("Built without the `clipboard` feature, --copy ignored");
    session
}
