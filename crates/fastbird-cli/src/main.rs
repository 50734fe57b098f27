//! Terminal host for the Fast Bird assistant widget.

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use fastbird_audio::AudioOutput;
use fastbird_core::config::Config;
use fastbird_core::content::{ContentCatalog, Lang};
use fastbird_core::session::{Message, Sender};
use fastbird_core::store::{ChatSessionStore, FileKvStore, KvStore, MemoryKvStore, StoreScope};
use fastbird_gemini::{GeminiClient, VoiceId};
use fastbird_widget::{parse_markup, ChatWidget, MessageNode, SubmitOutcome};

const VOICE_PREF_KEY: &str = "settings.voice";

#[derive(Parser)]
#[command(
    name = "fastbird",
    about = "Chat with Sha'a, The Fast Bird shipping assistant",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant (type /quit to leave)
    Chat {
        /// Voice for spoken replies (see `fastbird voices`)
        #[arg(long)]
        voice: Option<String>,

        /// Disable speech playback
        #[arg(long)]
        mute: bool,

        /// Display language: ar (default) or en
        #[arg(long)]
        lang: Option<String>,
    },

    /// List the available synthesis voices
    Voices,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration as JSON
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Chat { voice, mute, lang } => run_chat(&config, voice, mute, lang).await,
        Commands::Voices => {
            for voice in VoiceId::all() {
                println!("{} ({})", voice, voice.gender());
            }
            Ok(())
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => {
            println!("# {}", config_path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_chat(
    config: &Config,
    voice: Option<String>,
    mute: bool,
    lang: Option<String>,
) -> anyhow::Result<()> {
    let lang = match lang.as_deref() {
        Some("en") => Lang::En,
        _ => Lang::Ar,
    };

    let assistant = config.assistant();
    let backend = Arc::new(GeminiClient::from_config(&assistant));
    if !backend.has_api_key() {
        tracing::warn!(
            "No assistant API key configured (set GEMINI_API_KEY); replies will fall back"
        );
    }

    // The chat session lives only as long as this process; the voice
    // preference goes to the longer-lived app-scoped store.
    let session_kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let app_store = FileKvStore::new(config.storage_dir(), StoreScope::App);

    let chosen_voice = match &voice {
        Some(name) => {
            let parsed = VoiceId::parse(name)
                .ok_or_else(|| anyhow::anyhow!("unknown voice '{name}', try `fastbird voices`"))?;
            app_store.set(VOICE_PREF_KEY, parsed.as_str()).await?;
            parsed
        }
        None => app_store
            .get(VOICE_PREF_KEY)
            .await
            .and_then(|name| VoiceId::parse(&name))
            .unwrap_or_default(),
    };

    let muted = mute || config.audio.as_ref().is_some_and(|a| a.muted);
    let audio = if muted {
        None
    } else {
        Some(Arc::new(AudioOutput::new(
            config.audio.as_ref().and_then(|a| a.output_device.clone()),
        )))
    };

    let mut widget = ChatWidget::mount(
        ChatSessionStore::new(session_kv),
        backend,
        audio.clone(),
        Arc::new(ContentCatalog::site()),
        lang,
    )
    .await;
    widget.settings_mut().set_voice(chosen_voice);

    widget.open().await;
    render_from(&widget, 0);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" || input == "/exit" {
            break;
        }

        let shown = widget.transcript().len();
        if let SubmitOutcome::Rejected(reason) = widget.submit(input).await {
            tracing::debug!(?reason, "Input ignored");
        }
        render_from(&widget, shown);
    }

    widget.close();
    if let Some(audio) = audio {
        audio.close();
    }
    Ok(())
}

fn prompt() -> anyhow::Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn render_from(widget: &ChatWidget, from: usize) {
    for message in &widget.transcript()[from..] {
        match message.sender {
            Sender::User => println!("you: {}", message.text),
            Sender::Assistant => println!("شعاع: {}", render_reply(message)),
        }
    }
}

/// Flatten a reply into terminal text, links shown as `label (url)`.
fn render_reply(message: &Message) -> String {
    parse_markup(&message.text)
        .iter()
        .map(|node| match node {
            MessageNode::Text(text) => text.clone(),
            MessageNode::Link { label, url } => format!("{label} ({url})"),
        })
        .collect()
}
