//! `structmail` - structured email (SML) from the command line
//!
//! Composes, inspects and renders messages carrying schema.org data and
//! activates the action links found in rendered cards.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod host;

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use structmail_core::render::{buttons_for, card_page, render_each};
use structmail_core::{
    Account, AttachmentResolver, BuildOutcome, CardRenderer, Collaborators,
    ComposedMessageBuilder, Dispatcher, HtmlExtractor, MessageAssembler, MessageInspector,
    ReqwestFetcher, SmlComposer, SmlSettings, StructuredDataExtractor, StructuredPayload, Syntax,
};
use structmail_mime::Message;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, ComposeArgs, parse_identity};
use host::{
    ConsoleClipboard, ConsoleHost, FileOutbox, MessageAttachments, StaticAccountStore,
    UnsupportedBarcodeEncoder,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "structmail=info,structmail_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli).await?;
    let account = match cli.account.as_deref() {
        Some(text) => Some(account_from(text)?.with_variant(settings.variant)),
        None => None,
    };

    match cli.command {
        Commands::Compose(args) => compose(&settings, account, args).await?,
        Commands::Extract { input, syntax } => {
            let html = read_input(&input)?;
            let extractor = HtmlExtractor::new();
            let items = match syntax {
                Some(syntax) => extractor.extract(&html, Syntax::from(syntax)),
                None => extractor.extract_with_fallback(&html),
            };
            let objects: Vec<_> = items.into_iter().map(|item| item.object).collect();
            println!("{}", serde_json::to_string_pretty(&objects)?);
        }
        Commands::Render {
            payload,
            no_buttons,
        } => {
            let payload = StructuredPayload::from_json_str(&read_input(&payload)?)?;
            let report = render_each(&CardRenderer::new(), &payload, |object| {
                if no_buttons {
                    Vec::new()
                } else {
                    buttons_for(object)
                }
            });
            for failure in &report.failures {
                eprintln!("object {} not rendered: {}", failure.index, failure.error);
            }
            println!("{}", card_page(&report.fragments));
        }
        Commands::Inspect {
            message,
            show_source,
        } => {
            let message = Message::parse(&read_input(&message)?)?;
            let inspection = MessageInspector::new(
                Arc::new(HtmlExtractor::new()),
                Arc::new(CardRenderer::new()),
                settings.skip_types.clone(),
            )
            .with_show_source(show_source)
            .inspect(&message);
            if inspection.is_empty() {
                eprintln!("No structured data found");
            } else {
                println!("{}", inspection.to_html());
            }
        }
        Commands::Dispatch { uri, message } => {
            let attachments = match message {
                Some(path) => Some(MessageAttachments(Message::parse(&read_input(&path)?)?)),
                None => None,
            };
            let mut dispatcher = dispatcher(cli.outbox.as_deref(), settings, account, attachments)?;
            if !dispatcher.dispatch(&uri).await {
                match dispatcher.resolve_cid(&uri) {
                    Some(attachment) => {
                        std::io::stdout().write_all(&attachment.data)?;
                    }
                    None => bail!("no inline attachment for {uri}"),
                }
            }
        }
    }

    Ok(())
}

async fn load_settings(cli: &Cli) -> Result<SmlSettings> {
    let path = cli.settings.clone().unwrap_or_else(SmlSettings::default_path);
    let mut settings = SmlSettings::load(&path)
        .await
        .with_context(|| format!("loading settings from {}", path.display()))?;
    if let Some(variant) = cli.variant {
        settings.variant = variant.into();
    }
    if cli.hide_timezone {
        settings.hide_timezone = true;
    }
    Ok(settings)
}

fn account_from(text: &str) -> Result<Account> {
    let Some(identity) = parse_identity(text) else {
        bail!("invalid account {text:?}, expected \"Name <address>\"");
    };
    Ok(Account::new(
        identity.email.clone(),
        identity.name.clone(),
        identity,
    ))
}

async fn compose(settings: &SmlSettings, account: Option<Account>, args: ComposeArgs) -> Result<()> {
    let Some(account) = account else {
        bail!("compose needs --account \"Name <address>\"");
    };
    let identity = account
        .first_identity()
        .cloned()
        .context("account has no identity")?;

    let payload = StructuredPayload::from_json_str(&read_input(&args.payload)?)?;
    let html = args.html.as_deref().map(read_input).transpose()?;

    let composer = SmlComposer::new(Arc::new(CardRenderer::new()), settings.composer_settings());
    let draft = ComposedMessageBuilder::new()
        .to(args.to)
        .subject(args.subject)
        .identity(identity)
        .draft(args.draft);
    let builder = composer.compose(
        &payload,
        settings.variant,
        html.as_deref(),
        args.plain.as_deref(),
        Some(draft),
    )?;

    let mut assembler = MessageAssembler::new();
    let message = match assembler.build_async(builder).outcome().await {
        BuildOutcome::Success { message, is_draft } => {
            info!("Built {} message (draft: {})", settings.variant, is_draft);
            message
        }
        BuildOutcome::Failed(e) => return Err(e.into()),
        BuildOutcome::Cancelled => bail!("build cancelled"),
        BuildOutcome::PendingAuthorization { request_code, .. } => {
            bail!("build needs authorization (request {request_code})")
        }
    };

    let bytes = message.to_bytes()?;
    match args.out {
        Some(path) => std::fs::write(&path, bytes)
            .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout().write_all(&bytes)?,
    }
    Ok(())
}

fn dispatcher(
    outbox: Option<&Path>,
    settings: SmlSettings,
    account: Option<Account>,
    attachments: Option<MessageAttachments>,
) -> Result<Dispatcher> {
    let outbox = outbox.map_or_else(|| settings.temp_dir.join("outbox"), Path::to_path_buf);
    let services = Collaborators {
        host: Arc::new(ConsoleHost::new(settings.temp_dir.clone())),
        clipboard: Arc::new(ConsoleClipboard),
        accounts: Arc::new(StaticAccountStore(account)),
        delivery: Arc::new(FileOutbox::new(outbox)),
        fetcher: Arc::new(ReqwestFetcher::new(&settings.user_agent)?),
        renderer: Arc::new(CardRenderer::new()),
        extractor: Arc::new(HtmlExtractor::new()),
        barcode: Arc::new(UnsupportedBarcodeEncoder),
        attachments: attachments.map(|a| Arc::new(a) as Arc<dyn AttachmentResolver>),
    };
    Ok(Dispatcher::new(settings, services))
}

/// Reads a file, or stdin for `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
