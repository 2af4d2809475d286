//! skyq - command-line remote control for Sky Q set-top boxes.

/// Application configuration (TOML).
mod config;

use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_cache_dir, resolve_config_path};
use skyq_api::constants::REMOTE_LEGACY_PORT;
use skyq_api::{Channel, RemoteCommand, Schedule, SkyQ};

/// Poll interval while waiting on the status listener.
const STATUS_POLL: Duration = Duration::from_millis(100);

/// CLI argument parser.
///
/// `help` is a remote keyword, so the `help` subcommand is disabled; use
/// `--help` instead.
#[derive(Parser)]
#[command(about, version, disable_help_subcommand = true)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Box host name or IP address (overrides config).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Remote-control port (overrides config).
    #[arg(long, global = true, conflicts_with = "legacy")]
    remote_port: Option<u16>,

    /// Use the legacy remote-control port (5900).
    #[arg(long, global = true)]
    legacy: bool,

    /// REST and status port (overrides config).
    #[arg(long, global = true)]
    rest_port: Option<u16>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run, or a remote-control keyword such as `play`.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Write a config file from the current settings.
    Init(InitArgs),
    /// List remote-control keywords.
    Keys,
    /// Report whether the box is online or in standby.
    Status(StatusArgs),
    /// Show one channel.
    Channel(ChannelArgs),
    /// List all channels.
    Channels(ChannelsArgs),
    /// Follow status changes and keep the EPG feed refreshed.
    Watch(WatchArgs),
    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
    /// Press a remote-control button, e.g. `skyq play`.
    #[command(external_subcommand)]
    Remote(Vec<String>),
}

/// Arguments for the `init` subcommand.
#[derive(clap::Args)]
struct InitArgs {
    /// XMLTV feed to record in the config.
    #[arg(long)]
    xmltv_url: Option<String>,

    /// Refresh schedule to record, e.g. `@daily` or `6h`.
    #[arg(long)]
    refresh: Option<String>,

    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(clap::Args)]
struct StatusArgs {
    /// Seconds to wait for the box to report its state.
    #[arg(long, default_value_t = 3)]
    wait: u64,
}

/// Arguments for the `channel` subcommand.
#[derive(clap::Args)]
struct ChannelArgs {
    /// Service id, e.g. 2002.
    sid: String,

    /// XMLTV feed to merge (overrides config).
    #[arg(long)]
    xmltv_url: Option<String>,

    /// Print the channel as JSON.
    #[arg(long)]
    json: bool,
}

/// Arguments for the `channels` subcommand.
#[derive(clap::Args)]
struct ChannelsArgs {
    /// XMLTV feed to merge (overrides config).
    #[arg(long)]
    xmltv_url: Option<String>,
}

/// Arguments for the `watch` subcommand.
#[derive(clap::Args)]
struct WatchArgs {
    /// XMLTV feed to keep refreshed (overrides config).
    #[arg(long)]
    xmltv_url: Option<String>,

    /// Refresh schedule, e.g. `@daily` or `6h` (overrides config).
    #[arg(long)]
    refresh: Option<String>,

    /// Stop after this many seconds instead of running until interrupted.
    #[arg(long)]
    duration: Option<u64>,
}

/// Settings resolved from config file and flags.
struct Settings {
    config: AppConfig,
    path: PathBuf,
    dir: Option<PathBuf>,
}

impl Settings {
    fn load(cli: &Cli) -> Result<Self> {
        let path = resolve_config_path(cli.dir.as_ref())?;
        let mut config = AppConfig::load(&path)?;
        if let Some(host) = &cli.host {
            config.skybox.host.clone_from(host);
        }
        if let Some(port) = cli.remote_port {
            config.skybox.remote_port = port;
        }
        if cli.legacy {
            config.skybox.remote_port = REMOTE_LEGACY_PORT;
        }
        if let Some(port) = cli.rest_port {
            config.skybox.rest_port = port;
        }
        tracing::debug!(config = %path.display(), host = %config.skybox.host, "Settings loaded");
        Ok(Self {
            config,
            path,
            dir: cli.dir.clone(),
        })
    }

    fn xmltv_url(&self, flag: Option<&String>) -> Option<String> {
        flag.cloned().or_else(|| self.config.epg.xmltv_url.clone())
    }

    fn client(&self) -> Result<SkyQ> {
        let cache_dir = resolve_cache_dir(self.dir.as_ref(), self.config.epg.cache_dir.as_deref());
        let mut builder = SkyQ::builder()
            .host(self.config.skybox.host.clone())
            .remote_port(self.config.skybox.remote_port)
            .rest_port(self.config.skybox.rest_port);
        if let Some(dir) = cache_dir {
            builder = builder.cache_dir(dir);
        }
        builder.build().context("failed to build Sky Q client")
    }
}

/// Presses the button named by `args`.
///
/// # Errors
///
/// Returns an error if the keyword is unknown or the box cannot be reached.
#[instrument(skip_all)]
fn run_remote(args: &[String], settings: &Settings) -> Result<()> {
    let (keyword, rest) = args
        .split_first()
        .context("no remote-control keyword given")?;
    if !rest.is_empty() {
        bail!("unexpected arguments after '{keyword}': {}", rest.join(" "));
    }
    let command = RemoteCommand::from_str(keyword)
        .with_context(|| format!("'{keyword}' is not a command; see `skyq keys`"))?;

    let skyq = settings.client()?;
    skyq.press(command)
        .with_context(|| format!("failed to send '{command}' to {}", skyq.host()))?;
    tracing::debug!(%command, host = %skyq.host(), "Button pressed");
    Ok(())
}

/// Runs the `init` subcommand.
///
/// # Errors
///
/// Returns an error if the file exists without `--force`, the schedule is
/// invalid, or the file cannot be written.
#[instrument(skip_all)]
fn run_init(args: &InitArgs, settings: Settings) -> Result<()> {
    let Settings { mut config, path, .. } = settings;
    if path.exists() && !args.force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    if let Some(url) = &args.xmltv_url {
        config.epg.xmltv_url = Some(url.clone());
    }
    if let Some(refresh) = &args.refresh {
        Schedule::from_str(refresh)
            .with_context(|| format!("invalid refresh schedule '{refresh}'"))?;
        config.epg.refresh = Some(refresh.clone());
    }
    config.save(&path).context("failed to save config")?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

/// Lists every accepted keyword and its code.
fn run_keys() {
    tracing::info!("Keyword\t\tCode");
    for (keyword, command) in RemoteCommand::keywords() {
        tracing::info!("{keyword:<16}{}", command.code());
    }
}

/// Runs the `status` subcommand.
///
/// # Errors
///
/// Returns an error if the client cannot be built.
#[instrument(skip_all)]
fn run_status(args: &StatusArgs, settings: &Settings) -> Result<()> {
    let skyq = settings.client()?;
    let mut updates = skyq.subscribe_status();
    skyq.start_status_listener()
        .context("failed to start status listener")?;

    let deadline = Instant::now()
        .checked_add(Duration::from_secs(args.wait))
        .context("--wait is too large")?;
    while Instant::now() < deadline {
        if updates.has_changed().unwrap_or(false) {
            updates.mark_unchanged();
            break;
        }
        thread::sleep(STATUS_POLL);
    }
    skyq.stop_status_listener();

    let state = if skyq.is_standby() { "standby" } else { "online" };
    tracing::info!("{}: {state}", skyq.host());
    Ok(())
}

/// Loads the channel list and merges the configured feed, if any.
fn load_channels(skyq: &SkyQ, xmltv_url: Option<&str>) -> Result<()> {
    let count = skyq
        .load_channel_data()
        .context("failed to load channels from the box")?;
    tracing::debug!(channels = count, "Channels loaded");

    if let Some(url) = xmltv_url {
        let listing = skyq
            .fetch_listing(url)
            .with_context(|| format!("failed to download {url}"))?;
        let matched = skyq
            .apply_listing(&listing)
            .with_context(|| format!("failed to apply {url}"))?;
        tracing::debug!(matched, %url, "Feed merged");
    }
    Ok(())
}

/// Runs the `channel` subcommand.
///
/// # Errors
///
/// Returns an error if loading fails or the sid is unknown.
#[instrument(skip_all)]
fn run_channel(args: &ChannelArgs, settings: &Settings) -> Result<()> {
    let skyq = settings.client()?;
    let url = settings.xmltv_url(args.xmltv_url.as_ref());
    load_channels(&skyq, url.as_deref())?;

    let channel = skyq
        .get_channel(&args.sid)
        .with_context(|| format!("no channel with sid {}", args.sid))?;

    if args.json {
        tracing::info!("{}", channel.to_json()?);
        return Ok(());
    }

    print_channel(&channel);
    let programmes = skyq.programmes(&args.sid)?;
    for programme in &programmes {
        tracing::info!("  {programme}");
    }
    Ok(())
}

fn print_channel(channel: &Channel) {
    tracing::info!("{channel}");
    tracing::info!(
        "  quality: {}  type: {}  dvb: {}",
        channel
            .quality()
            .map_or_else(|| String::from("-"), ToString::to_string),
        channel.service_type().unwrap_or("-"),
        channel.dvb_triplet().unwrap_or("-"),
    );
    if let Some(description) = channel.description() {
        tracing::info!("  {description}");
    }
    if let Some(icon) = channel.xmltv_icon_url() {
        tracing::info!("  icon: {icon}");
    }
    for profile in channel.streaming_profiles() {
        tracing::info!("  stream {}: {:?}", profile.name, profile.uri);
    }
}

/// Runs the `channels` subcommand.
///
/// # Errors
///
/// Returns an error if loading fails.
#[instrument(skip_all)]
fn run_channels(args: &ChannelsArgs, settings: &Settings) -> Result<()> {
    let skyq = settings.client()?;
    let url = settings.xmltv_url(args.xmltv_url.as_ref());
    load_channels(&skyq, url.as_deref())?;

    let channels = skyq.channels()?;
    tracing::info!("SID\tNo.\tQuality\tName");
    for channel in &channels {
        tracing::info!(
            "{}\t{}\t{}\t{}",
            channel.sid().unwrap_or("-"),
            channel.number().unwrap_or("-"),
            channel
                .quality()
                .map_or_else(|| String::from("-"), ToString::to_string),
            channel.name().unwrap_or("-"),
        );
    }
    tracing::info!("Total: {} channels", channels.len());
    Ok(())
}

/// Runs the `watch` subcommand.
///
/// # Errors
///
/// Returns an error if the initial load fails or the schedule is invalid.
#[instrument(skip_all)]
fn run_watch(args: &WatchArgs, settings: &Settings) -> Result<()> {
    let skyq = settings.client()?;
    let url = settings.xmltv_url(args.xmltv_url.as_ref());
    load_channels(&skyq, url.as_deref())?;

    if let Some(url) = &url {
        let refresh = args
            .refresh
            .as_deref()
            .or(settings.config.epg.refresh.as_deref())
            .unwrap_or("@daily");
        let schedule = Schedule::from_str(refresh)
            .with_context(|| format!("invalid refresh schedule '{refresh}'"))?;
        skyq.schedule_listing_refresh(url, schedule)?;
        tracing::info!(%url, %schedule, "Feed refresh scheduled");
    }

    let mut updates = skyq.subscribe_status();
    skyq.start_status_listener()?;
    let deadline = args
        .duration
        .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));

    tracing::info!("Watching {}", skyq.host());
    while deadline.is_none_or(|at| Instant::now() < at) {
        match updates.has_changed() {
            Ok(true) => {
                let standby = *updates.borrow_and_update();
                let state = if standby { "standby" } else { "online" };
                tracing::info!("{}: {state}", skyq.host());
            }
            Ok(false) => {}
            Err(_) => bail!("status listener stopped"),
        }
        thread::sleep(STATUS_POLL);
    }

    skyq.shutdown();
    Ok(())
}

/// Installs the tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `-v` raises the level from `info`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "skyq", &mut std::io::stdout());
        return Ok(());
    }
    if matches!(cli.command, Commands::Keys) {
        run_keys();
        return Ok(());
    }

    let settings = Settings::load(&cli)?;
    match &cli.command {
        Commands::Init(args) => run_init(args, settings),
        Commands::Remote(args) => run_remote(args, &settings),
        Commands::Status(args) => run_status(args, &settings),
        Commands::Channel(args) => run_channel(args, &settings),
        Commands::Channels(args) => run_channels(args, &settings),
        Commands::Watch(args) => run_watch(args, &settings),
        Commands::Keys | Commands::Completions { .. } => Ok(()),
    }
}
