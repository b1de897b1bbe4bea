use std::{error::Error, process, sync::Arc, time::Duration};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use tokio::io::{AsyncBufReadExt, BufReader};

use spotbridge::{
    api::{Api, WebApi},
    config::Config,
    dispatcher::MEDIA_PLAYER,
    error::ErrorKind,
    integration::{Handle, Integration},
    secrets::SecretsFile,
    signal,
    sink::LogSink,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// TOML file with `client_id`, `client_secret` and `refresh_token`. The
    /// refresh token is rewritten in place when Spotify rotates it. Ensure
    /// that this file is kept secure and not shared publicly, as it grants
    /// access to your Spotify account.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    /// Media-player entity to drive
    #[arg(short, long, default_value_t = String::from("media_player.spotify"))]
    entity_id: String,

    /// Seconds between playback state polls
    #[arg(short, long, value_name = "SECONDS", default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// Base URL of the Spotify Web API
    #[arg(long, value_name = "URL", value_hint = ValueHint::Url, env = "SPOTBRIDGE_API_URL")]
    api_url: Option<String>,

    /// Base URL of the Spotify accounts service
    #[arg(long, value_name = "URL", value_hint = ValueHint::Url, env = "SPOTBRIDGE_ACCOUNTS_URL")]
    accounts_url: Option<String>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Builds the configuration from the command line and the secrets file.
fn load_config(args: &Args, secrets_file: &SecretsFile) -> Result<Config, Box<dyn Error>> {
    let secrets = secrets_file.load().inspect_err(|e| {
        if e.kind == ErrorKind::NotFound {
            info!(
                "copy secrets.toml.example to {} and fill in your Spotify app credentials",
                secrets_file.path().display()
            );
        }
    })?;

    let mut config = Config::new(secrets.into(), &args.entity_id)?
        .with_poll_interval(Duration::from_secs(args.poll_interval));
    if let Some(ref url) = args.api_url {
        config = config.with_api_url(url)?;
    }
    if let Some(ref url) = args.accounts_url {
        config = config.with_accounts_url(url)?;
    }

    Ok(config)
}

/// Configuration to (re)start an integration with.
///
/// The refresh token may have rotated since startup, so the credentials are
/// read from the secrets file again. The startup ones are kept if that fails.
fn current_config(config: &Config, secrets_file: &SecretsFile) -> Config {
    let mut config = config.clone();
    match secrets_file.load() {
        Ok(secrets) => config.credentials = secrets.into(),
        Err(e) => warn!(
            "failed reloading {}: {e}; keeping earlier credentials",
            secrets_file.path().display()
        ),
    }

    config
}

const HELP: &str = "commands: play, pause, next, previous, volume <0-100>, seek <seconds>, \
search <query>, album <id>, playlist <id|user>, play-item <kind> <id>, \
connect, disconnect, standby, wake, status";

/// Executes one line typed on stdin.
async fn execute(handle: &Handle, entity_id: &str, line: &str) -> spotbridge::error::Result<()> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command =
        |name: &str, param: &str| handle.send_command(MEDIA_PLAYER, entity_id, name, param);

    match verb.to_ascii_lowercase().as_str() {
        "" => Ok(()),
        "play" => command("PLAY", ""),
        "pause" => command("PAUSE", ""),
        "next" => command("NEXT", ""),
        "previous" | "prev" => command("PREVIOUS", ""),
        "volume" => command("VOLUME_SET", rest),
        "seek" => command("SEEK", rest),
        "search" => command("SEARCH", rest),
        "album" => command("GET_ALBUM", rest),
        "playlist" => command("GET_PLAYLIST", rest),
        "play-item" => command(
            "PLAY_ITEM",
            &rest.split_whitespace().collect::<Vec<_>>().join(":"),
        ),
        "connect" | "wake" => handle.leave_standby(),
        "disconnect" => handle.disconnect(),
        "standby" => handle.enter_standby(),
        "status" => {
            let status = handle.status().await?;
            info!(
                "{}; poller {}{}; token {}; refresh in {}",
                status.connection,
                status.poller,
                if status.progressing { " (playing)" } else { "" },
                if status.refreshing {
                    "refreshing"
                } else if status.authenticated {
                    "valid"
                } else {
                    "missing"
                },
                status
                    .refresh_in
                    .map_or_else(|| String::from("-"), |left| format!("{}s", left.as_secs())),
            );
            Ok(())
        }
        "help" | "?" => {
            info!("{HELP}");
            Ok(())
        }
        other => {
            warn!("unknown command {other:?}; {HELP}");
            Ok(())
        }
    }
}

/// Main application loop.
///
/// # Errors
///
/// Returns an error when the configuration cannot be loaded or the HTTP
/// client cannot be built.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let secrets_file = SecretsFile::new(&args.secrets_file);
    let config = load_config(&args, &secrets_file)?;
    let api: Arc<dyn Api> = Arc::new(WebApi::new(&config)?);

    let start = || {
        Integration::spawn(
            &current_config(&config, &secrets_file),
            Arc::clone(&api),
            Box::new(LogSink),
            Box::new(secrets_file.clone()),
        )
    };

    let (mut handle, mut task) = start();
    handle.connect()?;

    let mut signals = signal::Handler::new()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut standby = false;

    let restart_timer = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(restart_timer);
    let mut restarting = false;

    loop {
        tokio::select! {
            // Prioritize signals.
            biased;

            signal = signals.recv() => {
                if signal.is_shutdown() {
                    info!("received {signal}; shutting down gracefully");
                    if !restarting && handle.shutdown().is_ok() {
                        let _ = (&mut task).await;
                    }
                    break Ok(());
                }

                standby = !standby;
                let result = if standby {
                    info!("received {signal}; entering standby");
                    handle.enter_standby()
                } else {
                    info!("received {signal}; leaving standby");
                    handle.leave_standby()
                };
                if let Err(e) = result {
                    error!("{e}");
                }
            }

            result = &mut task, if !restarting => {
                // The integration only returns on shutdown, which ends this
                // loop first. Anything else is a crash.
                match result {
                    Ok(()) => error!("integration stopped unexpectedly"),
                    Err(e) => error!("integration failed: {e}"),
                }

                // Sleep with jitter to prevent thundering herds.
                let duration = Duration::from_millis(fastrand::u64(5_000..6_000));
                info!("restarting in {:.1}s", duration.as_secs_f32());
                restart_timer.as_mut().reset(tokio::time::Instant::now() + duration);
                restarting = true;
            }

            () = &mut restart_timer, if restarting => {
                (handle, task) = start();
                restarting = false;
                if !standby {
                    handle.connect()?;
                }
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = execute(&handle, &config.entity_id, &line).await {
                        error!("{e}");
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    error!("failed reading stdin: {e}");
                    stdin_open = false;
                }
            },
        }
    }
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and starts the main application loop.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use spotbridge::{secrets::CredentialStore, token::Credentials};

    use super::*;

    #[test]
    fn restarts_use_the_rotated_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(
            &path,
            "client_id = \"id\"\nclient_secret = \"secret\"\nrefresh_token = \"old\"\n",
        )
        .unwrap();

        let mut secrets_file = SecretsFile::new(&path);
        let credentials = secrets_file.load().unwrap().into();
        let config = Config::new(credentials, "media_player.spotify").unwrap();
        secrets_file.store_refresh_token("rotated").unwrap();

        let restarted = current_config(&config, &secrets_file);
        assert_eq!(restarted.credentials.refresh_token, "rotated");
        assert_eq!(restarted.credentials.client_id, "id");
        assert_eq!(restarted.entity_id, config.entity_id);

        fs::remove_file(&path).unwrap();
        let restarted = current_config(&config, &secrets_file);
        assert_eq!(
            restarted.credentials,
            Credentials {
                client_id: "id".to_owned(),
                client_secret: "secret".to_owned(),
                refresh_token: "old".to_owned(),
            }
        );
    }
}
