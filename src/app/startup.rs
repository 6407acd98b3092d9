use crate::app::cli::{Args, Command};
use crate::app::watch;
use crate::core::config::Config;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::runtime::FeatureRuntime;
use clap::Parser;
use std::process::ExitCode;

const EXIT_CONFIG: u8 = 2;
const EXIT_RUNTIME: u8 = 1;

/// Parse arguments, load configuration, start logging and run the subcommand
pub async fn startup() -> ExitCode {
    let args = Args::parse();

    // Logging settings may come from the file, so load it before starting the
    // logger and report any failure afterwards
    let loaded = Config::load(args.config.as_deref()).await;
    let mut config = loaded.as_ref().cloned().unwrap_or_default();
    args.apply_to(&mut config);

    let use_color = config.logging.color && std::env::var_os("NO_COLOR").is_none();
    colored::control::set_override(use_color);
    if let Err(e) = init_logging(
        Some(&config.logging.level),
        config.logging.format,
        config.logging.file.as_deref(),
        use_color,
    ) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::from(EXIT_CONFIG);
    }

    if let Err(e) = loaded {
        log_error_with_context(&e, "Loading configuration");
        return ExitCode::from(EXIT_CONFIG);
    }
    if let Err(e) = config.validate() {
        log_error_with_context(&e, "Validating configuration");
        return ExitCode::from(EXIT_CONFIG);
    }

    log::debug!(
        "featurehub {} starting in {} mode",
        crate::core::version::version_banner(),
        config.mode()
    );

    match &args.command {
        Command::Config => match config.to_toml_string() {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log_error_with_context(&e, "Rendering configuration");
                ExitCode::from(EXIT_CONFIG)
            }
        },
        Command::Watch(watch_args) => {
            let shutdown = ShutdownCoordinator::new();
            shutdown.install_signal_handlers();

            let mut runtime = FeatureRuntime::new(config);
            if let Err(e) = runtime.init().await {
                log_error_with_context(&e, "Starting feature runtime");
                return ExitCode::from(EXIT_RUNTIME);
            }

            match watch::run(&mut runtime, &watch_args.channels, &shutdown).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    log_error_with_context(&e, "Connecting");
                    runtime.shutdown();
                    ExitCode::from(EXIT_RUNTIME)
                }
            }
        }
    }
}
