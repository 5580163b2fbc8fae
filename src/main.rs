use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use tokio::runtime::Runtime;

mod color;
mod config;
mod controller;
mod error;
mod lights;
mod tv;

use color::RED;
use config::Config;
use controller::Controller;
use lights::{Backend, LightSink, Lights};
use tv::client::AmbilightTv;
use tv::AmbilightSource;

const USAGE: &str = "\
Usage: ambilight-lights [OPTIONS]

Mirrors the ambilight colors of a Philips TV onto lights.

Options:
  --config <PATH>       Configuration file [default: userconfig.json]
  --loglevel <LEVEL>    error, warn, info, debug or trace [default: warn]
  --verify <tv|lights>  Check one side of the setup and exit
  --help                Print this message";

#[derive(Debug, PartialEq, Eq)]
enum Verify {
    Tv,
    Lights,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    config: PathBuf,
    level: LevelFilter,
    verify: Option<Verify>,
    help: bool,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
        let mut parsed = Args {
            config: PathBuf::from("userconfig.json"),
            level: LevelFilter::Warn,
            verify: None,
            help: false,
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |name: &str| args.next().ok_or_else(|| anyhow!("{} needs a value", name));

            match arg.as_str() {
                "--config" | "-c" => parsed.config = PathBuf::from(value("--config")?),
                "--loglevel" => parsed.level = parse_level(&value("--loglevel")?)?,
                "--verify" | "-v" => {
                    parsed.verify = Some(match value("--verify")?.as_str() {
                        "tv" => Verify::Tv,
                        "lights" | "hue" => Verify::Lights,
                        other => bail!("Unknown --verify target {}", other),
                    })
                }
                "--help" | "-h" => parsed.help = true,
                other => bail!("Unknown argument {}", other),
            }
        }

        Ok(parsed)
    }
}

fn parse_level(level: &str) -> Result<LevelFilter> {
    Ok(match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" | "critical" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        other => bail!("Unknown log level {}", other),
    })
}

fn main() {
    let args = match Args::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            process::exit(2);
        }
    };

    if args.help {
        println!("{}", USAGE);
        return;
    }

    if let Err(e) = SimpleLogger::new()
        .with_level(args.level)
        // The HTTP stack is very chatty below warn
        .with_module_level("hyper", LevelFilter::Warn)
        .with_module_level("hyper_util", LevelFilter::Warn)
        .with_module_level("reqwest", LevelFilter::Warn)
        .with_module_level("rustls", LevelFilter::Warn)
        .with_module_level("h2", LevelFilter::Warn)
        .init()
    {
        eprintln!("Failed to set up logging: {}", e);
    }

    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            1
        }
    };

    process::exit(code);
}

fn run(args: Args) -> Result<i32> {
    let config = Config::load(&args.config)?;

    let rt = Runtime::new().context("Failed to start the tokio runtime")?;

    rt.block_on(async {
        match args.verify {
            Some(Verify::Tv) => verify_tv(&config).await.map(|()| 0),
            Some(Verify::Lights) => verify_lights(&config).await.map(|()| 0),
            None => stream(&config).await,
        }
    })
}

async fn stream(config: &Config) -> Result<i32> {
    let tv = AmbilightTv::new(&config.ambilight_tv)?;
    log::info!("Reading ambilight from {}", tv.url());

    let lights = Lights::start(Backend::from_config(&config.lights));

    let reason = Controller::new(tv, lights, config.lights_setup.clone())
        .run(shutdown_signal())
        .await;

    log::warn!("Exiting with {:?} ({})", reason, reason.code());

    Ok(reason.code())
}

/// Fetches one sample and prints the zone layout.
async fn verify_tv(config: &Config) -> Result<()> {
    let mut tv = AmbilightTv::new(&config.ambilight_tv)?;

    tv.wait_for_startup().await?;
    let model = tv.poll().await.context("Failed to read ambilight")?;

    println!("{} zones, {} per side", model.len(), model.sides());
    for line in model.render() {
        println!("{}", line);
    }

    // Zone indices as used by the fixture positions
    for (index, color) in model.colors().iter().enumerate() {
        println!("{:>3} {} {}", index, color.swatch(), color);
    }

    tv.close();

    Ok(())
}

/// Turns light 0 red.
async fn verify_lights(config: &Config) -> Result<()> {
    let mut lights = Lights::start(Backend::from_config(&config.lights));

    let result = lights.set_color(0, RED).await;
    lights.close().await;

    Ok(result?)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            log::error!("Failed to listen for ctrl-c: {}", e);
                            std::future::pending::<()>().await;
                        }
                    }
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => log::error!("Failed to listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
