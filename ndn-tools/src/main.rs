// NDN client tools: fetch one Data packet, serve a prefix, dump TLV.

mod config;
mod dump;
mod telemetry;
mod transport;

use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use ndn_core::{Callbacks, Data, Face, Interest, Name, RunMode};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const USAGE: &str = "usage: ndn-tools [--version] <command>

commands:
  dump [FILE|-]                 print the TLV structure of FILE (default stdin)
  peek NAME [--lifetime MS]     fetch one Data packet and write its content to stdout
  serve PREFIX TEXT             answer every Interest under PREFIX with TEXT";

const SIGNAL_POLL: Duration = Duration::from_millis(200);
const SERVE_FRESHNESS: Duration = Duration::from_secs(1);

enum Command {
    Dump(Option<String>),
    Peek { name: Name, lifetime: Option<Duration> },
    Serve { prefix: Name, text: String },
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Command>> {
    let mut args = args.iter().map(String::as_str);
    let command = match args.next() {
        None => bail!("{USAGE}"),
        Some("--version" | "-V") => {
            println!("ndn-tools {}", VERSION);
            return Ok(None);
        }
        Some("dump") => Command::Dump(args.next().filter(|f| *f != "-").map(str::to_owned)),
        Some("peek") => {
            let name = args.next().ok_or_else(|| anyhow!("peek: missing NAME"))?;
            let name = name.parse::<Name>().with_context(|| format!("peek: bad name {name:?}"))?;
            let lifetime = match args.next() {
                None => None,
                Some("--lifetime") => {
                    let ms = args.next().ok_or_else(|| anyhow!("--lifetime: missing MS"))?;
                    Some(Duration::from_millis(ms.parse::<u64>().context("--lifetime")?))
                }
                Some(other) => bail!("peek: unexpected argument {other:?}"),
            };
            Command::Peek { name, lifetime }
        }
        Some("serve") => {
            let prefix = args.next().ok_or_else(|| anyhow!("serve: missing PREFIX"))?;
            let prefix = prefix
                .parse::<Name>()
                .with_context(|| format!("serve: bad prefix {prefix:?}"))?;
            let text = args.next().ok_or_else(|| anyhow!("serve: missing TEXT"))?;
            Command::Serve {
                prefix,
                text: text.to_owned(),
            }
        }
        Some(other) => bail!("unknown command {other:?}\n\n{USAGE}"),
    };
    if let Some(extra) = args.next() {
        bail!("unexpected argument {extra:?}");
    }
    Ok(Some(command))
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = parse_args(&args)? else {
        return Ok(());
    };

    let (cfg, diagnostics) = config::load();
    telemetry::init(cfg.log_format)?;
    for diagnostic in &diagnostics {
        tracing::warn!("{diagnostic}");
    }

    let command = match command {
        Command::Dump(path) => return run_dump(path.as_deref()),
        other => other,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let transport = rt
        .block_on(transport::connect(&cfg.transport))
        .with_context(|| format!("connecting to {}", cfg.transport))?;
    tracing::info!(transport = %cfg.transport, "connected to forwarder");

    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = stop.clone();
    rt.spawn(async move {
        if let Err(e) = shutdown_signal().await {
            tracing::warn!(error = %e, "signal handler unavailable");
            return;
        }
        stop_signal.store(true, Ordering::SeqCst);
    });

    let mut face = Face::builder(transport).config(cfg.face.clone()).build();
    face.schedule_periodic_event(SIGNAL_POLL, SIGNAL_POLL, move |face| {
        if stop.load(Ordering::SeqCst) {
            tracing::info!("shutting down");
            face.shutdown();
        }
    });

    match command {
        Command::Peek { name, lifetime } => run_peek(&mut face, name, lifetime),
        Command::Serve { prefix, text } => run_serve(&mut face, prefix, text),
        Command::Dump(_) => Ok(()),
    }
}

fn run_dump(path: Option<&str>) -> anyhow::Result<()> {
    let mut bytes = Vec::new();
    match path {
        Some(path) => {
            bytes = std::fs::read(path).with_context(|| format!("reading {path}"))?;
        }
        None => {
            std::io::stdin().read_to_end(&mut bytes)?;
        }
    }
    print!("{}", dump::dump(&bytes)?);
    Ok(())
}

fn run_peek(face: &mut Face, name: Name, lifetime: Option<Duration>) -> anyhow::Result<()> {
    let mut interest = Interest::new(name);
    if let Some(lifetime) = lifetime {
        interest = interest.with_lifetime(lifetime);
    }

    let outcome: Rc<RefCell<Option<Result<Vec<u8>, String>>>> = Rc::new(RefCell::new(None));
    let on_data = outcome.clone();
    let on_nack = outcome.clone();
    let on_timeout = outcome.clone();
    face.express_interest(
        interest,
        Callbacks::new(move |face: &mut Face, _: &Interest, data: &Data| {
            tracing::debug!(name = %data.name, "data received");
            *on_data.borrow_mut() = Some(Ok(data.content.clone()));
            face.shutdown();
        })
        .on_nack(move |face: &mut Face, interest: &Interest, nack| {
            *on_nack.borrow_mut() = Some(Err(format!("{}: nack ({})", interest.name, nack.reason)));
            face.shutdown();
        })
        .on_timeout(move |face: &mut Face, interest: &Interest| {
            *on_timeout.borrow_mut() = Some(Err(format!("{}: timed out", interest.name)));
            face.shutdown();
        }),
    )?;
    face.process_events(RunMode::UntilShutdown)?;

    let outcome = outcome.borrow_mut().take();
    match outcome {
        Some(Ok(content)) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
            Ok(())
        }
        Some(Err(reason)) => bail!(reason),
        None => bail!("interrupted"),
    }
}

fn run_serve(face: &mut Face, prefix: Name, text: String) -> anyhow::Result<()> {
    let failed: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let on_failure = failed.clone();
    face.register_prefix(
        prefix,
        move |face, _, interest| {
            let data = Data::new(interest.name.clone())
                .with_content(text.as_bytes())
                .with_freshness(SERVE_FRESHNESS);
            if let Err(e) = face.put(data) {
                tracing::warn!(name = %interest.name, error = %e, "failed to answer");
            }
        },
        move |face, prefix, reason| {
            *on_failure.borrow_mut() = Some(format!("registering {prefix} failed: {reason}"));
            face.shutdown();
        },
    )?;
    face.process_events(RunMode::UntilShutdown)?;

    let failed = failed.borrow_mut().take();
    match failed {
        Some(reason) => bail!(reason),
        None => Ok(()),
    }
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
