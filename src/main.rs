use std::{
    io::{self, stderr, IsTerminal},
    path::PathBuf,
};

use clap::Parser;
use eyre::Context as _;
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt as _, EnvFilter};
use wazzi_pathz::{tree::File, Harness, SynthConfig};

#[derive(Parser, Debug)]
struct Cmd {
    /// Directory tree description (`.json`, `.yml` or `.yaml`).
    #[arg(long)]
    tree: Option<PathBuf>,

    /// Synthesis config (`.json`, `.yml` or `.yaml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the witness as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[arg(long, default_value_t = false)]
    silent: bool,
}

fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;

    let cmd = Cmd::parse();

    if !cmd.silent {
        let mut subscriber = tracing_subscriber::fmt::layer()
            .with_thread_names(true)
            .with_writer(io::stderr);

        if !stderr().is_terminal() {
            subscriber.set_ansi(false);
        }

        tracing::subscriber::set_global_default(
            tracing_subscriber::Registry::default()
                .with(
                    EnvFilter::builder()
                        .with_env_var("PATHZ_LOG_LEVEL")
                        .with_default_directive(LevelFilter::INFO.into())
                        .from_env_lossy(),
                )
                .with(ErrorLayer::default())
                .with(subscriber),
        )
        .wrap_err("failed to configure tracing")?;
    }

    let tree = match &cmd.tree {
        | Some(path) => File::load(path)
            .wrap_err_with(|| format!("failed to load tree {}", path.display()))?,
        | None => File::example(),
    };
    let config = match &cmd.config {
        | Some(path) => SynthConfig::load(path)
            .wrap_err_with(|| format!("failed to load config {}", path.display()))?,
        | None => SynthConfig::default(),
    };

    tracing::info!(
        fds = tree.opened_count(),
        max_segments = config.max_segments,
        "Encoding."
    );

    let cfg = z3::Config::new();
    let ctx = z3::Context::new(&cfg);
    let harness = Harness::new(&ctx, &tree, &config).wrap_err("failed to encode model")?;
    let witness = harness.run().wrap_err("path synthesis failed")?;

    if cmd.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&witness).wrap_err("failed to serialize witness")?
        );
    } else {
        println!("{witness}");
    }

    Ok(())
}
