//! `enclave check`: show the resolved configuration and whether the engine
//! can start with it.

use std::path::Path;

use anyhow::{Result, bail};
use enclave_config::{ResolvedConfig, ShowFormat};

use crate::config_bridge;
use crate::theme::Theme;

/// Print the annotated configuration and validate the engine setup.
pub(crate) fn run(root: &Path, resolved: &ResolvedConfig, format: &str) -> Result<()> {
    let show_format = match format {
        "toml" => ShowFormat::Toml,
        "json" => ShowFormat::Json,
        other => bail!("unknown format {other:?} (expected toml or json)"),
    };

    println!("{}", Theme::header("Configuration"));
    if resolved.loaded_files.is_empty() {
        println!("{}", Theme::dimmed("(no config files found; using defaults)"));
    }
    for file in &resolved.loaded_files {
        println!("{}", Theme::dimmed(&format!("loaded {file}")));
    }
    println!();
    println!(
        "{}",
        resolved
            .show(show_format)
            .map_err(|_| anyhow::anyhow!("failed to render configuration"))?
    );

    let engine = config_bridge::to_engine(&resolved.config, root)?;
    println!("{}", Theme::success("engine ready"));
    println!("{}", Theme::kv("root", &engine.root().display().to_string()));
    let bridge = &resolved.config.bridge;
    match &bridge.host {
        Some(host) => {
            println!("{}", Theme::kv("bridge host", host));
            println!(
                "{}",
                Theme::kv(
                    "tunnel",
                    &format!("127.0.0.1:{} -> {host}:{}", bridge.local_port, bridge.remote_port)
                )
            );
        },
        None => println!("{}", Theme::info("no bridge host configured")),
    }
    Ok(())
}
