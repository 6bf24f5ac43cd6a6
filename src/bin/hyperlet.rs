//! hyperlet - pod runtime adapter CLI
//!
//! Offline tooling around the adapter: renders the engine document for a
//! pod manifest and inspects engine names. Nothing here talks to an engine.
//!
//! ## Usage
//!
//! ```sh
//! hyperlet render <manifest.yaml> [--config <path>]
//! hyperlet hash <manifest.yaml>
//! hyperlet decode <engine-name>
//! ```

use hyperlet::pod::{ManifestVolumes, RunOptionsGenerator, SpecRunOptions, VolumeResolver};
use hyperlet::{ContainerIdentity, Error, PodIdentity, PodSpec, RuntimeConfig, build_pod_document};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// =============================================================================
// CLI Parsing
// =============================================================================

#[derive(Debug)]
enum Command {
    Render {
        manifest: PathBuf,
        config: Option<PathBuf>,
    },
    Hash {
        manifest: PathBuf,
    },
    Decode {
        name: String,
    },
    Version,
    Help,
}

fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "render" => {
            if args.len() < 3 {
                return Err("render requires <manifest>".to_string());
            }
            let manifest = PathBuf::from(&args[2]);
            let mut config = None;
            let mut i = 3;
            while i < args.len() {
                match args[i].as_str() {
                    "--config" | "-c" => {
                        if i + 1 < args.len() {
                            config = Some(PathBuf::from(&args[i + 1]));
                            i += 2;
                        } else {
                            return Err("--config requires a path".to_string());
                        }
                    }
                    other => return Err(format!("unknown option: {other}")),
                }
            }
            Ok(Command::Render { manifest, config })
        }
        "hash" => {
            if args.len() < 3 {
                return Err("hash requires <manifest>".to_string());
            }
            Ok(Command::Hash {
                manifest: PathBuf::from(&args[2]),
            })
        }
        "decode" => {
            if args.len() < 3 {
                return Err("decode requires <engine-name>".to_string());
            }
            Ok(Command::Decode {
                name: args[2].clone(),
            })
        }
        "version" | "--version" | "-v" => Ok(Command::Version),
        "help" | "--help" | "-h" => Ok(Command::Help),
        unknown => Err(format!("unknown command: {unknown}")),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn load_manifest(path: &Path) -> anyhow::Result<PodSpec> {
    let data = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    Ok(PodSpec::from_yaml(&data)?)
}

fn cmd_render(manifest: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => RuntimeConfig::load(&path)?,
        None => RuntimeConfig::default(),
    };
    let pod = load_manifest(&manifest)?;

    let mut volumes = ManifestVolumes::new();
    volumes.insert_pod(&pod, &config.spec_dir);
    let resolved = volumes
        .resolve_volumes(&pod.uid)
        .ok_or_else(|| Error::VolumeResolutionFailed {
            pod: pod.full_name(),
        })?;

    let generator = SpecRunOptions {
        dns: config.dns.clone(),
    };
    let mut run_options = HashMap::new();
    for container in &pod.containers {
        run_options.insert(container.name.clone(), generator.generate(&pod, container)?);
    }

    let document = build_pod_document(&pod, &resolved, &run_options, &[])?;
    tracing::debug!(pod = %pod.full_name(), "Rendered pod document");
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn cmd_hash(manifest: PathBuf) -> anyhow::Result<()> {
    let pod = load_manifest(&manifest)?;
    println!("{}", pod.identity());
    for container in &pod.containers {
        println!(
            "  {}\t{:x}\t{}",
            container.name,
            container.spec_hash(),
            pod.container_identity(container)
        );
    }
    Ok(())
}

fn cmd_decode(name: &str) -> anyhow::Result<()> {
    if let Ok(c) = ContainerIdentity::decode(name) {
        println!("kind:      container");
        println!("uid:       {}", c.owner_uid);
        println!("pod:       {}", c.pod_name);
        println!("namespace: {}", c.namespace);
        println!("container: {}", c.container_name);
        println!("hash:      {:x}", c.spec_hash);
        return Ok(());
    }
    let p = PodIdentity::decode(name)?;
    println!("kind:      pod");
    println!("uid:       {}", p.owner_uid);
    println!("pod:       {}", p.pod_name);
    println!("namespace: {}", p.namespace);
    Ok(())
}

fn cmd_version() {
    println!("hyperlet version {}", env!("CARGO_PKG_VERSION"));
    println!("engine: {}", hyperlet::ENGINE_TYPE);
}

fn cmd_help() {
    println!(
        r#"hyperlet - pod runtime adapter for VM-pod engines

USAGE:
    hyperlet <command> [options]

COMMANDS:
    render <manifest>      Print the engine document for a pod manifest
    hash <manifest>        Print pod and container engine names
    decode <name>          Decode an engine pod or container name
    version                Show version info
    help                   Show this help

OPTIONS:
    --config, -c <path>    Adapter configuration (YAML)

ENVIRONMENT:
    RUST_LOG               Log filter (default: warn)

EXAMPLES:
    hyperlet render pod.yaml
    hyperlet decode kube_6f1c_web_default_nginx_9a3e5c
"#
    );
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
        return ExitCode::FAILURE;
    }

    match parse_args() {
        Ok(cmd) => {
            let result = match cmd {
                Command::Render { manifest, config } => cmd_render(manifest, config),
                Command::Hash { manifest } => cmd_hash(manifest),
                Command::Decode { name } => cmd_decode(&name),
                Command::Version => {
                    cmd_version();
                    Ok(())
                }
                Command::Help => {
                    cmd_help();
                    Ok(())
                }
            };

            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            cmd_help();
            ExitCode::FAILURE
        }
    }
}
