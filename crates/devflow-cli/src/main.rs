//! `devflow` command-line interface

mod console;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use console::ConsoleOperator;
use devflow_core::mirror::{self, ChangeKind};
use devflow_core::{
    licenses, AssetCompiler, BindingGenerator, DevflowConfig, Mode, ProcessRunner,
    ReleasePackager, Workflow,
};
use devflow_sync::{ConvergenceDriver, GitCli, HttpDownloader, ToolchainFetcher};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("devflow")
        .version(devflow_core::VERSION)
        .about("Dependency sync, toolchain fetch and build workflow for the game project")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to devflow.toml (default: search upwards from the current directory)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log subprocess command lines"),
        )
        .subcommand(
            Command::new("sync")
                .about("Bring pinned dependencies to their target revisions")
                .arg(
                    Arg::new("only")
                        .long("only")
                        .action(ArgAction::Append)
                        .help("Converge only the named dependency (repeatable)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("toolchain")
                .about("Download the toolchain archive")
                .arg(
                    Arg::new("version")
                        .long("version")
                        .help("Toolchain version (default: [toolchain] version)"),
                ),
        )
        .subcommand(
            Command::new("pull")
                .about("Full pull: project, dependencies, toolchain, content, build, world")
                .arg(
                    Arg::new("world-only")
                        .long("world-only")
                        .action(ArgAction::SetTrue)
                        .help("Only regenerate and install the game world"),
                )
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .short('y')
                        .action(ArgAction::SetTrue)
                        .help("Do not wait for confirmation between steps"),
                ),
        )
        .subcommand(
            Command::new("assets")
                .about("Compile assets (all kinds when no flag is given)")
                .arg(
                    Arg::new("textures")
                        .long("textures")
                        .action(ArgAction::SetTrue)
                        .help("Install texture directories and convert textures"),
                )
                .arg(
                    Arg::new("shaders")
                        .long("shaders")
                        .action(ArgAction::SetTrue)
                        .help("Compile shaders"),
                )
                .arg(
                    Arg::new("meshes")
                        .long("meshes")
                        .action(ArgAction::SetTrue)
                        .help("Process glTF meshes"),
                ),
        )
        .subcommand(
            Command::new("mirror")
                .about("Make DST identical to SRC")
                .arg(
                    Arg::new("src")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("dst")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Only list differences"),
                ),
        )
        .subcommand(Command::new("licenses").about("Write the license report"))
        .subcommand(Command::new("release").about("Build and package a release archive"))
        .subcommand(Command::new("bindings").about("Generate bindings from C/C++ headers"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn load_config(matches: &ArgMatches) -> Result<DevflowConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => DevflowConfig::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("reading current directory")?;
            DevflowConfig::discover(&cwd).context("loading project config")
        }
    }
}

fn git(config: &DevflowConfig) -> GitCli {
    GitCli::new().with_program(&config.vcs.git)
}

fn sync(config: &DevflowConfig, args: &ArgMatches) -> Result<()> {
    let only: Vec<String> = args
        .get_many::<String>("only")
        .map(|names| names.cloned().collect())
        .unwrap_or_default();
    for name in &only {
        if config.dependencies.get(name).is_none() {
            bail!("no dependency named {name:?} in the manifest");
        }
    }
    let manifest = if only.is_empty() {
        config.dependencies.clone()
    } else {
        config.dependencies.only(&only)
    };

    let driver = ConvergenceDriver::new(git(config), config.external_dir());
    let results = driver
        .converge_all(&manifest)
        .context("dependency sync failed")?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            let status = match (&result.mutable_line, result.cloned) {
                (None, true) => "cloned".to_string(),
                (None, false) => "up to date".to_string(),
                (Some(line), _) => format!("updated via {line}"),
            };
            println!(
                "{:<24} {} {}",
                result.record.local_name,
                result.resolved_revision_id.short(),
                status
            );
        }
    }
    Ok(())
}

fn toolchain(config: &DevflowConfig, args: &ArgMatches) -> Result<()> {
    let version = match args.get_one::<String>("version") {
        Some(v) => v.clone(),
        None => config
            .toolchain
            .version
            .clone()
            .context("no toolchain version; pass --version or set [toolchain] version")?,
    };
    let downloader = HttpDownloader::new().context("creating HTTP client")?;
    let fetcher = ToolchainFetcher::new(config.resolved_toolchain(), downloader);
    let archive = fetcher
        .ensure_toolchain(&version)
        .with_context(|| format!("fetching toolchain {version}"))?;
    println!("{}", archive.install_instruction());
    Ok(())
}

fn pull(config: &DevflowConfig, args: &ArgMatches) -> Result<()> {
    let mode = if args.get_flag("world-only") {
        Mode::WorldOnly
    } else {
        Mode::Full
    };
    let downloader = HttpDownloader::new().context("creating HTTP client")?;
    let workflow = Workflow::new(config, ProcessRunner::new(), git(config), downloader);
    let report = workflow
        .run(mode, &mut ConsoleOperator, args.get_flag("yes"))
        .context("pull failed")?;
    tracing::info!(
        "completed {} steps ({} skipped)",
        report.completed.len(),
        report.skipped.len()
    );
    console::done();
    Ok(())
}

fn assets(config: &DevflowConfig, args: &ArgMatches) -> Result<()> {
    let compiler = AssetCompiler::new(config, ProcessRunner::new());
    let (textures, shaders, meshes) = (
        args.get_flag("textures"),
        args.get_flag("shaders"),
        args.get_flag("meshes"),
    );
    if !(textures || shaders || meshes) {
        let summary = compiler.compile_all()?;
        println!(
            "{} textures, {} shaders, {} mesh dirs, {} files installed",
            summary.textures, summary.shaders, summary.meshes, summary.installed_files
        );
        return Ok(());
    }
    if textures {
        let installed = compiler.install_textures()?;
        let count = compiler.compile_textures()?;
        println!("{count} textures, {} files installed", installed.copied);
    }
    if shaders {
        println!("{} shaders", compiler.compile_shaders()?);
    }
    if meshes {
        println!("{} mesh dirs", compiler.compile_meshes()?);
    }
    Ok(())
}

fn mirror_dirs(args: &ArgMatches) -> Result<()> {
    let (Some(src), Some(dst)) = (args.get_one::<PathBuf>("src"), args.get_one::<PathBuf>("dst"))
    else {
        bail!("mirror needs SRC and DST");
    };
    if args.get_flag("dry-run") {
        for change in mirror::diff(src, dst)? {
            let marker = match change.kind {
                ChangeKind::Added => '+',
                ChangeKind::Modified => '~',
                ChangeKind::Removed => '-',
            };
            println!("{marker} {}", change.path.display());
        }
    } else {
        let report = mirror::mirror(src, dst)?;
        println!(
            "{} copied, {} removed, {} unchanged",
            report.copied, report.removed, report.unchanged
        );
    }
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let Some((name, args)) = matches.subcommand() else {
        bail!("no command given");
    };
    if name == "mirror" {
        return mirror_dirs(args);
    }

    let config = load_config(matches)?;
    match name {
        "sync" => sync(&config, args),
        "toolchain" => toolchain(&config, args),
        "pull" => pull(&config, args),
        "assets" => assets(&config, args),
        "licenses" => {
            let path = licenses::build_report(&config)?;
            println!("wrote {}", path.display());
            Ok(())
        }
        "release" => {
            let artifacts = ReleasePackager::new(&config, ProcessRunner::new()).package()?;
            println!(
                "{} ({} files)",
                artifacts.archive.display(),
                artifacts.archived_files
            );
            Ok(())
        }
        "bindings" => {
            let count = BindingGenerator::new(&config, ProcessRunner::new()).generate()?;
            println!("generated bindings for {count} headers");
            Ok(())
        }
        other => bail!("unknown command {other}"),
    }
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    if let Err(e) = run(&matches) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from([
                "devflow", "sync", "--only", "zigimg", "--only", "zig-args", "--verbose",
            ])
            .unwrap();
        assert!(matches.get_flag("verbose"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "sync");
        let only: Vec<_> = args.get_many::<String>("only").unwrap().collect();
        assert_eq!(only, ["zigimg", "zig-args"]);
    }

    #[test]
    fn mirror_requires_both_paths() {
        assert!(cli().try_get_matches_from(["devflow", "mirror", "a"]).is_err());
    }
}
