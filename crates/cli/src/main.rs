//! anyfs CLI
//!
//! Runs facade operations against a directory on disk.
//!
//! Usage:
//!   anyfs [--dir DIR] [--config FILE] <command> [args]
//!   anyfs --help         Show help

mod config;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyfs::{pipe, AnyFs, LocalAdapter, Metadata, TreePlugin};
use anyhow::{bail, Context};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parsed command line
#[derive(Debug, Default, PartialEq, Eq)]
struct Invocation {
    dir: Option<PathBuf>,
    config: Option<PathBuf>,
    command: String,
    flags: Vec<String>,
    operands: Vec<String>,
}

impl Invocation {
    fn flag(&self, short: &str, long: &str) -> bool {
        self.flags.iter().any(|f| f == short || f == long)
    }

    fn operand(&self, index: usize, name: &str) -> anyhow::Result<&str> {
        self.operands
            .get(index)
            .map(String::as_str)
            .with_context(|| format!("{}: missing {name}", self.command))
    }
}

/// Split arguments into global options, the command, flags and operands
///
/// Returns `None` when no command was given.
fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Option<Invocation>> {
    let mut invocation = Invocation::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dir" | "-C" => {
                invocation.dir = Some(args.next().context("--dir needs a directory")?.into());
            }
            "--config" => {
                invocation.config = Some(args.next().context("--config needs a file")?.into());
            }
            _ if invocation.command.is_empty() => {
                if arg.starts_with('-') {
                    bail!("unknown option: {arg}");
                }
                invocation.command = arg;
            }
            _ if arg.starts_with('-') && arg.len() > 1 => invocation.flags.push(arg),
            _ => invocation.operands.push(arg),
        }
    }
    Ok((!invocation.command.is_empty()).then_some(invocation))
}

fn print_usage() {
    println!("anyfs - one filesystem API over a directory on disk");
    println!();
    println!("USAGE:");
    println!("    anyfs [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    ls [PATH]            List a directory");
    println!("    stat PATH            Print metadata as JSON");
    println!("    mkdir [-p] PATH      Create a directory (-p: with parents)");
    println!("    rm [-r] PATH         Remove a file (-r: a whole tree)");
    println!("    rmdir PATH           Remove an empty directory");
    println!("    mv SRC DEST          Move a file or directory");
    println!("    cp SRC DEST          Copy a file or directory");
    println!("    cat PATH             Write file contents to stdout");
    println!("    put PATH             Store stdin as a file");
    println!("    pipe SRC DEST        Stream one file into another");
    println!("    walk [PATH]          List every node below a directory");
    println!();
    println!("OPTIONS:");
    println!("    -C, --dir DIR        Directory backing the filesystem (default: current dir)");
    println!("    --config FILE        Config file to use");
    println!("    -h, --help           Print help information");
    println!("    -v, --version        Print version");
    println!();
    println!("CONFIG:");
    println!("    ~/.config/anyfs/config.toml");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG             Log filter (default: warn)");
}

fn describe(meta: &Metadata) -> String {
    if meta.is_directory {
        format!("{}/", meta.name)
    } else {
        format!("{:>10}  {}", meta.size.unwrap_or(0), meta.name)
    }
}

async fn run(fs: &AnyFs, invocation: &Invocation) -> anyhow::Result<()> {
    match invocation.command.as_str() {
        "ls" => {
            let path = invocation.operand(0, "path").unwrap_or(".");
            for entry in fs.list(path).await? {
                println!("{}", describe(&entry));
            }
        }
        "stat" => {
            let meta = fs.metadata(invocation.operand(0, "path")?).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        "mkdir" => {
            let path = invocation.operand(0, "path")?;
            if invocation.flag("-p", "--parents") {
                fs.mkdir_parents(path).await?;
            } else {
                fs.mkdir(path).await?;
            }
        }
        "rm" => {
            let path = invocation.operand(0, "path")?;
            if invocation.flag("-r", "--recursive") {
                fs.delete_recursive(path).await?;
            } else {
                fs.delete(path).await?;
            }
        }
        "rmdir" => fs.delete_dir(invocation.operand(0, "path")?).await?,
        "mv" => {
            let (src, dest) = (invocation.operand(0, "source")?, invocation.operand(1, "destination")?);
            fs.move_path(src, dest).await?;
        }
        "cp" => {
            let (src, dest) = (invocation.operand(0, "source")?, invocation.operand(1, "destination")?);
            fs.copy(src, dest).await?;
        }
        "cat" => {
            let data = fs.read_file(invocation.operand(0, "path")?).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
        "put" => {
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await?;
            fs.write_file(invocation.operand(0, "path")?, data).await?;
        }
        "pipe" => {
            let mut reader = fs.create_read_stream(invocation.operand(0, "source")?).await?;
            let mut writer = fs.create_write_stream(invocation.operand(1, "destination")?).await?;
            let copied = pipe(reader.as_mut(), writer.as_mut()).await?;
            tracing::info!(copied, "stream copied");
        }
        "walk" => {
            let path = invocation.operand(0, "path").unwrap_or(".");
            for (path, meta) in fs.walk(path).await? {
                let suffix = if meta.is_directory { "/" } else { "" };
                println!("{path}{suffix}");
            }
        }
        other => bail!("unknown command: {other} (see --help)"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging (tracing)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(first) = args.first() {
        match first.as_str() {
            "--version" | "-v" => {
                println!("anyfs {VERSION}");
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_usage();
                return Ok(());
            }
            _ => {}
        }
    }

    let Some(invocation) = parse_args(args)? else {
        print_usage();
        return Ok(());
    };

    let config = CliConfig::load(invocation.config.as_deref())?;
    let dir = match invocation.dir.clone().or(config.dir) {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine the working directory")?,
    };
    tracing::debug!(dir = %dir.display(), command = %invocation.command, "starting");

    let adapter = LocalAdapter::new(&dir).with_context(|| format!("cannot open {}", dir.display()))?;
    let fs = AnyFs::builder(Arc::new(adapter))
        .options(config.fs)
        .plugin(Arc::new(TreePlugin))?
        .build()?;

    run(&fs, &invocation).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_global_options_and_flags() {
        let invocation = parse_args(args(&["--dir", "/data", "rm", "-r", "old"]))
            .unwrap()
            .unwrap();
        assert_eq!(invocation.dir, Some(PathBuf::from("/data")));
        assert_eq!(invocation.command, "rm");
        assert!(invocation.flag("-r", "--recursive"));
        assert_eq!(invocation.operand(0, "path").unwrap(), "old");
        assert!(invocation.operand(1, "other").is_err());
    }

    #[test]
    fn test_parse_without_command() {
        assert!(parse_args(args(&[])).unwrap().is_none());
        assert!(parse_args(args(&["--config", "a.toml"])).unwrap().is_none());
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["--dir"])).is_err());
    }

    #[tokio::test]
    async fn test_run_against_a_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let fs = AnyFs::builder(Arc::new(LocalAdapter::new(dir.path()).unwrap()))
            .plugin(Arc::new(TreePlugin))
            .unwrap()
            .build()
            .unwrap();

        let mkdir = parse_args(args(&["mkdir", "-p", "a/b"])).unwrap().unwrap();
        run(&fs, &mkdir).await.unwrap();
        assert!(dir.path().join("a/b").is_dir());

        fs.write_file("/a/b/f.txt", "x").await.unwrap();
        let mv = parse_args(args(&["mv", "a", "z"])).unwrap().unwrap();
        run(&fs, &mv).await.unwrap();
        assert!(dir.path().join("z/b/f.txt").is_file());

        let rm = parse_args(args(&["rm", "z"])).unwrap().unwrap();
        let err = run(&fs, &rm).await.unwrap_err();
        assert_eq!(err.downcast_ref::<anyfs::FsError>().unwrap().code(), "EISDIR");

        let unknown = parse_args(args(&["frobnicate"])).unwrap().unwrap();
        assert!(run(&fs, &unknown).await.is_err());
    }
}
