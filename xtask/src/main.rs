use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Workspace tasks for the Unifying receiver tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Build every workspace member
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Format check, clippy with warnings denied, then the test suite
    Ci,
    /// Run the `unifying` binary, forwarding the remaining arguments
    Unifying {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn cargo(args: &[&str]) -> Result<()> {
    println!("cargo {}", args.join(" "));
    let status = Command::new(env!("CARGO"))
        .args(args)
        .status()
        .context("spawning cargo")?;
    if !status.success() {
        bail!("cargo {} failed with {}", args[0], status);
    }
    Ok(())
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Task::Build { release } => {
            let mut args = vec!["build", "--workspace"];
            if release {
                args.push("--release");
            }
            cargo(&args)
        }
        Task::Ci => {
            cargo(&["fmt", "--all", "--check"])?;
            cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
            cargo(&["test", "--workspace"])
        }
        Task::Unifying { args } => {
            let mut full = vec!["run", "-q", "-p", "unifying-cli", "--"];
            full.extend(args.iter().map(String::as_str));
            cargo(&full)
        }
    }
}
