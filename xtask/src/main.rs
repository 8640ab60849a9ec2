use anyhow::Result;
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run CI checks (fmt check, clippy, test)
    Ci,
    /// Apply rustfmt to all files
    Fmt,
    /// Run tests
    Test(TestArgs),
}

#[derive(clap::Args, Default)]
struct TestArgs {
    /// Additional arguments to pass to cargo test
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    match cli.command {
        Command::Ci => {
            eprintln!("Running cargo fmt check...");
            cmd!(sh, "cargo fmt --all -- --check").run()?;
            eprintln!("Running cargo clippy...");
            cmd!(
                sh,
                "cargo clippy --all-features --all-targets --workspace -- -D warnings"
            )
            .run()?;
            eprintln!("Running cargo test...");
            cmd!(sh, "cargo test --workspace").run()?;
            Ok(())
        }
        Command::Fmt => {
            cmd!(sh, "cargo fmt --all").run()?;
            Ok(())
        }
        Command::Test(test_args) => {
            let args = &test_args.args;
            cmd!(sh, "cargo test --workspace {args...}").run()?;
            Ok(())
        }
    }
}
