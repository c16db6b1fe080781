use anyhow::Result;
use clap::Parser;
use majin_analyzer::cli;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = !args.is_interactive();

    // Everything async is cooperative; the TUI gets its own OS thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let res = runtime.block_on(cli::run(args));
    runtime.shutdown_background();
    res?;

    // Explicitly exit with code 0 on success for non-TUI modes
    if is_non_tui {
        std::process::exit(0);
    }
    Ok(())
}
