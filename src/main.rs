use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "outdated-lsp")]
#[command(version, about = "Language Server that flags outdated npm dependencies")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved log file location and exit
    LogPath,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(outdated_lsp::lsp::server::run_server()),
        Some(Command::LogPath) => {
            println!("{}", outdated_lsp::config::log_dir().display());
            Ok(())
        }
    }
}
