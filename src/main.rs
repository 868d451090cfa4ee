use std::path::PathBuf;

use clap::Parser;

use nbview::config;

#[derive(Parser)]
#[command(name = "nbview", about = "Terminal Jupyter notebook viewer with Kitty graphics")]
struct Cli {
    /// Notebook file to display (.ipynb)
    input: PathBuf,

    /// Disable automatic file watching (viewer reloads on file change by default)
    #[arg(long)]
    no_watch: bool,

    /// Log output file path (enables logging when specified)
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    // Logging to the terminal would corrupt the frame; only log to a file.
    if let Some(log_path) = &cli.log {
        let file = std::fs::File::create(log_path).expect("failed to open log file");
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }

    if cli.input.extension().and_then(|e| e.to_str()) != Some("ipynb") {
        eprintln!("Error: {} is not a .ipynb notebook", cli.input.display());
        std::process::exit(2);
    }

    let config = match config::load_config() {
        Ok(cfg) => cfg.resolve(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = nbview::viewer::run(&cli.input, &config, !cli.no_watch) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
