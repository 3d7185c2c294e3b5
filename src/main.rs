use anyhow::Result;
use argh::FromArgs;
use std::path::PathBuf;
use tinysh::Interpreter;
use tinysh::config::Config;

#[derive(FromArgs)]
/// A small interactive shell.
struct Args {
    #[argh(option)]
    /// configuration file to use instead of ~/.config/tinysh/config.toml
    config: Option<PathBuf>,

    #[argh(option, short = 'c')]
    /// run this line and exit instead of starting the interactive loop
    command: Option<String>,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tinysh::logging::init(&config.logging)?;

    let mut sh = Interpreter::new(&config);
    match args.command {
        Some(line) => sh.execute_line(&line),
        None => sh.repl(),
    }
}
