use myshell::Interpreter;
use myshell::config::Config;
use myshell::signal;

fn main() -> anyhow::Result<()> {
    let config: Config = argh::from_env();
    config.init_logging()?;
    signal::install_interrupt_handler()?;

    let mut shell = Interpreter::new(&config.prompt)?;
    let code = match &config.command {
        Some(line) => shell.run_once(line),
        None => shell.repl()?,
    };

    log::debug!("leaving with status {}", code);
    std::process::exit(code)
}
