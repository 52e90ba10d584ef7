use crate::interpreter::DEFAULT_PROMPT;
use anyhow::{Context, Result};
use argh::FromArgs;
use log::LevelFilter;
use simplelog::WriteLogger;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

#[derive(FromArgs, Debug)]
/// Interactive command interpreter with pipes, redirection and background jobs.
pub struct Config {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// text printed before every line that is read.
    pub prompt: String,

    #[argh(option, short = 'c')]
    /// execute this single line and exit with its status.
    pub command: Option<String>,

    #[argh(option, default = "LevelFilter::Warn")]
    /// minimum level of log records: off, error, warn, info, debug or trace.
    pub log_level: LevelFilter,

    #[argh(option)]
    /// append log records to this file instead of standard error.
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Installs the global logger. Must be called at most once.
    pub fn init_logging(&self) -> Result<()> {
        let config = simplelog::Config::default();
        match &self.log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("can't open log file {}", path.display()))?;
                WriteLogger::init(self.log_level, config, file)?;
            }
            None => WriteLogger::init(self.log_level, config, io::stderr())?,
        }
        log::debug!("logging at {} level", self.log_level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Config, argh::EarlyExit> {
        Config::from_args(&["myshell"], args)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert_eq!(config.command, None);
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_all_options() {
        let config = parse(&[
            "--prompt",
            "$ ",
            "-c",
            "ls | wc -l",
            "--log-level",
            "debug",
            "--log-file",
            "/tmp/myshell.log",
        ])
        .unwrap();
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.command.as_deref(), Some("ls | wc -l"));
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/myshell.log")));
    }

    #[test]
    fn test_bad_log_level_is_rejected() {
        let err = parse(&["--log-level", "loud"]).err().unwrap();
        assert!(err.status.is_err());
    }
}
