#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args by hand. Environment variables with the `SBAR_DEMO_*`
//! prefix set defaults that flags override.

use std::env;
use std::path::PathBuf;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
sbar-demo: a status bar rendered headless onto a software canvas

USAGE:
    sbar-demo [OPTIONS]

OPTIONS:
    --width=N            Bar width in pixels (default: 800)
    --height=N           Bar height in pixels (default: 24)
    --exit-after-ms=N    Stop after N milliseconds (default: 0, run until signalled)
    --dump=PATH          Write the final frame to PATH as a binary PPM
    --hover=X            Simulate the pointer resting at x = X
    --cache-capacity=N   Text cache capacity in entries (default: 512)
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    SBAR_DEMO_WIDTH           Override --width
    SBAR_DEMO_HEIGHT          Override --height
    SBAR_DEMO_EXIT_AFTER_MS   Override --exit-after-ms
    SBAR_DEMO_DUMP            Override --dump
    SBAR_LOG                  Log filter (default: info)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    pub width: i32,
    pub height: i32,
    /// Stop after this many milliseconds (0 = run until signalled).
    pub exit_after_ms: u64,
    pub dump: Option<PathBuf>,
    pub hover: Option<i32>,
    pub cache_capacity: usize,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            width: 800,
            height: 24,
            exit_after_ms: 0,
            dump: None,
            hover: None,
            cache_capacity: sbar_text::DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Ways argument parsing ends without options to run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Help,
    Version,
    Invalid(String),
}

impl Opts {
    /// Parse the process environment and arguments, exiting on `--help`,
    /// `--version`, or a bad argument.
    pub fn parse() -> Self {
        let mut opts = Self::default();
        opts.apply_env(|key| env::var(key).ok());
        let args: Vec<String> = env::args().skip(1).collect();
        match opts.apply_args(&args) {
            Ok(()) => opts,
            Err(ParseOutcome::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Err(ParseOutcome::Version) => {
                println!("sbar-demo {VERSION}");
                process::exit(0);
            }
            Err(ParseOutcome::Invalid(msg)) => {
                eprintln!("{msg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(n) = var("SBAR_DEMO_WIDTH").and_then(|v| v.parse().ok()) {
            self.width = n;
        }
        if let Some(n) = var("SBAR_DEMO_HEIGHT").and_then(|v| v.parse().ok()) {
            self.height = n;
        }
        if let Some(n) = var("SBAR_DEMO_EXIT_AFTER_MS").and_then(|v| v.parse().ok()) {
            self.exit_after_ms = n;
        }
        if let Some(path) = var("SBAR_DEMO_DUMP").filter(|v| !v.is_empty()) {
            self.dump = Some(PathBuf::from(path));
        }
    }

    fn apply_args(&mut self, args: &[String]) -> Result<(), ParseOutcome> {
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Err(ParseOutcome::Help),
                "--version" | "-V" => return Err(ParseOutcome::Version),
                other => {
                    if let Some(val) = other.strip_prefix("--width=") {
                        self.width = positive("--width", val)?;
                    } else if let Some(val) = other.strip_prefix("--height=") {
                        self.height = positive("--height", val)?;
                    } else if let Some(val) = other.strip_prefix("--exit-after-ms=") {
                        self.exit_after_ms = number("--exit-after-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--dump=") {
                        self.dump = Some(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--hover=") {
                        self.hover = Some(number("--hover", val)?);
                    } else if let Some(val) = other.strip_prefix("--cache-capacity=") {
                        self.cache_capacity = number("--cache-capacity", val)?;
                    } else {
                        return Err(ParseOutcome::Invalid(format!("Unknown argument: {other}")));
                    }
                }
            }
        }
        Ok(())
    }
}

fn number<T: std::str::FromStr>(flag: &str, val: &str) -> Result<T, ParseOutcome> {
    val.parse()
        .map_err(|_| ParseOutcome::Invalid(format!("Invalid {flag} value: {val}")))
}

fn positive(flag: &str, val: &str) -> Result<i32, ParseOutcome> {
    match number::<i32>(flag, val)? {
        n if n > 0 => Ok(n),
        _ => Err(ParseOutcome::Invalid(format!("Invalid {flag} value: {val}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn default_opts() {
        let opts = Opts::default();
        assert_eq!(opts.width, 800);
        assert_eq!(opts.height, 24);
        assert_eq!(opts.exit_after_ms, 0);
        assert_eq!(opts.dump, None);
        assert_eq!(opts.cache_capacity, 512);
    }

    #[test]
    fn flags_override_env() {
        let mut opts = Opts::default();
        opts.apply_env(|key| match key {
            "SBAR_DEMO_WIDTH" => Some("640".into()),
            "SBAR_DEMO_EXIT_AFTER_MS" => Some("250".into()),
            _ => None,
        });
        assert_eq!(opts.width, 640);
        opts.apply_args(&args(&["--width=300", "--dump=out.ppm", "--hover=12"]))
            .unwrap();
        assert_eq!(opts.width, 300);
        assert_eq!(opts.exit_after_ms, 250);
        assert_eq!(opts.dump, Some(PathBuf::from("out.ppm")));
        assert_eq!(opts.hover, Some(12));
    }

    #[test]
    fn bad_env_values_are_ignored() {
        let mut opts = Opts::default();
        opts.apply_env(|key| (key == "SBAR_DEMO_HEIGHT").then(|| "tall".to_string()));
        assert_eq!(opts.height, 24);
    }

    #[test]
    fn rejects_unknown_and_invalid() {
        let mut opts = Opts::default();
        assert_eq!(
            opts.apply_args(&args(&["--frobnicate"])),
            Err(ParseOutcome::Invalid("Unknown argument: --frobnicate".into()))
        );
        assert_eq!(
            opts.apply_args(&args(&["--height=0"])),
            Err(ParseOutcome::Invalid("Invalid --height value: 0".into()))
        );
        assert_eq!(opts.apply_args(&args(&["-h"])), Err(ParseOutcome::Help));
        assert_eq!(opts.apply_args(&args(&["-V"])), Err(ParseOutcome::Version));
    }

    #[test]
    fn help_text_lists_env_vars() {
        assert!(HELP_TEXT.contains("SBAR_DEMO_EXIT_AFTER_MS"));
        assert!(HELP_TEXT.contains("SBAR_LOG"));
        assert!(!VERSION.is_empty());
    }
}
