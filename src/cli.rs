//! Minimal CLI parsing for configuration overrides.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Default, PartialEq)]
pub struct CliOptions {
    pub models_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub models_version_id: Option<String>,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };
            let mut value = || inline.clone().or_else(|| args.next());
            match flag.as_str() {
                "--models" => options.models_path = value().map(PathBuf::from),
                "--out" => options.output_path = value().map(PathBuf::from),
                "--version-id" => options.models_version_id = value(),
                _ => {}
            }
        }
        options
    }
}
