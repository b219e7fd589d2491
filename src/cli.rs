use miette::Diagnostic;
use std::{io::Read, path::PathBuf};
use thiserror::Error;

pub const USAGE: &str = "\
usage: qbce-prepro [options] [input-formula] [timeout]

  - 'input-formula' is a file in QDIMACS format (default: stdin)
  - 'timeout' is an optional time limit in seconds
  - 'options' is any combination of the following:

    -h, --help         print this usage information and exit
    --simplify         detect and mark blocked clauses
    --print-formula    print the parsed (and simplified) formula to stdout
                         Note: if option '--simplify' is NOT given
                         then the original formula is printed as is
    -v                 increase verbosity level incrementally (default: 0)
";

#[derive(Debug, Error, Diagnostic)]
pub enum ArgError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("invalid time limit '{0}'")]
    InvalidTimeout(String),

    #[error("expecting a non-zero time limit")]
    ZeroTimeout,

    #[error("input file '{}' is a directory", path.display())]
    InputIsDirectory { path: PathBuf },

    #[error("cannot read input file '{}': {}", path.display(), err)]
    CannotReadFile { path: PathBuf, err: std::io::Error },

    #[error("cannot read from stdin: {}", err)]
    CannotReadStdIn { err: std::io::Error },
}

/// Run configuration assembled from the command line.
#[derive(Debug, Default)]
pub struct Options {
    /// Input path; read from stdin if absent.
    pub input: Option<PathBuf>,
    /// Wall-clock limit in seconds, enforced through the alarm signal.
    pub max_time: Option<u32>,
    pub verbosity: u32,
    pub print_usage: bool,
    pub simplify: bool,
    pub print_formula: bool,
}

impl Options {
    /// Parses the process arguments.
    ///
    /// # Errors
    ///
    /// Fails on unknown options and unusable time limits. The input path is
    /// only validated when it is opened by [`Options::read_input`].
    pub fn from_args() -> Result<Self, ArgError> {
        Self::parse(std::env::args().skip(1))
    }

    fn parse(args: impl Iterator<Item = String>) -> Result<Self, ArgError> {
        let mut options = Self::default();
        for arg in args {
            match arg.as_str() {
                "-h" | "--help" => options.print_usage = true,
                "--simplify" => options.simplify = true,
                "--print-formula" => options.print_formula = true,
                "-v" => options.verbosity += 1,
                // a bare number anywhere on the line is the time limit
                _ if !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit()) => {
                    let seconds: u32 =
                        arg.parse().map_err(|_| ArgError::InvalidTimeout(arg.clone()))?;
                    if seconds == 0 {
                        return Err(ArgError::ZeroTimeout);
                    }
                    options.max_time = Some(seconds);
                }
                _ if !arg.starts_with('-') && options.input.is_none() => {
                    options.input = Some(PathBuf::from(&arg));
                }
                _ => return Err(ArgError::UnknownOption(arg)),
            }
        }
        Ok(options)
    }

    /// Reads the whole input into memory, from the configured file or from
    /// stdin. The stream is closed on all exit paths.
    pub fn read_input(&self) -> Result<Vec<u8>, ArgError> {
        let Some(path) = &self.input else {
            tracing::info!("no input file provided, reading from stdin");
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .map_err(|err| ArgError::CannotReadStdIn { err })?;
            return Ok(buffer);
        };
        if path.is_dir() {
            return Err(ArgError::InputIsDirectory { path: path.clone() });
        }
        std::fs::read(path).map_err(|err| ArgError::CannotReadFile { path: path.clone(), err })
    }
}
