use gumdrop::Options;

/// Pull registered git repositories on webhook requests.
#[derive(Debug, Options)]
pub struct Args {
    /// The JSON configuration file with the token and the repositories.
    #[options(meta = "FILE")]
    pub config: Option<String>,

    /// Increase verbosity, can be set multiple times (-v debug, -vv tracing)
    #[options(count)]
    pub verbose: u8,

    /// Only print errors.
    #[options()]
    pub quiet: bool,

    /// Print the current version.
    #[options(short = "V")]
    pub version: bool,

    /// Print this help.
    #[options()]
    pub help: bool,
}

pub fn parse_args() -> Args {
    Args::parse_args_default_or_exit()
}
