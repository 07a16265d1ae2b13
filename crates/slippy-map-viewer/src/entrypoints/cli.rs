use clap::Parser;

/// Get an environment variable, parsed to the desired type.
pub fn get_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Parse the process command line.
pub fn parse_args<T: Parser>() -> Result<T, clap::Error> {
    T::try_parse()
}
