use clap::{Arg, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// `NOTELY_LOG_LEVEL` names, indexed by the verbosity count they stand for.
/// `-v` repeats map onto the same scale: none is ERROR, `-vvvv` is TRACE.
pub const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accepts a level name (any case) or its numeric verbosity.
fn parse_level(level: &str) -> Result<u8, String> {
    let level = level.trim();
    if let Ok(count) = level.parse::<u8>() {
        if usize::from(count) < LEVELS.len() {
            return Ok(count);
        }
        return Err(format!("log level must be 0 to {}", LEVELS.len() - 1));
    }

    LEVELS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level '{level}', expected one of: {}", LEVELS.join(", ")))
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("NOTELY_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_their_position() {
        assert_eq!(parse_level("error"), Ok(0));
        assert_eq!(parse_level("WARN"), Ok(1));
        assert_eq!(parse_level("Info"), Ok(2));
        assert_eq!(parse_level(" debug "), Ok(3));
        assert_eq!(parse_level("trace"), Ok(4));
    }

    #[test]
    fn numbers_within_range_pass_through() {
        assert_eq!(parse_level("0"), Ok(0));
        assert_eq!(parse_level("4"), Ok(4));
        assert!(parse_level("5").is_err());
        assert!(parse_level("255").is_err());
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(parse_level("verbose").is_err_and(|err| err.contains("error, warn")));
        assert!(parse_level("").is_err());
        assert!(parse_level("-1").is_err());
    }
}
