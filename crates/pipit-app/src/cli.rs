use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line surface of a generated Pipit executable.
///
/// Unknown flags and malformed values are rejected by clap with exit
/// code 2; probe and parameter *names* are validated against the program
/// at startup.
#[derive(Debug, Parser)]
#[command(about = "Run a compiled Pipit pipeline", long_about = None)]
pub struct AppArgs {
    /// How long to run: a duration literal (10s, 500ms, 1m, 2h), bare
    /// seconds, or 'inf'.
    #[arg(long, default_value = "inf", value_parser = parse_run_duration)]
    pub duration: RunDuration,

    /// Override a runtime parameter (repeatable).
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, f64)>,

    /// Print per-task and per-buffer statistics at exit.
    #[arg(long)]
    pub stats: bool,

    /// Enable a named probe (repeatable).
    #[arg(long = "probe", value_name = "NAME")]
    pub probes: Vec<String>,

    /// Redirect probe output to a file instead of the diagnostic stream.
    #[arg(long = "probe-output", value_name = "PATH")]
    pub probe_output: Option<PathBuf>,

    /// Advisory thread-count hint.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

/// Parsed `--duration` value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunDuration {
    Infinite,
    For(Duration),
}

fn parse_run_duration(s: &str) -> Result<RunDuration, String> {
    if s == "inf" || s == "infinity" {
        return Ok(RunDuration::Infinite);
    }

    let (number, scale) = if let Some(v) = s.strip_suffix("ms") {
        (v, 1e-3)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1.0)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60.0)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3600.0)
    } else {
        // Bare value: seconds.
        (s, 1.0)
    };

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid duration '{s}'"));
    }
    Ok(RunDuration::For(Duration::from_secs_f64(value * scale)))
}

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    if name.is_empty() {
        return Err(format!("empty parameter name in '{s}'"));
    }
    let value: f64 = value
        .parse()
        .map_err(|_| format!("invalid value for parameter '{name}'"))?;
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_literals() {
        assert_eq!(parse_run_duration("inf").unwrap(), RunDuration::Infinite);
        assert_eq!(
            parse_run_duration("10s").unwrap(),
            RunDuration::For(Duration::from_secs(10))
        );
        assert_eq!(
            parse_run_duration("500ms").unwrap(),
            RunDuration::For(Duration::from_millis(500))
        );
        assert_eq!(
            parse_run_duration("1m").unwrap(),
            RunDuration::For(Duration::from_secs(60))
        );
        assert_eq!(
            parse_run_duration("2h").unwrap(),
            RunDuration::For(Duration::from_secs(7200))
        );
    }

    #[test]
    fn test_bare_seconds() {
        assert_eq!(
            parse_run_duration("3").unwrap(),
            RunDuration::For(Duration::from_secs(3))
        );
        assert_eq!(
            parse_run_duration("0.5").unwrap(),
            RunDuration::For(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_bad_durations_rejected() {
        assert!(parse_run_duration("-1s").is_err());
        assert!(parse_run_duration("abc").is_err());
        assert!(parse_run_duration("10x").is_err());
        assert!(parse_run_duration("").is_err());
    }

    #[test]
    fn test_param_parsing() {
        assert_eq!(
            parse_param("gain=0.5").unwrap(),
            ("gain".to_string(), 0.5)
        );
        assert!(parse_param("gain").is_err());
        assert!(parse_param("=1").is_err());
        assert!(parse_param("gain=abc").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = AppArgs::parse_from([
            "demo",
            "--duration",
            "2s",
            "--param",
            "gain=2.0",
            "--probe",
            "rms",
            "--stats",
            "--threads",
            "4",
        ]);
        assert_eq!(args.duration, RunDuration::For(Duration::from_secs(2)));
        assert_eq!(args.params, vec![("gain".to_string(), 2.0)]);
        assert_eq!(args.probes, vec!["rms".to_string()]);
        assert!(args.stats);
        assert_eq!(args.threads, Some(4));
    }

    #[test]
    fn test_duration_defaults_to_infinite() {
        let args = AppArgs::parse_from(["demo"]);
        assert_eq!(args.duration, RunDuration::Infinite);
        assert!(!args.stats);
    }
}
