//! CLI flags layered over environment variables, following the teacher's
//! `clap::Parser` `Args` struct (`server/src/main.rs`) plus the env-var
//! fallback spec.md §6.3 asks for. Config loading itself is a boundary
//! concern — this module only turns inputs into a `Config` value, it
//! doesn't know about sockets or matches.

use std::str::FromStr;

use clap::Parser;
use shared::Region;

#[derive(Parser, Debug)]
#[command(name = "arena-match-server", about = "Authoritative match server")]
pub struct Args {
    /// UDP port to bind. Falls back to $PORT, then 3001.
    #[arg(long)]
    pub port: Option<u16>,

    /// Bind address.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Max players per match. Falls back to $MAX_PLAYERS_PER_MATCH, then 10.
    #[arg(long)]
    pub max_players_per_match: Option<usize>,

    /// Comma-separated list of accepted regions. Falls back to
    /// $VALID_REGIONS, then "NA,EU,ASIA".
    #[arg(long)]
    pub valid_regions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub max_players_per_match: usize,
    pub valid_regions: Vec<Region>,
}

impl Config {
    /// Merges CLI flags (highest priority) with environment variables and
    /// hardcoded defaults (lowest priority).
    pub fn load() -> Self {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Self {
        let port = args
            .port
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(3001);

        let max_players_per_match = args
            .max_players_per_match
            .or_else(|| std::env::var("MAX_PLAYERS_PER_MATCH").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(shared::DEFAULT_MAX_PLAYERS_PER_MATCH);

        let region_list = args
            .valid_regions
            .or_else(|| std::env::var("VALID_REGIONS").ok())
            .unwrap_or_else(|| "NA,EU,ASIA".to_string());
        let valid_regions = region_list
            .split(',')
            .filter_map(|s| Region::from_str(s).ok())
            .collect::<Vec<_>>();
        let valid_regions = if valid_regions.is_empty() {
            vec![Region::Na, Region::Eu, Region::Asia]
        } else {
            valid_regions
        };

        Config { bind_addr: format!("{}:{}", args.host, port), max_players_per_match, valid_regions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_set() {
        let config = Config::from_args(Args {
            port: None,
            host: "0.0.0.0".to_string(),
            max_players_per_match: None,
            valid_regions: None,
        });
        assert_eq!(config.bind_addr, "0.0.0.0:3001");
        assert_eq!(config.max_players_per_match, 10);
        assert_eq!(config.valid_regions, vec![Region::Na, Region::Eu, Region::Asia]);
    }

    #[test]
    fn cli_flags_take_priority() {
        let config = Config::from_args(Args {
            port: Some(9000),
            host: "127.0.0.1".to_string(),
            max_players_per_match: Some(4),
            valid_regions: Some("GLOBAL".to_string()),
        });
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.max_players_per_match, 4);
        assert_eq!(config.valid_regions, vec![Region::Global]);
    }
}
