use anyhow::{Context, Result};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse comma-separated seeds; hex (`0x...`) and decimal are accepted.
pub fn parse_seeds(s: &str) -> Result<Vec<u64>> {
    split_csv(s)
        .iter()
        .map(|token| {
            let parsed = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .map_or_else(
                    || token.replace('_', "").parse::<u64>(),
                    |hex| u64::from_str_radix(&hex.replace('_', ""), 16),
                );
            parsed.with_context(|| format!("invalid seed {token:?}"))
        })
        .collect()
}
