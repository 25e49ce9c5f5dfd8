// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the deckhand CLI

pub mod catalog;
pub mod config;
pub mod context;
pub mod deploy;
pub mod run;
pub mod stop;

pub use self::catalog::CatalogCommand;
pub use self::config::ConfigCommand;
pub use self::deploy::{DeployCommand, UndeployCommand};
pub use self::run::RunCommand;
pub use self::stop::StopCommand;

/// Parse a `KEY=VALUE` flag; the value may itself contain `=`.
pub fn parse_env_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_env_var;

    #[test]
    fn test_parse_env_var_splits_on_first_equals() {
        assert_eq!(
            parse_env_var("TOKEN=a=b=c"),
            Ok(("TOKEN".to_string(), "a=b=c".to_string()))
        );
    }

    #[test]
    fn test_parse_env_var_allows_empty_value() {
        assert_eq!(
            parse_env_var("FLAG="),
            Ok(("FLAG".to_string(), String::new()))
        );
    }

    #[test]
    fn test_parse_env_var_rejects_missing_key_or_separator() {
        assert!(parse_env_var("=value").is_err());
        assert!(parse_env_var("novalue").is_err());
    }
}
