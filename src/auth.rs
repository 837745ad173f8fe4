// ABOUTME: Token discovery with precedence chain
// ABOUTME: CLI flag → READWISE_TOKEN env var → persisted setting

use std::env;

pub const TOKEN_ENV: &str = "READWISE_TOKEN";
pub const TOKEN_PAGE: &str = "https://readwise.io/access_tokens";

/// Token to use for this session, if something overrides the saved one.
pub fn resolve_token(cli_token: Option<String>) -> Option<String> {
    if let Some(token) = cli_token.filter(|t| !t.trim().is_empty()) {
        return Some(token.trim().to_string());
    }

    env::var(TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.trim().to_string())
}
