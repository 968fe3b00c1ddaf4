//! Generation request assembled from environment variables.
//!
//! | Variable                      | Required | Default                   |
//! |-------------------------------|----------|---------------------------|
//! | `GENERATION_PROMPT`           | yes      | --                        |
//! | `GENERATION_NEGATIVE_PROMPT`  | no       | empty                     |
//! | `GENERATION_WIDTH`            | no       | `1024`                    |
//! | `GENERATION_HEIGHT`           | no       | `1024`                    |
//! | `GENERATION_STEPS`            | no       | `20`                      |
//! | `GENERATION_SEED`             | no       | random                    |
//! | `GENERATION_MODEL`            | no       | builder default checkpoint|

use std::str::FromStr;

use comfydeploy_backend::config::ConfigError;
use comfydeploy_core::request::GenerationRequest;

pub fn request_from_env() -> Result<GenerationRequest, ConfigError> {
    request_from_lookup(|key| std::env::var(key).ok())
}

pub fn request_from_lookup<F>(lookup: F) -> Result<GenerationRequest, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let prompt = lookup("GENERATION_PROMPT")
        .filter(|p| !p.trim().is_empty())
        .ok_or(ConfigError::Missing("GENERATION_PROMPT"))?;

    let mut request = GenerationRequest::new(prompt);

    if let Some(negative) = lookup("GENERATION_NEGATIVE_PROMPT") {
        request.negative_prompt = negative;
    }
    if let Some(width) = parse_opt(&lookup, "GENERATION_WIDTH")? {
        request.width = width;
    }
    if let Some(height) = parse_opt(&lookup, "GENERATION_HEIGHT")? {
        request.height = height;
    }
    if let Some(steps) = parse_opt(&lookup, "GENERATION_STEPS")? {
        request.steps = steps;
    }
    request.seed = parse_opt(&lookup, "GENERATION_SEED")?;
    request.model = lookup("GENERATION_MODEL").filter(|m| !m.trim().is_empty());

    Ok(request)
}

fn parse_opt<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid { var, value: raw })
        }
        _ => Ok(None),
    }
}
