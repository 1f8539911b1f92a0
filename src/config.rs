use std::env;
use std::time::Duration;

use crate::model::GenerationParams;

const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TEXT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TEXT_MAX_OUTPUT_TOKENS: u32 = 4000;
const DEFAULT_MULTIMODAL_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_MULTIMODAL_TEMPERATURE: f32 = 0.4;
const DEFAULT_MULTIMODAL_MAX_OUTPUT_TOKENS: u32 = 4000;
const DEFAULT_UPLOAD_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_UPLOAD_POLL_ATTEMPTS: u32 = 30;

/// A model id plus the generation parameters a session runner uses with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub model_id: String,
    pub params: GenerationParams,
}

/// How long to wait for an uploaded file to become usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_UPLOAD_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_UPLOAD_POLL_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// `None` when `TEXT_MODEL` is set to an empty value.
    pub text_profile: Option<ModelProfile>,
    /// `None` when `MULTIMODAL_MODEL` is set to an empty value.
    pub multimodal_profile: Option<ModelProfile>,
    pub readiness: ReadinessPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let api_base_url = get_var("GEMINI_BASE_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let request_timeout_secs = parse_positive_u64(
            get_var("GEMINI_TIMEOUT_SECS").as_deref(),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );

        let text_profile = parse_profile(
            get_var("TEXT_MODEL").as_deref(),
            get_var("TEXT_TEMPERATURE").as_deref(),
            get_var("TEXT_MAX_OUTPUT_TOKENS").as_deref(),
            ProfileDefaults {
                model_id: DEFAULT_TEXT_MODEL,
                temperature: DEFAULT_TEXT_TEMPERATURE,
                max_output_tokens: DEFAULT_TEXT_MAX_OUTPUT_TOKENS,
            },
        );
        let multimodal_profile = parse_profile(
            get_var("MULTIMODAL_MODEL").as_deref(),
            get_var("MULTIMODAL_TEMPERATURE").as_deref(),
            get_var("MULTIMODAL_MAX_OUTPUT_TOKENS").as_deref(),
            ProfileDefaults {
                model_id: DEFAULT_MULTIMODAL_MODEL,
                temperature: DEFAULT_MULTIMODAL_TEMPERATURE,
                max_output_tokens: DEFAULT_MULTIMODAL_MAX_OUTPUT_TOKENS,
            },
        );

        let readiness = ReadinessPolicy {
            poll_interval: Duration::from_millis(parse_positive_u64(
                get_var("UPLOAD_POLL_INTERVAL_MS").as_deref(),
                DEFAULT_UPLOAD_POLL_INTERVAL_MS,
            )),
            max_attempts: parse_positive_u32(
                get_var("UPLOAD_POLL_ATTEMPTS").as_deref(),
                DEFAULT_UPLOAD_POLL_ATTEMPTS,
            ),
        };

        Self {
            api_base_url,
            request_timeout_secs,
            text_profile,
            multimodal_profile,
            readiness,
        }
    }
}

struct ProfileDefaults {
    model_id: &'static str,
    temperature: f32,
    max_output_tokens: u32,
}

fn parse_profile(
    model: Option<&str>,
    temperature: Option<&str>,
    max_output_tokens: Option<&str>,
    defaults: ProfileDefaults,
) -> Option<ModelProfile> {
    let model_id = match model.map(str::trim) {
        Some("") => return None,
        Some(value) => value.to_string(),
        None => defaults.model_id.to_string(),
    };

    Some(ModelProfile {
        model_id,
        params: GenerationParams {
            temperature: parse_temperature(temperature, defaults.temperature),
            max_output_tokens: parse_positive_u32(max_output_tokens, defaults.max_output_tokens),
        },
    })
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_positive_u32(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_temperature(raw: Option<&str>, default: f32) -> f32 {
    raw.and_then(|value| value.trim().parse::<f32>().ok())
        .filter(|value| GenerationParams::TEMPERATURE_RANGE.contains(value))
        .unwrap_or(default)
}
