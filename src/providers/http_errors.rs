use anyhow::anyhow;
use std::error::Error as StdError;
use std::io::ErrorKind;

/// Walks the source chain looking for an I/O error of `kind`, or a message
/// containing `needle` for transports that only expose text.
fn error_chain_matches(err: &(dyn StdError + 'static), kind: ErrorKind, needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        let kind_matches = source
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io_err| io_err.kind() == kind);
        if kind_matches || source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }
        current = source.source();
    }
    false
}

fn is_timeout(err: &reqwest::Error) -> bool {
    err.is_timeout() || error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

/// Turns a transport failure into a message that names the setting to check.
pub(crate) fn api_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: u64,
) -> anyhow::Error {
    if is_timeout(&err) {
        return anyhow!(
            "Gemini request timed out after {timeout_secs}s while calling '{api_url}'. \
             Increase GEMINI_TIMEOUT_SECS or retry with a smaller file."
        );
    }

    if err.is_connect() {
        if is_connection_refused(&err) {
            return anyhow!(
                "Connection refused by Gemini API at '{api_url}'. \
                 Check that GEMINI_BASE_URL points at a reachable endpoint."
            );
        }
        return anyhow!(
            "Failed to connect to Gemini API at '{api_url}'. \
             Check GEMINI_BASE_URL and network connectivity."
        );
    }

    anyhow!("Failed to call Gemini API at '{api_url}': {err}")
}
