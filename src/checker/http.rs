// src/checker/http.rs
// =============================================================================
// The network probe for a single URL.
//
// Protocol:
// - Try a HEAD request first (lightweight, no body download)
// - If the server rejects HEAD (405/501), fall back to GET
// - Redirects are followed by the client up to a bounded hop count, so a
//   2xx-3xx chain lands here as a final success status
//
// Failure taxonomy:
// - 2xx: Ok. 403: Ok with a note (bot-blocking sites answer every
//   automated probe with 403)
// - other 4xx/5xx: broken, but retried with backoff first
// - timeout / connection refused / DNS failure: transient, retried with
//   exponential backoff before giving up
// - redirect loops and malformed requests: broken immediately, a retry
//   cannot fix them
// - a 2xx GET body whose title or heading says "Page Not Found": soft 404,
//   broken immediately
//
// attempts counts probes actually issued, so a URL broken after full
// retry exhaustion reports attempts == retries + 1.
// =============================================================================

use reqwest::{Client, StatusCode};
use std::time::Duration;

// Cap on the exponential backoff delay between retries, whatever the
// retry count is configured to.
const MAX_BACKOFF: Duration = Duration::from_secs(8);

// Phrases that mark a "200 OK" page as a soft 404 when they appear in the
// title or a heading.
const SOFT_404_PATTERNS: &[&str] = &[
    "Page Not Found",
    "page not found",
    "404 - Not Found",
    "Sorry, we couldn't find",
    "This page doesn't exist",
    "Nothing was found",
];

// The final result of probing one URL, shared through the cache.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub http_status: Option<u16>,
    /// Probes issued for this URL, including the successful or final one
    pub attempts: u32,
    pub detail: Option<String>,
}

// What one probe attempt concluded.
enum Attempt {
    /// The URL is reachable
    Good {
        status: u16,
        note: Option<String>,
    },
    /// Failed in a way a retry can plausibly fix (4xx/5xx, network errors)
    Retryable {
        status: Option<u16>,
        note: String,
    },
    /// Failed permanently; retrying would only slow the run down
    Fatal {
        status: Option<u16>,
        note: String,
    },
}

/// Probes a URL, retrying transient and HTTP-level failures with capped
/// exponential backoff. Never returns early on an individual failure.
pub async fn probe_with_retries(
    client: &Client,
    url: &str,
    retries: u32,
    backoff: Duration,
) -> ProbeOutcome {
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match probe_once(client, url).await {
            Attempt::Good { status, note } => {
                return ProbeOutcome {
                    ok: true,
                    http_status: Some(status),
                    attempts,
                    detail: note,
                }
            }
            Attempt::Fatal { status, note } => {
                return ProbeOutcome {
                    ok: false,
                    http_status: status,
                    attempts,
                    detail: Some(note),
                }
            }
            Attempt::Retryable { status, note } => {
                if attempts > retries {
                    return ProbeOutcome {
                        ok: false,
                        http_status: status,
                        attempts,
                        detail: Some(format!("{} (after {} attempts)", note, attempts)),
                    };
                }
                tokio::time::sleep(backoff_delay(backoff, attempts)).await;
            }
        }
    }
}

// Exponential backoff: base * 2^(attempt-1), capped.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = (attempt - 1).min(6);
    (base * 2u32.pow(exponent)).min(MAX_BACKOFF)
}

// One probe: HEAD, with GET fallback when the server rejects HEAD.
async fn probe_once(client: &Client, url: &str) -> Attempt {
    match client.head(url).send().await {
        Ok(response) => {
            let status = response.status();
            if matches!(
                status,
                StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
            ) {
                probe_with_get(client, url).await
            } else {
                classify_status(status)
            }
        }
        Err(error) => classify_error(error),
    }
}

// Full GET fallback. The body is only fetched here, which is also the one
// place soft 404s can be detected.
async fn probe_with_get(client: &Client, url: &str) -> Attempt {
    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                return classify_status(status);
            }

            match response.text().await {
                Ok(body) => {
                    if let Some(pattern) = detect_soft_404(&body) {
                        Attempt::Fatal {
                            status: Some(status.as_u16()),
                            note: format!("soft 404 (page contains '{}')", pattern),
                        }
                    } else {
                        Attempt::Good {
                            status: status.as_u16(),
                            note: None,
                        }
                    }
                }
                // Could not read the body; the status already said success
                Err(_) => Attempt::Good {
                    status: status.as_u16(),
                    note: None,
                },
            }
        }
        Err(error) => classify_error(error),
    }
}

// Maps a final HTTP status to an attempt outcome.
//
// HTTP status codes:
// - 200-299: success
// - 300-399: redirect (the client already followed it; seeing one here
//   still means the target answered)
// - 400-499 / 500-599: broken, retried before the verdict sticks
fn classify_status(status: StatusCode) -> Attempt {
    let code = status.as_u16();

    if status.is_success() || status.is_redirection() {
        Attempt::Good {
            status: code,
            note: None,
        }
    } else if status == StatusCode::FORBIDDEN {
        // Bot-blocking sites answer every automated probe with 403; the
        // page is almost always fine in a browser
        Attempt::Good {
            status: code,
            note: Some("HTTP 403 treated as reachable (bot protection)".to_string()),
        }
    } else {
        Attempt::Retryable {
            status: Some(code),
            note: format!("HTTP {}", code),
        }
    }
}

// Categorizes reqwest errors into transient and permanent failures.
fn classify_error(error: reqwest::Error) -> Attempt {
    let error_string = error.to_string();

    if error.is_timeout() {
        Attempt::Retryable {
            status: None,
            note: "request timed out".to_string(),
        }
    } else if error.is_redirect() {
        Attempt::Fatal {
            status: None,
            note: "too many redirects".to_string(),
        }
    } else if error.is_connect() {
        if error_string.contains("dns") {
            Attempt::Retryable {
                status: None,
                note: "could not resolve hostname".to_string(),
            }
        } else {
            Attempt::Retryable {
                status: None,
                note: "connection failed".to_string(),
            }
        }
    } else if error.is_builder() || error.is_request() {
        Attempt::Fatal {
            status: None,
            note: format!("invalid request: {}", error_string),
        }
    } else {
        // Unknown network-level failure: give the retry a chance
        Attempt::Retryable {
            status: None,
            note: error_string,
        }
    }
}

// Looks for a not-found phrase in the parts of the body a human would see
// as the page's headline, to avoid false positives from sidebar or footer
// text mentioning 404s.
fn detect_soft_404(body: &str) -> Option<&'static str> {
    // The headline lives early in the document; clamp to a char boundary
    let mut end = body.len().min(5000);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    let head = &body[..end];

    for pattern in SOFT_404_PATTERNS {
        if body.contains(&format!("<title>{}", pattern))
            || body.contains(&format!("<h1>{}", pattern))
            || (body.contains("<h1 class") && head.contains(pattern))
        {
            return Some(pattern);
        }
    }

    None
}
