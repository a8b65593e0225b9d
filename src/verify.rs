use crate::config::Config;
use crate::error::Result;
use crate::media::{TokenPair, Verification};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Verification token resolution.
///
/// Restricted streams require a visitor identifier plus a proof-of-origin
/// token. The pair comes from configured secrets when present; otherwise
/// an auxiliary network call asks a configured provider endpoint to mint
/// one for the video. Any failure degrades the resolver instead of
/// aborting it: the caller receives [`Verification::Unavailable`] and a
/// warning is emitted.

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    po_token: String,
    #[serde(default)]
    visitor_data: Option<String>,
}

/// Resolves the verification token pair for `video_id`.
///
/// Order: configured secrets, then the token provider endpoint. Never
/// fails; degraded mode is reported through the returned variant.
pub async fn resolve(http: &reqwest::Client, config: &Config, video_id: &str) -> Verification {
    if let Some(secrets) = &config.secrets {
        info!("Using configured verification secrets");
        return Verification::Token(TokenPair {
            visitor_id: secrets.visitor_id.clone(),
            po_token: secrets.po_token.clone(),
        });
    }

    let Some(endpoint) = &config.token_provider else {
        debug!("No token provider configured, continuing without verification");
        return Verification::Unavailable;
    };

    match request_token(http, endpoint, video_id).await {
        Ok(pair) => {
            info!("Obtained verification token from provider");
            Verification::Token(pair)
        }
        Err(e) => {
            warn!("Failed to obtain verification token, continuing without it: {e}");
            Verification::Unavailable
        }
    }
}

/// Scrapes the visitor identifier from the watch page, then asks the
/// provider endpoint for a proof-of-origin token.
async fn request_token(
    http: &reqwest::Client,
    endpoint: &str,
    video_id: &str,
) -> Result<TokenPair> {
    let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
    let page = http.get(&watch_url).send().await?.text().await?;
    let visitor_id = scrape_visitor_data(&page)
        .ok_or_else(|| crate::error::AppError::Verification("visitorData not found".into()))?;

    let response = http
        .post(endpoint)
        .json(&serde_json::json!({
            "video_id": video_id,
            "visitor_data": visitor_id,
        }))
        .send()
        .await?
        .error_for_status()?
        .json::<ProviderResponse>()
        .await?;

    Ok(TokenPair {
        visitor_id: response.visitor_data.unwrap_or(visitor_id),
        po_token: response.po_token,
    })
}

/// Extracts the `visitorData` value embedded in a watch page.
fn scrape_visitor_data(page: &str) -> Option<String> {
    let key = "\"visitorData\":\"";
    let start = page.find(key)? + key.len();
    let rest = &page[start..];
    let end = rest.find('"')?;
    let value = &rest[..end];
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secrets;

    #[test]
    fn scrapes_visitor_data_from_page() {
        let page = r#"{"responseContext":{"visitorData":"Cgtzb21lLXZpc2l0b3Iw"}}"#;
        assert_eq!(
            scrape_visitor_data(page).as_deref(),
            Some("Cgtzb21lLXZpc2l0b3Iw")
        );
    }

    #[test]
    fn scrape_returns_none_when_absent() {
        assert!(scrape_visitor_data("<html></html>").is_none());
        assert!(scrape_visitor_data(r#""visitorData":"""#).is_none());
    }

    #[tokio::test]
    async fn configured_secrets_short_circuit_network() {
        let config = Config {
            secrets: Some(Secrets {
                visitor_id: "vid".into(),
                po_token: "tok".into(),
            }),
            ..Config::default()
        };
        let http = reqwest::Client::new();
        let verification = resolve(&http, &config, "abc123").await;
        let pair = verification.token().unwrap();
        assert_eq!(pair.visitor_id, "vid");
        assert_eq!(pair.po_token, "tok");
    }

    #[tokio::test]
    async fn no_provider_means_unavailable() {
        let config = Config::default();
        let http = reqwest::Client::new();
        let verification = resolve(&http, &config, "abc123").await;
        assert!(!verification.is_available());
    }
}
