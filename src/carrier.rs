//! Carrier line-type classification.
//!
//! Answers "is this a real mobile line?" through an HTTP phone-intelligence
//! lookup. The check fails open: a disabled lookup, an unknown line type, or
//! any lookup failure all come back as [`LineStatus::Indeterminate`], which
//! [`LineStatus::allows`] admits. Only a definite non-mobile answer blocks.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::BotConfig;
use crate::error::CarrierError;

/// Why a lookup gave no definite answer.
#[derive(Debug)]
pub enum Indeterminate {
    /// No credential configured.
    Disabled,
    /// Line type missing, empty, or "Unknown".
    UnknownLineType,
    /// Network error, timeout, bad status, or malformed body.
    LookupFailed(CarrierError),
}

/// Classification of a phone number's line.
#[derive(Debug)]
pub enum LineStatus {
    Mobile,
    NonMobile { line_type: String },
    Indeterminate(Indeterminate),
}

impl LineStatus {
    /// Whether the requester passes the carrier gate.
    pub fn allows(&self) -> bool {
        !matches!(self, LineStatus::NonMobile { .. })
    }

    /// Map a reported line type onto a status.
    pub fn from_line_type(line_type: Option<&str>) -> Self {
        match line_type.map(str::trim) {
            None | Some("") => LineStatus::Indeterminate(Indeterminate::UnknownLineType),
            Some(t) if t.eq_ignore_ascii_case("unknown") => {
                LineStatus::Indeterminate(Indeterminate::UnknownLineType)
            }
            Some(t) if t.eq_ignore_ascii_case("mobile") => LineStatus::Mobile,
            Some(t) => LineStatus::NonMobile {
                line_type: t.to_string(),
            },
        }
    }
}

/// Something that can classify a phone number's line type.
#[async_trait]
pub trait LineClassifier: Send + Sync {
    async fn classify(&self, phone: &str) -> LineStatus;

    async fn is_mobile(&self, phone: &str) -> bool {
        self.classify(phone).await.allows()
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    phone_carrier: Option<PhoneCarrier>,
}

#[derive(Debug, Deserialize)]
struct PhoneCarrier {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    line_type: Option<String>,
}

/// HTTP-backed classifier.
pub struct CarrierClassifier {
    api_key: Option<SecretString>,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl CarrierClassifier {
    pub fn new(api_key: Option<SecretString>, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key,
            endpoint: endpoint.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            config.carrier_api_key.clone(),
            config.carrier_api_url.clone(),
            config.carrier_timeout,
        )
    }

    /// A classifier that never performs a lookup.
    pub fn disabled() -> Self {
        Self::new(None, String::new(), Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty())
    }

    async fn lookup(&self, api_key: &str, phone: &str) -> Result<LookupResponse, CarrierError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("api_key", api_key), ("phone", phone)])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CarrierError::Status {
                status: status.as_u16(),
            });
        }

        Ok(resp.json::<LookupResponse>().await?)
    }
}

#[async_trait]
impl LineClassifier for CarrierClassifier {
    async fn classify(&self, phone: &str) -> LineStatus {
        let Some(api_key) = self.api_key.as_ref().filter(|k| !k.expose_secret().is_empty())
        else {
            return LineStatus::Indeterminate(Indeterminate::Disabled);
        };

        match self.lookup(api_key.expose_secret(), phone).await {
            Ok(body) => {
                let carrier = body.phone_carrier;
                let name = carrier.as_ref().and_then(|c| c.name.as_deref());
                let line_type = carrier.as_ref().and_then(|c| c.line_type.as_deref());
                info!(
                    carrier = name.unwrap_or("unknown"),
                    line_type = line_type.unwrap_or("unknown"),
                    "Carrier lookup"
                );
                LineStatus::from_line_type(line_type)
            }
            Err(e) => {
                warn!("Carrier lookup failed, allowing: {e}");
                LineStatus::Indeterminate(Indeterminate::LookupFailed(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_is_case_insensitive() {
        assert!(matches!(
            LineStatus::from_line_type(Some("mobile")),
            LineStatus::Mobile
        ));
        assert!(matches!(
            LineStatus::from_line_type(Some("MOBILE")),
            LineStatus::Mobile
        ));
        assert!(matches!(
            LineStatus::from_line_type(Some("Mobile")),
            LineStatus::Mobile
        ));
    }

    #[test]
    fn missing_or_unknown_fails_open() {
        for line_type in [None, Some(""), Some("Unknown"), Some("unknown")] {
            let status = LineStatus::from_line_type(line_type);
            assert!(
                matches!(status, LineStatus::Indeterminate(Indeterminate::UnknownLineType)),
                "{line_type:?} should be indeterminate"
            );
            assert!(status.allows());
        }
    }

    #[test]
    fn other_line_types_block() {
        for line_type in ["voip", "Landline", "toll_free", "premium"] {
            let status = LineStatus::from_line_type(Some(line_type));
            assert!(!status.allows(), "{line_type} should be rejected");
            match status {
                LineStatus::NonMobile { line_type: t } => assert_eq!(t, line_type),
                other => panic!("expected NonMobile, got {other:?}"),
            }
        }
    }

    #[test]
    fn lookup_failure_allows() {
        let status = LineStatus::Indeterminate(Indeterminate::LookupFailed(CarrierError::Timeout));
        assert!(status.allows());
    }

    #[tokio::test]
    async fn disabled_classifier_skips_lookup() {
        let classifier = CarrierClassifier::disabled();
        assert!(!classifier.is_enabled());
        let status = classifier.classify("+14155551234").await;
        assert!(matches!(status, LineStatus::Indeterminate(Indeterminate::Disabled)));
        assert!(classifier.is_mobile("+14155551234").await);
    }

    #[tokio::test]
    async fn empty_key_counts_as_disabled() {
        let classifier = CarrierClassifier::new(
            Some(SecretString::from("")),
            "http://127.0.0.1:9",
            Duration::from_secs(1),
        );
        assert!(!classifier.is_enabled());
        assert!(matches!(
            classifier.classify("+14155551234").await,
            LineStatus::Indeterminate(Indeterminate::Disabled)
        ));
    }

    #[tokio::test]
    async fn unreachable_service_fails_open() {
        let classifier = CarrierClassifier::new(
            Some(SecretString::from("key")),
            "http://127.0.0.1:9/v1/",
            Duration::from_secs(2),
        );
        let status = classifier.classify("+14155551234").await;
        assert!(matches!(
            status,
            LineStatus::Indeterminate(Indeterminate::LookupFailed(_))
        ));
        assert!(status.allows());
    }
}
