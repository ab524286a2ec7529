//! SMS verification client (Twilio Verify wire format).
//!
//! The provider owns code generation, delivery, and expiry for phone
//! sign-in: we start a verification and later check a code, never storing
//! anything locally. A verification check reports its outcome as a status
//! string; only `"approved"` counts as success.

use base64::Engine as _;

use super::ServiceError;

/// Status string a successful verification check must report.
pub const APPROVED: &str = "approved";

#[derive(Debug, Clone)]
pub struct SmsVerifyClient {
    base_url: String,
    account_sid: String,
    auth_token: String,
    service_id: String,
}

/// Format a phone number as E.164: prefix `+` unless already present.
pub fn format_e164(phone: &str) -> String {
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}

impl SmsVerifyClient {
    pub fn new(
        base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            service_id: service_id.into(),
        }
    }

    fn auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.account_sid, self.auth_token);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    /// Ask the provider to generate and deliver a code over SMS.
    pub fn start_verification(&self, phone: &str) -> Result<(), ServiceError> {
        let to = format_e164(phone);
        let url = format!(
            "{}/v2/Services/{}/Verifications",
            self.base_url.trim_end_matches('/'),
            self.service_id
        );
        ureq::post(&url)
            .set("Authorization", &self.auth_header())
            .send_form(&[("To", to.as_str()), ("Channel", "sms")])?;
        Ok(())
    }

    /// Check a code the user typed against the pending verification.
    /// Returns the provider's status string (`"approved"`, `"pending"`, ...).
    pub fn check_verification(&self, phone: &str, code: &str) -> Result<String, ServiceError> {
        let to = format_e164(phone);
        let url = format!(
            "{}/v2/Services/{}/VerificationCheck",
            self.base_url.trim_end_matches('/'),
            self.service_id
        );
        let response = ureq::post(&url)
            .set("Authorization", &self.auth_header())
            .send_form(&[("To", to.as_str()), ("Code", code)])
            .map_err(|e| match e {
                // The provider reports an expired or never-started
                // verification as 404 on the check resource.
                ureq::Error::Status(404, _) => {
                    ServiceError::Provider("verification not found or expired".to_string())
                }
                other => other.into(),
            })?;

        let body: serde_json::Value = response.into_json()?;
        body.get("status")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ServiceError::Provider("check response missing status".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e164_prefixes_plus_once() {
        assert_eq!(format_e164("447700900123"), "+447700900123");
        assert_eq!(format_e164("+447700900123"), "+447700900123");
    }

    #[test]
    fn auth_header_is_basic() {
        let client = SmsVerifyClient::new("http://x", "sid", "tok", "svc");
        assert!(client.auth_header().starts_with("Basic "));
    }
}
