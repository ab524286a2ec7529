//! Email delivery client for locally generated OTP codes.
//!
//! Unlike the SMS path, the email path owns its codes: the caller generates
//! and stores the code, and this client only delivers it through a
//! JSON send API.

use super::ServiceError;

#[derive(Debug, Clone)]
pub struct EmailClient {
    api_url: String,
    api_key: String,
    from_address: String,
}

impl EmailClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from_address: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            from_address: from_address.into(),
        }
    }

    /// Deliver a one-time code to the given address.
    pub fn send_otp(&self, to: &str, code: &str) -> Result<(), ServiceError> {
        let body = serde_json::json!({
            "from": self.from_address,
            "to": to,
            "subject": "Your verification code",
            "text": format!(
                "Your verification code is {code}. It expires in 5 minutes."
            ),
        });
        ureq::post(&self.api_url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())?;
        Ok(())
    }
}
