//! Out-of-band dispatch of one-time codes.
//!
//! The protocol only requires a `send code to identity` capability that
//! reports success or failure; production uses the Resend email API,
//! development falls back to logging the code.

use serde_json::json;
use tracing::info;

/// Where issued codes go.
pub enum Mailer {
    /// Development fallback: the code is written to the server log and
    /// never leaves the machine.
    Log,
    /// Resend email API.
    Resend(ResendSender),
    /// Captures codes in memory for router-level tests.
    #[cfg(test)]
    Capture(std::sync::Arc<std::sync::Mutex<Vec<(String, String)>>>),
}

impl Mailer {
    pub async fn send_code(&self, email: &str, code: &str) -> Result<(), String> {
        match self {
            Mailer::Log => {
                info!(to = %email, code = %code, "one-time code (dev mode, not emailed)");
                Ok(())
            }
            Mailer::Resend(sender) => sender.send_code(email, code).await,
            #[cfg(test)]
            Mailer::Capture(sink) => {
                sink.lock()
                    .expect("capture lock")
                    .push((email.to_string(), code.to_string()));
                Ok(())
            }
        }
    }
}

/// Sends code emails through the Resend HTTP API.
pub struct ResendSender {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendSender {
    pub fn new(api_key: String, from: String) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("cadence")
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            client,
            api_key,
            from,
        })
    }

    async fn send_code(&self, email: &str, code: &str) -> Result<(), String> {
        let body = json!({
            "from": self.from,
            "to": email,
            "subject": "Your verification code",
            "text": format!(
                "Your verification code is {code}. It will expire in 10 minutes."
            ),
        });

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("resend answered {}", response.status()));
        }

        info!(to = %email, "one-time code dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        assert!(Mailer::Log.send_code("alice@example.com", "123456").await.is_ok());
    }

    #[tokio::test]
    async fn capture_mailer_records_codes() {
        let sink = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mailer = Mailer::Capture(sink.clone());
        mailer.send_code("alice@example.com", "123456").await.unwrap();
        let captured = sink.lock().unwrap();
        assert_eq!(captured[0], ("alice@example.com".to_string(), "123456".to_string()));
    }
}
