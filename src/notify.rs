use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::models::{Recommendation, to_money};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, message: &str) -> Result<(), NotifyError>;
}

/// Posts `{subject, message}` as JSON to a webhook URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "subject": subject, "message": message }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }
        tracing::info!(subject, %status, "Notification sent");
        Ok(())
    }
}

// Local runs: print instead of delivering
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        println!("[{subject}]\n{message}");
        Ok(())
    }
}

/// Renders a recommendation as `SELL:` / `BUY:` sections with amounts in
/// cents. Buys carry the preferred fund label when one is configured.
pub fn format_recommendation(rec: &Recommendation, preferred: &HashMap<String, String>) -> String {
    let mut out = String::from("SELL:\n");
    for trade in &rec.sell {
        out.push_str(&format!(" {}: {:.2}\n", trade.category, to_money(trade.amount)));
    }
    out.push_str("BUY:\n");
    for trade in &rec.buy {
        let label = match preferred.get(&trade.category) {
            Some(fund) => format!("{} ({})", trade.category, fund),
            None => trade.category.clone(),
        };
        out.push_str(&format!(" {}: {:.2}\n", label, to_money(trade.amount)));
    }
    out
}

pub fn format_sweep(amount: f64) -> String {
    if amount < 0.0 {
        format!("Deposit {:.2} into checking", to_money(-amount))
    } else {
        format!("Withdraw {:.2} out of checking", to_money(amount))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Trade;

    #[test]
    fn formats_sell_and_labelled_buys() {
        let rec = Recommendation {
            sell: vec![Trade { category: "bonds".into(), amount: 1000.0 }],
            buy: vec![
                Trade { category: "stocks".into(), amount: 999.5 },
                Trade { category: "cash".into(), amount: 0.456 },
            ],
        };
        let preferred = HashMap::from([("stocks".to_string(), "VTI".to_string())]);
        assert_eq!(
            format_recommendation(&rec, &preferred),
            "SELL:\n bonds: 1000.00\nBUY:\n stocks (VTI): 999.50\n cash: 0.46\n"
        );
    }

    #[test]
    fn empty_recommendation_still_has_headers() {
        assert_eq!(format_recommendation(&Recommendation::default(), &HashMap::new()), "SELL:\nBUY:\n");
    }

    #[test]
    fn sweep_direction_follows_sign() {
        assert_eq!(format_sweep(-2500.0), "Deposit 2500.00 into checking");
        assert_eq!(format_sweep(125.5), "Withdraw 125.50 out of checking");
    }
}
