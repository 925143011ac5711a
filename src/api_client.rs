use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Credentials;
use crate::domain::models::{AccountRecord, HoldingRecord};

const LOGIN_URL: &str = "https://api.monarchmoney.com/auth/login/";
const GRAPHQL_URL: &str = "https://api.monarchmoney.com/graphql";

const ACCOUNTS_QUERY: &str = r#"
query GetAccountsPage {
  hasAccounts
  accounts {
    id
    displayBalance
    displayName
    updatedAt
    isHidden
    type {
      name
      __typename
    }
    __typename
  }
}
"#;

const HOLDINGS_QUERY: &str = r#"
query Web_GetHoldings($input: PortfolioInput) {
  portfolio(input: $input) {
    aggregateHoldings {
      edges {
        node {
          id
          quantity
          basis
          totalValue
          lastSyncedAt
          holdings {
            account {
              id
              displayName
              __typename
            }
            id
            name
            ticker
            closingPrice
            closingPriceUpdatedAt
            quantity
            value
            __typename
          }
          __typename
        }
        __typename
      }
      __typename
    }
    __typename
  }
}
"#;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("login rejected: {0}")]
    Login(String),

    #[error("graphql error in {operation}: {message}")]
    GraphQl { operation: String, message: String },

    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Everything one run needs from the aggregation API. The raw payloads are
/// kept for `--debug` dumps.
#[derive(Debug, Clone, Default)]
pub struct FetchedData {
    pub accounts: Vec<AccountRecord>,
    pub holdings: Vec<HoldingRecord>,
    pub raw_accounts: Value,
    pub raw_holdings: Value,
}

#[async_trait]
pub trait FinanceProvider: Send + Sync {
    async fn fetch(&self) -> Result<FetchedData, ProviderError>;
}

pub struct MonarchProvider {
    client: Client,
    token: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
    detail: Option<String>,
}

impl MonarchProvider {
    pub async fn login(credentials: &Credentials) -> Result<Self, ProviderError> {
        let client = Client::new();
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("supports_mfa", "false"),
            ("trusted_device", "true"),
        ];
        let response = client.post(LOGIN_URL).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                operation: "login".to_string(),
                status,
                body,
            });
        }
        let parsed: LoginResponse = serde_json::from_str(&body)?;
        match parsed.token {
            Some(token) => {
                info!(user = %credentials.username, "Logged in to Monarch");
                Ok(Self { client, token })
            }
            None => Err(ProviderError::Login(
                parsed.detail.unwrap_or_else(|| "no token in response".to_string()),
            )),
        }
    }

    async fn execute(&self, operation: &str, query: &str, variables: Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(GRAPHQL_URL)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .json(&json!({
                "operationName": operation,
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                operation: operation.to_string(),
                status,
                body,
            });
        }
        let payload: Value = response.json().await?;
        check_graphql_errors(operation, &payload)?;
        debug!(operation, "GraphQL query completed");
        Ok(payload)
    }
}

#[async_trait]
impl FinanceProvider for MonarchProvider {
    async fn fetch(&self) -> Result<FetchedData, ProviderError> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(30);
        let raw_holdings = self
            .execute(
                "Web_GetHoldings",
                HOLDINGS_QUERY,
                json!({
                    "input": {
                        "startDate": start.format("%Y-%m-%d").to_string(),
                        "endDate": end.format("%Y-%m-%d").to_string(),
                    }
                }),
            )
            .await?;
        let raw_accounts = self
            .execute("GetAccountsPage", ACCOUNTS_QUERY, json!({}))
            .await?;

        let accounts = parse_accounts(&raw_accounts)?;
        let holdings = parse_holdings(&raw_holdings)?;
        info!(accounts = accounts.len(), holdings = holdings.len(), "Fetched Monarch data");
        Ok(FetchedData {
            accounts,
            holdings,
            raw_accounts,
            raw_holdings,
        })
    }
}

fn check_graphql_errors(operation: &str, payload: &Value) -> Result<(), ProviderError> {
    let errors = match payload.get("errors").and_then(|e| e.as_array()) {
        Some(errors) if !errors.is_empty() => errors,
        _ => return Ok(()),
    };
    let message = errors
        .iter()
        .map(|e| e.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error"))
        .collect::<Vec<_>>()
        .join("; ");
    Err(ProviderError::GraphQl {
        operation: operation.to_string(),
        message,
    })
}

// GetAccountsPage response shape
#[derive(Deserialize)]
struct AccountsEnvelope {
    data: AccountsData,
}

#[derive(Deserialize)]
struct AccountsData {
    #[serde(default)]
    accounts: Vec<ApiAccount>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAccount {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    display_balance: Option<f64>,
    #[serde(default, rename = "type")]
    account_type: Option<ApiAccountType>,
}

#[derive(Deserialize)]
struct ApiAccountType {
    #[serde(default)]
    name: Option<String>,
}

// Web_GetHoldings response shape
#[derive(Deserialize)]
struct HoldingsEnvelope {
    data: HoldingsData,
}

#[derive(Deserialize)]
struct HoldingsData {
    portfolio: ApiPortfolio,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPortfolio {
    aggregate_holdings: ApiConnection,
}

#[derive(Deserialize)]
struct ApiConnection {
    #[serde(default)]
    edges: Vec<ApiEdge>,
}

#[derive(Deserialize)]
struct ApiEdge {
    node: ApiAggregateHolding,
}

#[derive(Deserialize)]
struct ApiAggregateHolding {
    #[serde(default)]
    holdings: Vec<ApiHolding>,
}

#[derive(Deserialize)]
struct ApiHolding {
    account: ApiAccountRef,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Deserialize)]
struct ApiAccountRef {
    id: String,
}

pub fn parse_accounts(raw: &Value) -> Result<Vec<AccountRecord>, ProviderError> {
    let envelope: AccountsEnvelope = serde_json::from_value(raw.clone())?;
    Ok(envelope
        .data
        .accounts
        .into_iter()
        .map(|a| AccountRecord {
            name: a.display_name.unwrap_or_else(|| a.id.clone()),
            id: a.id,
            balance: a.display_balance.unwrap_or(0.0),
            kind: a
                .account_type
                .and_then(|t| t.name)
                .unwrap_or_default(),
        })
        .collect())
}

pub fn parse_holdings(raw: &Value) -> Result<Vec<HoldingRecord>, ProviderError> {
    let envelope: HoldingsEnvelope = serde_json::from_value(raw.clone())?;
    Ok(envelope
        .data
        .portfolio
        .aggregate_holdings
        .edges
        .into_iter()
        .flat_map(|edge| edge.node.holdings)
        .map(|h| HoldingRecord {
            account_id: h.account.id,
            symbol: h
                .ticker
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            value: h.value.unwrap_or(0.0),
        })
        .collect())
}

// Canned provider for tests
pub struct MockFinanceProvider {
    pub data: FetchedData,
}

impl MockFinanceProvider {
    pub fn new(accounts: Vec<AccountRecord>, holdings: Vec<HoldingRecord>) -> Self {
        Self {
            data: FetchedData {
                accounts,
                holdings,
                raw_accounts: Value::Null,
                raw_holdings: Value::Null,
            },
        }
    }
}

#[async_trait]
impl FinanceProvider for MockFinanceProvider {
    async fn fetch(&self) -> Result<FetchedData, ProviderError> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_accounts_with_missing_fields() {
        let raw = json!({
            "data": {
                "hasAccounts": true,
                "accounts": [
                    {"id": "1", "displayName": "Checking", "displayBalance": 1520.5, "type": {"name": "depository"}},
                    {"id": "2", "displayBalance": null}
                ]
            }
        });
        let accounts = parse_accounts(&raw).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].kind, "depository");
        assert_eq!(accounts[0].balance, 1520.5);
        assert_eq!(accounts[1].name, "2");
        assert_eq!(accounts[1].balance, 0.0);
        assert_eq!(accounts[1].kind, "");
    }

    #[test]
    fn flattens_aggregate_holdings() {
        let raw = json!({
            "data": {"portfolio": {"aggregateHoldings": {"edges": [
                {"node": {"id": "n1", "holdings": [
                    {"account": {"id": "10"}, "ticker": "VTI", "value": 100.0},
                    {"account": {"id": "11"}, "ticker": "VTI", "value": 50.0}
                ]}},
                {"node": {"id": "n2", "holdings": [
                    {"account": {"id": "10"}, "ticker": null, "value": 12.0},
                    {"account": {"id": "10"}, "ticker": " ", "value": 3.0}
                ]}}
            ]}}}
        });
        let holdings = parse_holdings(&raw).unwrap();
        assert_eq!(holdings.len(), 4);
        assert_eq!(holdings[1].account_id, "11");
        assert_eq!(holdings[2].symbol, None);
        assert_eq!(holdings[3].symbol, None);
    }

    #[test]
    fn graphql_errors_are_surfaced() {
        let payload = json!({"errors": [{"message": "not authorized"}], "data": null});
        let err = check_graphql_errors("GetAccountsPage", &payload).unwrap_err();
        assert!(err.to_string().contains("not authorized"));
        assert!(check_graphql_errors("x", &json!({"data": {}})).is_ok());
    }

    #[tokio::test]
    async fn mock_provider_returns_canned_records() {
        let provider = MockFinanceProvider::new(
            vec![AccountRecord { id: "1".into(), name: "a".into(), balance: 1.0, kind: String::new() }],
            vec![],
        );
        let data = provider.fetch().await.unwrap();
        assert_eq!(data.accounts.len(), 1);
        assert!(data.raw_accounts.is_null());
    }
}
