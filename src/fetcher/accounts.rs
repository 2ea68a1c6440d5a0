//! Account discovery
//!
//! Lists the accounts behind the token, keeps the Harvest ones and attaches
//! each account's company profile plus the subdomain needed for client links.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::harvest_http::HarvestHttpClient;
use super::FetcherResult;
use crate::Account;

/// Discover every Harvest account reachable with the client's token
///
/// Forecast (and unknown) accounts are dropped. Company data is fetched for
/// each remaining account; a failure there is logged and the account is kept
/// without company data, except for authentication failures, which abort.
pub async fn discover_accounts(client: &HarvestHttpClient) -> FetcherResult<Vec<Account>> {
    info!("Discovering Harvest accounts...");
    let response = client.get_accounts().await?;

    let mut accounts: Vec<Account> = response
        .accounts
        .into_iter()
        .filter(Account::is_harvest)
        .collect();

    info!("Found {} Harvest account(s)", accounts.len());

    for account in &mut accounts {
        info!("  - Account {}: {}", account.id, account.name);
        match client.get_company(account.id).await {
            Ok(company) => {
                account.subdomain = subdomain_from_company(&company);
                debug!(
                    account_id = account.id,
                    subdomain = account.subdomain.as_deref().unwrap_or("-"),
                    "Attached company data"
                );
                account.company_data = Some(company);
            }
            Err(e) if e.is_authentication() => return Err(e),
            Err(e) => {
                warn!(
                    "Could not fetch company data for account {}: {}. PDFs will be skipped",
                    account.id, e
                );
            }
        }
    }

    Ok(accounts)
}

/// Subdomain of an account, from its company profile
///
/// Uses the first label of `full_domain` (`acme.harvestapp.com` gives `acme`),
/// falling back to the host of `base_uri`.
pub fn subdomain_from_company(company: &Value) -> Option<String> {
    let from_full_domain = company
        .get("full_domain")
        .and_then(Value::as_str)
        .and_then(first_label);

    from_full_domain.or_else(|| {
        company
            .get("base_uri")
            .and_then(Value::as_str)
            .map(|uri| {
                let rest = uri.split_once("://").map_or(uri, |(_, rest)| rest);
                rest.split(['/', ':']).next().unwrap_or(rest)
            })
            .and_then(first_label)
    })
}

fn first_label(host: &str) -> Option<String> {
    host.trim()
        .split('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}
