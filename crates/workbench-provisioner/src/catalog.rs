//! Launch path, portfolio and launch-constraint resolution.
//!
//! A product is launchable by a principal through exactly one portfolio.
//! Zero means the product was never shared with the role; more than one
//! makes the launch path ambiguous. Both are configuration errors.

use crate::aws::{LaunchPath, PortfolioDetail, ServiceCatalogApi};
use crate::error::ProvisionerError;

const LAUNCH_CONSTRAINT: &str = "LAUNCH";

fn exactly_one<T>(
    mut items: Vec<T>,
    product_id: &str,
    role_arn: &str,
    kind: &'static str,
    label: impl Fn(&T) -> String,
) -> Result<T, ProvisionerError> {
    match items.len() {
        0 => Err(ProvisionerError::NotShared {
            product_id: product_id.to_string(),
            role_arn: role_arn.to_string(),
        }),
        1 => Ok(items.remove(0)),
        _ => Err(ProvisionerError::AmbiguousPortfolio {
            product_id: product_id.to_string(),
            role_arn: role_arn.to_string(),
            kind,
            candidates: items.iter().map(label).collect(),
        }),
    }
}

/// The single launch path of `product_id` visible to the client's role.
pub async fn get_launch_path(
    sc: &dyn ServiceCatalogApi,
    product_id: &str,
    role_arn: &str,
) -> Result<LaunchPath, ProvisionerError> {
    let mut paths = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = sc.list_launch_paths(product_id, token.as_deref()).await?;
        paths.extend(page.items);
        token = page.next_token;
        if token.is_none() {
            break;
        }
    }

    tracing::debug!(product_id = %product_id, count = paths.len(), "listed launch paths");
    exactly_one(paths, product_id, role_arn, "launch path", |p| {
        match &p.name {
            Some(name) => format!("{} ({name})", p.id),
            None => p.id.clone(),
        }
    })
}

async fn is_principal(
    sc: &dyn ServiceCatalogApi,
    portfolio_id: &str,
    role_arn: &str,
) -> Result<bool, ProvisionerError> {
    let mut token: Option<String> = None;
    loop {
        let page = sc
            .list_principals_for_portfolio(portfolio_id, token.as_deref())
            .await?;
        if page.items.iter().any(|arn| arn == role_arn) {
            return Ok(true);
        }
        token = page.next_token;
        if token.is_none() {
            return Ok(false);
        }
    }
}

/// The single portfolio that associates `product_id` with `role_arn`.
///
/// Every portfolio page is scanned before the exactly-one check so the
/// result never depends on page ordering.
pub async fn find_portfolio(
    sc: &dyn ServiceCatalogApi,
    product_id: &str,
    role_arn: &str,
) -> Result<PortfolioDetail, ProvisionerError> {
    let mut shared = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = sc
            .list_portfolios_for_product(product_id, token.as_deref())
            .await?;
        for portfolio in page.items {
            if is_principal(sc, &portfolio.id, role_arn).await? {
                shared.push(portfolio);
            }
        }
        token = page.next_token;
        if token.is_none() {
            break;
        }
    }

    exactly_one(shared, product_id, role_arn, "portfolio", |p| p.id.clone())
}

/// Name of the local IAM role named by the portfolio's `LAUNCH` constraint.
pub async fn find_launch_constraint_role_name(
    sc: &dyn ServiceCatalogApi,
    portfolio_id: &str,
    product_id: &str,
) -> Result<String, ProvisionerError> {
    let mut launch_constraints = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = sc
            .list_constraints_for_portfolio(portfolio_id, product_id, token.as_deref())
            .await?;
        launch_constraints.extend(
            page.items
                .into_iter()
                .filter(|c| c.constraint_type == LAUNCH_CONSTRAINT),
        );
        token = page.next_token;
        if token.is_none() {
            break;
        }
    }

    // Service Catalog itself refuses a second LAUNCH constraint.
    let constraint = launch_constraints.first().ok_or_else(|| {
        ProvisionerError::Configuration(format!(
            "no LAUNCH constraint for product {product_id} in portfolio {portfolio_id}"
        ))
    })?;

    let parameters = sc
        .describe_constraint(&constraint.constraint_id)
        .await?
        .ok_or_else(|| ProvisionerError::NotFound {
            kind: "constraint",
            id: constraint.constraint_id.clone(),
        })?;

    let parsed: serde_json::Value = serde_json::from_str(&parameters)?;
    parsed
        .get("LocalRoleName")
        .and_then(|v| v.as_str())
        .filter(|name| !name.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            ProvisionerError::Configuration(format!(
                "LAUNCH constraint {} of portfolio {portfolio_id} has no LocalRoleName",
                constraint.constraint_id
            ))
        })
}
