use aws_sdk_servicecatalog::types::{PrincipalType, ProvisioningParameter, Tag};
use aws_sdk_servicecatalog::Client;
use serde::{Deserialize, Serialize};
use workbench_core::models::KeyValue;

use crate::error::{aws_err, ProvisionerError};
use crate::BoxFuture;

/// One page of a paginated Service Catalog listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_token: None,
        }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchPath {
    pub id: String,
    pub name: Option<String>,
    pub constraint_summaries: Vec<ConstraintSummary>,
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConstraintSummary {
    #[serde(rename = "Type")]
    pub constraint_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortfolioDetail {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDetail {
    pub constraint_id: String,
    pub constraint_type: String,
}

/// Parameters of `servicecatalog:ProvisionProduct`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionRequest {
    pub product_id: String,
    pub provisioned_product_name: String,
    pub provisioning_artifact_id: String,
    pub path_id: String,
    pub provisioning_parameters: Vec<KeyValue>,
    pub tags: Vec<KeyValue>,
    /// Idempotency token. Replaying a request with the same token does not
    /// provision a second product.
    pub provision_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordDetail {
    pub record_id: String,
    pub status: String,
    pub provisioned_product_id: Option<String>,
    pub record_errors: Vec<String>,
    pub outputs: Vec<RecordOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordOutput {
    pub output_key: String,
    pub output_value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedProduct {
    pub id: String,
    pub name: Option<String>,
    pub status: String,
    pub status_message: Option<String>,
    pub arn: Option<String>,
    pub last_record_id: Option<String>,
}

/// The Service Catalog calls the provisioning steps issue.
///
/// Lookups that distinguish "not found" from failure return `Ok(None)`;
/// `list_launch_paths` returns an empty page when the product is unknown.
pub trait ServiceCatalogApi: Send + Sync {
    fn list_launch_paths<'a>(
        &'a self,
        product_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<LaunchPath>, ProvisionerError>>;

    fn list_portfolios_for_product<'a>(
        &'a self,
        product_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<PortfolioDetail>, ProvisionerError>>;

    /// Principal ARNs associated with a portfolio.
    fn list_principals_for_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<String>, ProvisionerError>>;

    fn list_constraints_for_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        product_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<ConstraintDetail>, ProvisionerError>>;

    /// The raw `ConstraintParameters` JSON of a constraint.
    fn describe_constraint<'a>(
        &'a self,
        constraint_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ProvisionerError>>;

    fn describe_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PortfolioDetail>, ProvisionerError>>;

    fn create_portfolio_share<'a>(
        &'a self,
        portfolio_id: &'a str,
        account_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn accept_portfolio_share<'a>(
        &'a self,
        portfolio_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    /// Idempotent: associating an already-associated principal succeeds.
    fn associate_principal_with_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        principal_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn provision_product<'a>(
        &'a self,
        request: &'a ProvisionRequest,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>>;

    fn terminate_provisioned_product<'a>(
        &'a self,
        provisioned_product_id: &'a str,
        terminate_token: &'a str,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>>;

    /// Describe a record, including all of its outputs.
    fn describe_record<'a>(
        &'a self,
        record_id: &'a str,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>>;

    fn describe_provisioned_product<'a>(
        &'a self,
        provisioned_product_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ProvisionedProduct>, ProvisionerError>>;
}

/// [`ServiceCatalogApi`] over the AWS SDK.
pub struct SdkServiceCatalog {
    client: Client,
}

impl SdkServiceCatalog {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Service Catalog signals the last page with an absent or empty token.
fn next_token(token: Option<&str>) -> Option<String> {
    token.filter(|t| !t.is_empty()).map(String::from)
}

fn record_detail(
    detail: Option<&aws_sdk_servicecatalog::types::RecordDetail>,
) -> Result<RecordDetail, ProvisionerError> {
    let detail =
        detail.ok_or_else(|| ProvisionerError::Aws("response carried no RecordDetail".into()))?;
    Ok(RecordDetail {
        record_id: detail.record_id().unwrap_or_default().to_string(),
        status: detail
            .status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        provisioned_product_id: detail.provisioned_product_id().map(String::from),
        record_errors: detail
            .record_errors()
            .iter()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.code().unwrap_or("Error"),
                    e.description().unwrap_or_default()
                )
            })
            .collect(),
        outputs: Vec::new(),
    })
}

impl ServiceCatalogApi for SdkServiceCatalog {
    fn list_launch_paths<'a>(
        &'a self,
        product_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<LaunchPath>, ProvisionerError>> {
        Box::pin(async move {
            let resp = match self
                .client
                .list_launch_paths()
                .product_id(product_id)
                .set_page_token(page_token.map(String::from))
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_resource_not_found_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(Page::empty());
                    }
                    return Err(aws_err("servicecatalog:ListLaunchPaths", &e));
                }
            };

            let items = resp
                .launch_path_summaries()
                .iter()
                .map(|p| LaunchPath {
                    id: p.id().unwrap_or_default().to_string(),
                    name: p.name().map(String::from),
                    constraint_summaries: p
                        .constraint_summaries()
                        .iter()
                        .map(|c| ConstraintSummary {
                            constraint_type: c.r#type().unwrap_or_default().to_string(),
                            description: c.description().map(String::from),
                        })
                        .collect(),
                    tags: p
                        .tags()
                        .iter()
                        .map(|t| KeyValue::new(t.key(), t.value()))
                        .collect(),
                })
                .collect();

            Ok(Page {
                items,
                next_token: next_token(resp.next_page_token()),
            })
        })
    }

    fn list_portfolios_for_product<'a>(
        &'a self,
        product_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<PortfolioDetail>, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .list_portfolios_for_product()
                .product_id(product_id)
                .set_page_token(page_token.map(String::from))
                .send()
                .await
                .map_err(|e| aws_err("servicecatalog:ListPortfoliosForProduct", &e))?;

            let items = resp
                .portfolio_details()
                .iter()
                .map(|p| PortfolioDetail {
                    id: p.id().unwrap_or_default().to_string(),
                    display_name: p.display_name().map(String::from),
                })
                .collect();

            Ok(Page {
                items,
                next_token: next_token(resp.next_page_token()),
            })
        })
    }

    fn list_principals_for_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<String>, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .list_principals_for_portfolio()
                .portfolio_id(portfolio_id)
                .set_page_token(page_token.map(String::from))
                .send()
                .await
                .map_err(|e| aws_err("servicecatalog:ListPrincipalsForPortfolio", &e))?;

            let items = resp
                .principals()
                .iter()
                .filter_map(|p| p.principal_arn().map(String::from))
                .collect();

            Ok(Page {
                items,
                next_token: next_token(resp.next_page_token()),
            })
        })
    }

    fn list_constraints_for_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        product_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<ConstraintDetail>, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .list_constraints_for_portfolio()
                .portfolio_id(portfolio_id)
                .product_id(product_id)
                .set_page_token(page_token.map(String::from))
                .send()
                .await
                .map_err(|e| aws_err("servicecatalog:ListConstraintsForPortfolio", &e))?;

            let items = resp
                .constraint_details()
                .iter()
                .map(|c| ConstraintDetail {
                    constraint_id: c.constraint_id().unwrap_or_default().to_string(),
                    constraint_type: c.r#type().unwrap_or_default().to_string(),
                })
                .collect();

            Ok(Page {
                items,
                next_token: next_token(resp.next_page_token()),
            })
        })
    }

    fn describe_constraint<'a>(
        &'a self,
        constraint_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ProvisionerError>> {
        Box::pin(async move {
            match self.client.describe_constraint().id(constraint_id).send().await {
                Ok(resp) => Ok(resp.constraint_parameters().map(String::from)),
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_resource_not_found_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(None);
                    }
                    Err(aws_err("servicecatalog:DescribeConstraint", &e))
                }
            }
        })
    }

    fn describe_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PortfolioDetail>, ProvisionerError>> {
        Box::pin(async move {
            match self.client.describe_portfolio().id(portfolio_id).send().await {
                Ok(resp) => Ok(resp.portfolio_detail().map(|p| PortfolioDetail {
                    id: p.id().unwrap_or(portfolio_id).to_string(),
                    display_name: p.display_name().map(String::from),
                })),
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_resource_not_found_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(None);
                    }
                    Err(aws_err("servicecatalog:DescribePortfolio", &e))
                }
            }
        })
    }

    fn create_portfolio_share<'a>(
        &'a self,
        portfolio_id: &'a str,
        account_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .create_portfolio_share()
                .portfolio_id(portfolio_id)
                .account_id(account_id)
                .send()
                .await
                .map_err(|e| aws_err("servicecatalog:CreatePortfolioShare", &e))?;
            Ok(())
        })
    }

    fn accept_portfolio_share<'a>(
        &'a self,
        portfolio_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .accept_portfolio_share()
                .portfolio_id(portfolio_id)
                .send()
                .await
                .map_err(|e| aws_err("servicecatalog:AcceptPortfolioShare", &e))?;
            Ok(())
        })
    }

    fn associate_principal_with_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        principal_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .associate_principal_with_portfolio()
                .portfolio_id(portfolio_id)
                .principal_arn(principal_arn)
                .principal_type(PrincipalType::Iam)
                .send()
                .await
                .map_err(|e| aws_err("servicecatalog:AssociatePrincipalWithPortfolio", &e))?;
            Ok(())
        })
    }

    fn provision_product<'a>(
        &'a self,
        request: &'a ProvisionRequest,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>> {
        Box::pin(async move {
            let params = request
                .provisioning_parameters
                .iter()
                .map(|p| {
                    ProvisioningParameter::builder()
                        .key(&p.key)
                        .value(&p.value)
                        .build()
                })
                .collect::<Vec<_>>();
            let tags = request
                .tags
                .iter()
                .map(|t| Tag::builder().key(&t.key).value(&t.value).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ProvisionerError::Configuration(format!("invalid tag: {e}")))?;

            let resp = self
                .client
                .provision_product()
                .product_id(&request.product_id)
                .provisioned_product_name(&request.provisioned_product_name)
                .provisioning_artifact_id(&request.provisioning_artifact_id)
                .path_id(&request.path_id)
                .set_provisioning_parameters(Some(params))
                .set_tags(Some(tags))
                .provision_token(&request.provision_token)
                .send()
                .await
                .map_err(|e| aws_err("servicecatalog:ProvisionProduct", &e))?;

            record_detail(resp.record_detail())
        })
    }

    fn terminate_provisioned_product<'a>(
        &'a self,
        provisioned_product_id: &'a str,
        terminate_token: &'a str,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .terminate_provisioned_product()
                .provisioned_product_id(provisioned_product_id)
                .terminate_token(terminate_token)
                .send()
                .await
                .map_err(|e| aws_err("servicecatalog:TerminateProvisionedProduct", &e))?;

            record_detail(resp.record_detail())
        })
    }

    fn describe_record<'a>(
        &'a self,
        record_id: &'a str,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>> {
        Box::pin(async move {
            let mut detail: Option<RecordDetail> = None;
            let mut outputs = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let resp = self
                    .client
                    .describe_record()
                    .id(record_id)
                    .set_page_token(page_token.take())
                    .send()
                    .await
                    .map_err(|e| aws_err("servicecatalog:DescribeRecord", &e))?;

                if detail.is_none() {
                    detail = Some(record_detail(resp.record_detail())?);
                }
                outputs.extend(resp.record_outputs().iter().map(|o| RecordOutput {
                    output_key: o.output_key().unwrap_or_default().to_string(),
                    output_value: o.output_value().unwrap_or_default().to_string(),
                    description: o.description().map(String::from),
                }));

                page_token = next_token(resp.next_page_token());
                if page_token.is_none() {
                    break;
                }
            }

            let mut detail = detail.unwrap_or_default();
            detail.outputs = outputs;
            Ok(detail)
        })
    }

    fn describe_provisioned_product<'a>(
        &'a self,
        provisioned_product_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ProvisionedProduct>, ProvisionerError>> {
        Box::pin(async move {
            let resp = match self
                .client
                .describe_provisioned_product()
                .id(provisioned_product_id)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_resource_not_found_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(None);
                    }
                    return Err(aws_err("servicecatalog:DescribeProvisionedProduct", &e));
                }
            };

            Ok(resp.provisioned_product_detail().map(|p| ProvisionedProduct {
                id: p.id().unwrap_or(provisioned_product_id).to_string(),
                name: p.name().map(String::from),
                status: p
                    .status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                status_message: p.status_message().map(String::from),
                arn: p.arn().map(String::from),
                last_record_id: p.last_record_id().map(String::from),
            }))
        })
    }
}
