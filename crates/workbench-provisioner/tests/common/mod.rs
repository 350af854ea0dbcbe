#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::json;
use workbench_core::models::{
    ConfigParam, EnvTypeConfig, EnvironmentType, KeyValue, ProductRef, ProvisioningArtifactRef,
    ResolvedVars,
};
use workbench_core::{arn, Settings};
use workbench_provisioner::aws::{
    AttachedPolicy, ClientFactory, ConstraintDetail, IamApi, LaunchPath, ManagedPolicy, Page,
    PortfolioDetail, ProvisionRequest, ProvisionedProduct, RecordDetail, RecordOutput, RoleDetail,
    RoleTarget, ServiceCatalogApi,
};
use workbench_provisioner::collaborators::{
    DataEgressService, EnvTypeConfigService, EnvTypeService,
};
use workbench_provisioner::plugins::{Hook, LifecycleEvent, PluginBus, ProvisioningObserver};
use workbench_provisioner::step::Payload;
use workbench_provisioner::{BoxFuture, ProvisionerError, Services};

pub const HOME_ACCOUNT: &str = "111111111111";
pub const TARGET_ACCOUNT: &str = "222222222222";
pub const HOME_ROLE: &str = "arn:aws:iam::111111111111:role/EnvMgmt";
pub const TARGET_ROLE: &str = "arn:aws:iam::222222222222:role/XAccEnvMgmt";
pub const SAME_ACCOUNT_ROLE: &str = "arn:aws:iam::111111111111:role/ProjectEnvMgmt";
pub const PRODUCT_ID: &str = "prod-abc";
pub const ARTIFACT_ID: &str = "pa-123";
pub const PORTFOLIO_ID: &str = "port-1";
pub const ENV_TYPE_ID: &str = "prod-abc-pa-123";
pub const CONFIG_ID: &str = "small";
pub const LAUNCH_ROLE: &str = "SCLaunchRole";
pub const NOW: i64 = 1_700_000_000_000;

/// Calls in the order they were made, across every fake sharing the log.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls whose name (ignoring the account label) starts with `op`.
    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split_once(':').map(|(_, rest)| rest.starts_with(op)).unwrap_or(false))
            .count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ---------------------------------------------------------------------------
// Service Catalog
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CatalogState {
    pub launch_paths: Vec<LaunchPath>,
    /// Portfolios of the product, served `page_size` per page.
    pub portfolios: Vec<PortfolioDetail>,
    pub page_size: usize,
    pub principals: HashMap<String, Vec<String>>,
    pub constraints: Vec<ConstraintDetail>,
    pub constraint_parameters: HashMap<String, String>,
    /// Portfolios `describe_portfolio` can see in this account.
    pub visible_portfolios: Vec<String>,
    pub shared_with: Vec<String>,
    pub provision_requests: Vec<ProvisionRequest>,
    /// When set, `provision_product` fails with this message.
    pub provision_error: Option<String>,
    /// Statuses returned by successive `describe_provisioned_product` calls;
    /// the last one repeats.
    pub product_statuses: VecDeque<String>,
    pub record_statuses: VecDeque<String>,
    pub record_errors: Vec<String>,
    pub outputs: Vec<RecordOutput>,
    pub terminations: Vec<(String, String)>,
}

pub struct FakeServiceCatalog {
    pub account: String,
    pub log: CallLog,
    pub state: Mutex<CatalogState>,
}

impl FakeServiceCatalog {
    pub fn new(account: &str, log: CallLog) -> Self {
        Self {
            account: account.to_string(),
            log,
            state: Mutex::new(CatalogState {
                page_size: 100,
                ..Default::default()
            }),
        }
    }

    fn record(&self, op: String) {
        self.log.push(format!("{}:{op}", self.account));
    }

    fn next_status(queue: &mut VecDeque<String>, fallback: &str) -> String {
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_else(|| fallback.to_string())
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut CatalogState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn associations(&self, portfolio_id: &str) -> Vec<String> {
        self.with(|s| s.principals.get(portfolio_id).cloned().unwrap_or_default())
    }
}

pub fn launch_path(id: &str) -> LaunchPath {
    LaunchPath {
        id: id.to_string(),
        name: Some(format!("{id}-name")),
        constraint_summaries: Vec::new(),
        tags: Vec::new(),
    }
}

pub fn portfolio(id: &str) -> PortfolioDetail {
    PortfolioDetail {
        id: id.to_string(),
        display_name: None,
    }
}

impl ServiceCatalogApi for FakeServiceCatalog {
    fn list_launch_paths<'a>(
        &'a self,
        product_id: &'a str,
        _page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<LaunchPath>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("listLaunchPaths({product_id})"));
            Ok(Page::last(self.with(|s| s.launch_paths.clone())))
        })
    }

    fn list_portfolios_for_product<'a>(
        &'a self,
        product_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<PortfolioDetail>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("listPortfoliosForProduct({product_id})"));
            let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            Ok(self.with(|s| {
                let end = (start + s.page_size).min(s.portfolios.len());
                Page {
                    items: s.portfolios[start..end].to_vec(),
                    next_token: (end < s.portfolios.len()).then(|| end.to_string()),
                }
            }))
        })
    }

    fn list_principals_for_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        _page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<String>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("listPrincipalsForPortfolio({portfolio_id})"));
            Ok(Page::last(self.associations(portfolio_id)))
        })
    }

    fn list_constraints_for_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        _product_id: &'a str,
        _page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page<ConstraintDetail>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("listConstraintsForPortfolio({portfolio_id})"));
            Ok(Page::last(self.with(|s| s.constraints.clone())))
        })
    }

    fn describe_constraint<'a>(
        &'a self,
        constraint_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("describeConstraint({constraint_id})"));
            Ok(self.with(|s| s.constraint_parameters.get(constraint_id).cloned()))
        })
    }

    fn describe_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PortfolioDetail>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("describePortfolio({portfolio_id})"));
            Ok(self.with(|s| {
                s.visible_portfolios
                    .iter()
                    .any(|p| p == portfolio_id)
                    .then(|| portfolio(portfolio_id))
            }))
        })
    }

    fn create_portfolio_share<'a>(
        &'a self,
        portfolio_id: &'a str,
        account_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("createPortfolioShare({portfolio_id},{account_id})"));
            self.with(|s| s.shared_with.push(account_id.to_string()));
            Ok(())
        })
    }

    fn accept_portfolio_share<'a>(
        &'a self,
        portfolio_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("acceptPortfolioShare({portfolio_id})"));
            self.with(|s| {
                if !s.visible_portfolios.iter().any(|p| p == portfolio_id) {
                    s.visible_portfolios.push(portfolio_id.to_string());
                }
            });
            Ok(())
        })
    }

    fn associate_principal_with_portfolio<'a>(
        &'a self,
        portfolio_id: &'a str,
        principal_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("associatePrincipalWithPortfolio({portfolio_id},{principal_arn})"));
            self.with(|s| {
                let principals = s.principals.entry(portfolio_id.to_string()).or_default();
                if !principals.iter().any(|p| p == principal_arn) {
                    principals.push(principal_arn.to_string());
                }
            });
            Ok(())
        })
    }

    fn provision_product<'a>(
        &'a self,
        request: &'a ProvisionRequest,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("provisionProduct({})", request.provisioned_product_name));
            if let Some(message) = self.with(|s| s.provision_error.clone()) {
                return Err(ProvisionerError::Aws(message));
            }
            self.with(|s| s.provision_requests.push(request.clone()));
            Ok(RecordDetail {
                record_id: "rec-launch".into(),
                status: "CREATED".into(),
                provisioned_product_id: Some("pp-1".into()),
                ..Default::default()
            })
        })
    }

    fn terminate_provisioned_product<'a>(
        &'a self,
        provisioned_product_id: &'a str,
        terminate_token: &'a str,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("terminateProvisionedProduct({provisioned_product_id})"));
            self.with(|s| {
                s.terminations
                    .push((provisioned_product_id.to_string(), terminate_token.to_string()))
            });
            Ok(RecordDetail {
                record_id: "rec-terminate".into(),
                status: "CREATED".into(),
                provisioned_product_id: Some(provisioned_product_id.to_string()),
                ..Default::default()
            })
        })
    }

    fn describe_record<'a>(
        &'a self,
        record_id: &'a str,
    ) -> BoxFuture<'a, Result<RecordDetail, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("describeRecord({record_id})"));
            Ok(self.with(|s| RecordDetail {
                record_id: record_id.to_string(),
                status: Self::next_status(&mut s.record_statuses, "SUCCEEDED"),
                provisioned_product_id: Some("pp-1".into()),
                record_errors: s.record_errors.clone(),
                outputs: s.outputs.clone(),
            }))
        })
    }

    fn describe_provisioned_product<'a>(
        &'a self,
        provisioned_product_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ProvisionedProduct>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("describeProvisionedProduct({provisioned_product_id})"));
            Ok(self.with(|s| {
                Some(ProvisionedProduct {
                    id: provisioned_product_id.to_string(),
                    status: Self::next_status(&mut s.product_statuses, "AVAILABLE"),
                    status_message: Some("stack status".into()),
                    last_record_id: Some("rec-launch".into()),
                    ..Default::default()
                })
            }))
        })
    }
}

// ---------------------------------------------------------------------------
// IAM
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct IamState {
    pub roles: HashMap<String, RoleDetail>,
    pub inline: HashMap<String, BTreeMap<String, String>>,
    pub attached: HashMap<String, Vec<String>>,
    pub managed: HashMap<String, ManagedPolicy>,
}

pub struct FakeIam {
    pub account: String,
    pub log: CallLog,
    pub state: Mutex<IamState>,
}

impl FakeIam {
    pub fn new(account: &str, log: CallLog) -> Self {
        Self {
            account: account.to_string(),
            log,
            state: Mutex::new(IamState::default()),
        }
    }

    fn record(&self, op: String) {
        self.log.push(format!("{}:{op}", self.account));
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut IamState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_role(&self, name: &str, trust: &str) {
        let role = RoleDetail {
            name: name.to_string(),
            path: "/".to_string(),
            arn: arn::build_role_arn(&self.account, "/", name),
            assume_role_policy_document: trust.to_string(),
            description: None,
            max_session_duration: None,
            permissions_boundary: None,
            tags: Vec::new(),
        };
        self.with(|s| s.roles.insert(name.to_string(), role));
    }
}

fn no_role(role_name: &str) -> ProvisionerError {
    ProvisionerError::NotFound {
        kind: "role",
        id: role_name.to_string(),
    }
}

impl IamApi for FakeIam {
    fn get_role<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<RoleDetail>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("getRole({role_name})"));
            Ok(self.with(|s| s.roles.get(role_name).cloned()))
        })
    }

    fn create_role<'a>(&'a self, role: &'a RoleDetail) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("createRole({})", role.name));
            Ok(self.with(|s| {
                if s.roles.contains_key(&role.name) {
                    false
                } else {
                    s.roles.insert(role.name.clone(), role.clone());
                    true
                }
            }))
        })
    }

    fn update_assume_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("updateAssumeRolePolicy({role_name})"));
            self.with(|s| {
                let role = s.roles.get_mut(role_name).ok_or_else(|| no_role(role_name))?;
                role.assume_role_policy_document = document.to_string();
                Ok(())
            })
        })
    }

    fn delete_role<'a>(&'a self, role_name: &'a str) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("deleteRole({role_name})"));
            self.with(|s| {
                let has_policies = s.inline.get(role_name).is_some_and(|p| !p.is_empty())
                    || s.attached.get(role_name).is_some_and(|p| !p.is_empty());
                if has_policies {
                    return Err(ProvisionerError::Aws(format!(
                        "DeleteConflict: role {role_name} still has policies"
                    )));
                }
                Ok(s.roles.remove(role_name).is_some())
            })
        })
    }

    fn list_role_policies<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("listRolePolicies({role_name})"));
            Ok(self.with(|s| {
                s.inline
                    .get(role_name)
                    .map(|p| p.keys().cloned().collect())
                    .unwrap_or_default()
            }))
        })
    }

    fn get_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
    ) -> BoxFuture<'a, Result<String, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("getRolePolicy({role_name},{policy_name})"));
            self.with(|s| {
                s.inline
                    .get(role_name)
                    .and_then(|p| p.get(policy_name))
                    .cloned()
                    .ok_or_else(|| no_role(role_name))
            })
        })
    }

    fn put_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("putRolePolicy({role_name},{policy_name})"));
            self.with(|s| {
                s.inline
                    .entry(role_name.to_string())
                    .or_default()
                    .insert(policy_name.to_string(), document.to_string());
            });
            Ok(())
        })
    }

    fn delete_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("deleteRolePolicy({role_name},{policy_name})"));
            self.with(|s| {
                if let Some(policies) = s.inline.get_mut(role_name) {
                    policies.remove(policy_name);
                }
            });
            Ok(())
        })
    }

    fn list_attached_role_policies<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AttachedPolicy>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("listAttachedRolePolicies({role_name})"));
            Ok(self.with(|s| {
                s.attached
                    .get(role_name)
                    .map(|arns| {
                        arns.iter()
                            .map(|a| AttachedPolicy {
                                name: a.rsplit('/').next().unwrap_or_default().to_string(),
                                arn: a.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            }))
        })
    }

    fn attach_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("attachRolePolicy({role_name},{policy_arn})"));
            self.with(|s| {
                let attached = s.attached.entry(role_name.to_string()).or_default();
                if !attached.iter().any(|a| a == policy_arn) {
                    attached.push(policy_arn.to_string());
                }
            });
            Ok(())
        })
    }

    fn detach_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("detachRolePolicy({role_name},{policy_arn})"));
            self.with(|s| {
                if let Some(attached) = s.attached.get_mut(role_name) {
                    attached.retain(|a| a != policy_arn);
                }
            });
            Ok(())
        })
    }

    fn get_managed_policy<'a>(
        &'a self,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<Option<ManagedPolicy>, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("getPolicy({policy_arn})"));
            Ok(self.with(|s| s.managed.get(policy_arn).cloned()))
        })
    }

    fn create_managed_policy<'a>(
        &'a self,
        policy: &'a ManagedPolicy,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("createPolicy({})", policy.name));
            Ok(self.with(|s| {
                if s.managed.contains_key(&policy.arn) {
                    false
                } else {
                    s.managed.insert(policy.arn.clone(), policy.clone());
                    true
                }
            }))
        })
    }

    fn set_managed_policy_document<'a>(
        &'a self,
        policy_arn: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(format!("createPolicyVersion({policy_arn})"));
            self.with(|s| {
                let policy = s.managed.get_mut(policy_arn).ok_or_else(|| ProvisionerError::NotFound {
                    kind: "managed policy",
                    id: policy_arn.to_string(),
                })?;
                policy.document = document.to_string();
                Ok(())
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Client factory and collaborators
// ---------------------------------------------------------------------------

/// One fake Service Catalog and IAM per account, all sharing one call log.
pub struct FakeClients {
    pub log: CallLog,
    pub catalogs: HashMap<String, Arc<FakeServiceCatalog>>,
    pub iams: HashMap<String, Arc<FakeIam>>,
    pub assumed: Mutex<Vec<RoleTarget>>,
}

impl FakeClients {
    pub fn new(log: CallLog) -> Self {
        let mut catalogs = HashMap::new();
        let mut iams = HashMap::new();
        for account in [HOME_ACCOUNT, TARGET_ACCOUNT] {
            catalogs.insert(
                account.to_string(),
                Arc::new(FakeServiceCatalog::new(account, log.clone())),
            );
            iams.insert(account.to_string(), Arc::new(FakeIam::new(account, log.clone())));
        }
        Self {
            log,
            catalogs,
            iams,
            assumed: Mutex::new(Vec::new()),
        }
    }

    pub fn catalog(&self, account: &str) -> Arc<FakeServiceCatalog> {
        self.catalogs[account].clone()
    }

    pub fn iam_of(&self, account: &str) -> Arc<FakeIam> {
        self.iams[account].clone()
    }

    fn account_of(&self, target: &RoleTarget) -> Result<String, ProvisionerError> {
        self.assumed.lock().unwrap().push(target.clone());
        Ok(arn::account_id(&target.role_arn)?.to_string())
    }
}

impl ClientFactory for FakeClients {
    fn service_catalog<'a>(
        &'a self,
        target: &'a RoleTarget,
    ) -> BoxFuture<'a, Result<Arc<dyn ServiceCatalogApi>, ProvisionerError>> {
        Box::pin(async move {
            let account = self.account_of(target)?;
            Ok(self.catalog(&account) as Arc<dyn ServiceCatalogApi>)
        })
    }

    fn iam<'a>(
        &'a self,
        target: &'a RoleTarget,
    ) -> BoxFuture<'a, Result<Arc<dyn IamApi>, ProvisionerError>> {
        Box::pin(async move {
            let account = self.account_of(target)?;
            Ok(self.iam_of(&account) as Arc<dyn IamApi>)
        })
    }
}

pub struct FakeEnvTypes {
    pub config: EnvTypeConfig,
}

impl EnvTypeService for FakeEnvTypes {
    fn must_find<'a>(
        &'a self,
        env_type_id: &'a str,
    ) -> BoxFuture<'a, Result<EnvironmentType, ProvisionerError>> {
        Box::pin(async move {
            if env_type_id != ENV_TYPE_ID {
                return Err(ProvisionerError::NotFound {
                    kind: "environment type",
                    id: env_type_id.to_string(),
                });
            }
            Ok(EnvironmentType {
                id: ENV_TYPE_ID.into(),
                name: "Small workspace".into(),
                product: ProductRef {
                    product_id: PRODUCT_ID.into(),
                },
                provisioning_artifact: ProvisioningArtifactRef {
                    id: ARTIFACT_ID.into(),
                },
            })
        })
    }
}

impl EnvTypeConfigService for FakeEnvTypes {
    fn must_find<'a>(
        &'a self,
        env_type_id: &'a str,
        config_id: &'a str,
    ) -> BoxFuture<'a, Result<EnvTypeConfig, ProvisionerError>> {
        Box::pin(async move {
            if env_type_id != ENV_TYPE_ID || config_id != self.config.id {
                return Err(ProvisionerError::NotFound {
                    kind: "environment type config",
                    id: config_id.to_string(),
                });
            }
            Ok(self.config.clone())
        })
    }
}

#[derive(Default)]
pub struct FakeEgress {
    pub deleted: Mutex<Vec<String>>,
}

impl DataEgressService for FakeEgress {
    fn delete_main_account_egress_store_role<'a>(
        &'a self,
        env_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.deleted.lock().unwrap().push(env_id.to_string());
            Ok(())
        })
    }
}

/// Records every hook invocation; optionally contributes tags and vars or
/// fails a hook.
#[derive(Default)]
pub struct RecordingObserver {
    pub name: String,
    pub events: Mutex<Vec<(Hook, LifecycleEvent)>>,
    pub default_tags: Vec<KeyValue>,
    pub extra_vars: Vec<(String, String)>,
    pub fail_on: Option<Hook>,
}

impl RecordingObserver {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn hooks(&self) -> Vec<Hook> {
        self.events.lock().unwrap().iter().map(|(h, _)| *h).collect()
    }

    pub fn last_event(&self) -> Option<LifecycleEvent> {
        self.events.lock().unwrap().last().map(|(_, e)| e.clone())
    }

    fn observe(&self, hook: Hook, event: &LifecycleEvent) -> Result<(), ProvisionerError> {
        self.events.lock().unwrap().push((hook, event.clone()));
        if self.fail_on == Some(hook) {
            return Err(ProvisionerError::State(format!("{} rejected {}", self.name, hook.as_str())));
        }
        Ok(())
    }
}

impl ProvisioningObserver for RecordingObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_vars<'a>(
        &'a self,
        mut vars: ResolvedVars,
    ) -> BoxFuture<'a, Result<ResolvedVars, ProvisionerError>> {
        Box::pin(async move {
            for (k, v) in &self.extra_vars {
                vars.insert(k.clone(), v.clone())?;
            }
            Ok(vars)
        })
    }

    fn default_tags<'a>(
        &'a self,
        _vars: &'a ResolvedVars,
        mut tags: Vec<KeyValue>,
    ) -> BoxFuture<'a, Result<Vec<KeyValue>, ProvisionerError>> {
        Box::pin(async move {
            tags.extend(self.default_tags.iter().cloned());
            Ok(tags)
        })
    }

    fn on_env_provisioning_success<'a>(
        &'a self,
        event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move { self.observe(Hook::ProvisioningSuccess, event) })
    }

    fn on_env_provisioning_failure<'a>(
        &'a self,
        event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move { self.observe(Hook::ProvisioningFailure, event) })
    }

    fn on_env_termination_success<'a>(
        &'a self,
        event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move { self.observe(Hook::TerminationSuccess, event) })
    }

    fn on_env_termination_failure<'a>(
        &'a self,
        event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move { self.observe(Hook::TerminationFailure, event) })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub log: CallLog,
    pub clients: Arc<FakeClients>,
    pub env_types: Arc<FakeEnvTypes>,
    pub egress: Arc<FakeEgress>,
    pub observer: Arc<RecordingObserver>,
    pub settings: Settings,
}

pub fn default_config() -> EnvTypeConfig {
    EnvTypeConfig {
        id: CONFIG_ID.into(),
        params: vec![
            ConfigParam::new("Namespace", "${namespace}"),
            ConfigParam::new("CIDR", "${cidr}"),
        ],
        tags: vec![ConfigParam::new("Env", "${envId}")],
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_observer(RecordingObserver::named("recorder"))
    }

    pub fn with_observer(observer: RecordingObserver) -> Self {
        let log = CallLog::default();
        Self {
            clients: Arc::new(FakeClients::new(log.clone())),
            log,
            env_types: Arc::new(FakeEnvTypes {
                config: default_config(),
            }),
            egress: Arc::new(FakeEgress::default()),
            observer: Arc::new(observer),
            settings: Settings::new(HOME_ROLE, "us-east-1"),
        }
    }

    pub fn home(&self) -> Arc<FakeServiceCatalog> {
        self.clients.catalog(HOME_ACCOUNT)
    }

    pub fn target(&self) -> Arc<FakeServiceCatalog> {
        self.clients.catalog(TARGET_ACCOUNT)
    }

    pub fn services(&self) -> Services {
        Services {
            settings: self.settings.clone(),
            clients: self.clients.clone(),
            env_types: self.env_types.clone(),
            env_type_configs: self.env_types.clone(),
            data_egress: self.egress.clone(),
            plugins: PluginBus::new().with(self.observer.clone()),
        }
    }

    /// Home catalog with one launch path, one shared portfolio and a LAUNCH
    /// constraint; source IAM with the launch role.
    pub fn seed_home_catalog(&self) {
        self.home().with(|s| {
            s.launch_paths = vec![launch_path("lp-1")];
            s.portfolios = vec![portfolio(PORTFOLIO_ID)];
            s.principals
                .insert(PORTFOLIO_ID.into(), vec![HOME_ROLE.to_string()]);
            s.constraints = vec![ConstraintDetail {
                constraint_id: "cons-1".into(),
                constraint_type: "LAUNCH".into(),
            }];
            s.constraint_parameters.insert(
                "cons-1".into(),
                json!({ "LocalRoleName": LAUNCH_ROLE }).to_string(),
            );
            s.visible_portfolios = vec![PORTFOLIO_ID.into()];
        });
        self.clients
            .iam_of(HOME_ACCOUNT)
            .add_role(LAUNCH_ROLE, r#"{"Version":"2012-10-17","Statement":[]}"#);
    }

    /// Target catalog with the single launch path visible to the target role.
    pub fn seed_target_catalog(&self) {
        self.target().with(|s| s.launch_paths = vec![launch_path("lp-target")]);
    }
}

pub fn provision_payload(x_acc_role: Option<&str>) -> Payload {
    let mut value = json!({
        "envId": "env-1",
        "envTypeId": ENV_TYPE_ID,
        "envTypeConfigId": CONFIG_ID,
        "cidr": "10.0.0.0/16",
    });
    if let Some(role) = x_acc_role {
        value["xAccEnvMgmtRoleArn"] = json!(role);
        value["externalId"] = json!("ext-1");
    }
    Payload::from_value(value).unwrap()
}

pub fn terminate_payload(provisioned_product_id: &str, x_acc_role: Option<&str>) -> Payload {
    let mut value = json!({
        "envId": "env-1",
        "provisionedProductId": provisioned_product_id,
    });
    if let Some(role) = x_acc_role {
        value["xAccEnvMgmtRoleArn"] = json!(role);
        value["externalId"] = json!("ext-1");
    }
    Payload::from_value(value).unwrap()
}

pub fn resolved_vars(x_acc_role: Option<&str>) -> ResolvedVars {
    ResolvedVars {
        env_id: "env-1".into(),
        env_type_id: ENV_TYPE_ID.into(),
        env_type_config_id: CONFIG_ID.into(),
        namespace: format!("analysis-{NOW}"),
        x_acc_env_mgmt_role_arn: x_acc_role.map(String::from),
        external_id: x_acc_role.map(|_| "ext-1".to_string()),
        cidr: "10.0.0.0/16".into(),
        ..Default::default()
    }
}

/// Payload as it looks after read-environment-info and replication.
pub fn vars_payload(x_acc_role: Option<&str>) -> Payload {
    let mut payload = Payload::new();
    payload.set_key("resolvedVars", &resolved_vars(x_acc_role)).unwrap();
    payload.set_key("timestamp", &NOW).unwrap();
    payload.set_key("portfolioId", &PORTFOLIO_ID).unwrap();
    payload
}

pub fn ctx(payload: Payload) -> workbench_provisioner::StepContext {
    workbench_provisioner::StepContext {
        workflow_id: "wf-1".into(),
        payload,
        state: Payload::new(),
        now_ms: NOW,
    }
}
