//! Crate for interacting with the Azure DevOps REST API.
//!
//! This crate provides a typed client for the subset of Azure DevOps endpoints
//! the provisioner needs: projects and their creation operations, identities,
//! git repositories and refs, security access control entries, branch policies,
//! graph groups and work items. Requests are authenticated with a personal
//! access token sent as HTTP basic credentials.
//!
//! The [`DevOpsClient`] trait is the seam the orchestration code depends on.
//! [`AzureDevOpsClient`] is the HTTP implementation.

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

pub mod errors;
pub use errors::Error;

pub mod models;
pub use models::{
    CreatedResource, GitPush, GitPushResult, GitRef, GitRefUpdate, GitRefUpdateResult,
    GitRepository, GraphDescriptor, GraphGroup, GroupCreatePayload, Identity, ListResponse,
    OperationReference, OperationStatus, Project, ProjectCreatePayload, RefUpdateStatus,
    RepositoryCreatePayload, WorkItem, WorkItemComment, EMPTY_OBJECT_ID,
};

pub mod policy;
pub use policy::{PolicyConfiguration, PolicyScope, PolicySettings, PolicyTypeRef};

pub mod security;
pub use security::{AccessControlEntry, AccessControlEntryPayload, GIT_SECURITY_NAMESPACE};

pub mod work_item;
pub use work_item::{JsonPatchOperation, PatchOperation};

// Reference the tests module in the separate file
#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Default REST API version.
pub const DEFAULT_API_VERSION: &str = "7.1";

const DEFAULT_BASE_URL: &str = "https://dev.azure.com";
const DEFAULT_IDENTITY_URL: &str = "https://vssps.dev.azure.com";
const DEFAULT_RELEASE_URL: &str = "https://vsrm.dev.azure.com";

const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`AzureDevOpsClient`].
#[derive(Debug)]
pub struct ClientSettings {
    /// Name of the Azure DevOps organization.
    pub organization: String,

    /// Personal access token.
    pub pat: SecretString,

    /// The `api-version` query value sent with every request.
    pub api_version: String,

    /// Project that holds the request tickets. Comments are posted through it.
    pub management_project: String,

    /// Root of the core services (`https://dev.azure.com`).
    pub base_url: Url,

    /// Root of the identity and graph services (`https://vssps.dev.azure.com`).
    pub identity_url: Url,

    /// Root of the release management services (`https://vsrm.dev.azure.com`).
    pub release_url: Url,
}

impl ClientSettings {
    /// Creates settings pointing at the hosted Azure DevOps service.
    ///
    /// # Errors
    /// Returns `Error::Url` if one of the built-in service URLs cannot be parsed.
    pub fn new(
        organization: &str,
        pat: SecretString,
        management_project: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            organization: organization.to_string(),
            pat,
            api_version: DEFAULT_API_VERSION.to_string(),
            management_project: management_project.to_string(),
            base_url: Url::parse(DEFAULT_BASE_URL)?,
            identity_url: Url::parse(DEFAULT_IDENTITY_URL)?,
            release_url: Url::parse(DEFAULT_RELEASE_URL)?,
        })
    }
}

/// Operations against Azure DevOps used by the provisioner.
///
/// Every operation is fallible. Lookups that can legitimately find nothing
/// return `Ok(None)` instead of `Error::NotFound`.
#[async_trait]
pub trait DevOpsClient: Send + Sync {
    /// Name of the organization the client is bound to.
    fn organization(&self) -> &str;

    async fn list_projects(&self) -> Result<Vec<Project>, Error>;

    /// Requests creation of a project. The platform answers with an operation to poll.
    async fn create_project(
        &self,
        payload: &ProjectCreatePayload,
    ) -> Result<OperationReference, Error>;

    async fn get_operation_status(&self, operation_id: &str)
        -> Result<OperationReference, Error>;

    async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>, Error>;

    /// Finds the identity of `group` in `scope`, where the scope is a project
    /// name or the organization name.
    async fn get_identity(&self, scope: &str, group: &str) -> Result<Option<Identity>, Error>;

    async fn list_repositories(&self, project: &str) -> Result<Vec<GitRepository>, Error>;

    async fn create_repository(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<GitRepository, Error>;

    async fn push_initial_commit(
        &self,
        repository_id: &str,
        push: &GitPush,
    ) -> Result<GitPushResult, Error>;

    /// Lists the branch heads (`refs/heads/*`) of a repository.
    async fn list_refs(&self, project_id: &str, repository_id: &str)
        -> Result<Vec<GitRef>, Error>;

    async fn create_branch(
        &self,
        project_id: &str,
        repository_id: &str,
        update: &GitRefUpdate,
    ) -> Result<GitRefUpdateResult, Error>;

    async fn set_access_control_entry(
        &self,
        payload: &AccessControlEntryPayload,
    ) -> Result<(), Error>;

    /// Removes the `permissions` bits from the entry of `descriptor` at `token`.
    async fn remove_permission(
        &self,
        token: &str,
        descriptor: &str,
        permissions: u64,
    ) -> Result<(), Error>;

    async fn list_policy_configurations(
        &self,
        project: &str,
        policy_type_id: &str,
    ) -> Result<Vec<PolicyConfiguration>, Error>;

    async fn create_policy_configuration(
        &self,
        project: &str,
        configuration: &PolicyConfiguration,
    ) -> Result<PolicyConfiguration, Error>;

    async fn update_policy_configuration(
        &self,
        project: &str,
        configuration_id: u64,
        configuration: &PolicyConfiguration,
    ) -> Result<PolicyConfiguration, Error>;

    /// Resolves the graph scope descriptor of a project.
    async fn get_scope_descriptor(&self, project_id: &str) -> Result<String, Error>;

    async fn list_groups(&self, scope_descriptor: &str) -> Result<Vec<GraphGroup>, Error>;

    /// Creates a group in `scope_descriptor` that is a member of every group in `member_of`.
    async fn create_group(
        &self,
        scope_descriptor: &str,
        payload: &GroupCreatePayload,
        member_of: &[String],
    ) -> Result<GraphGroup, Error>;

    /// Creates and deletes a service endpoint so the platform materializes
    /// the project's endpoint administrator group.
    async fn trigger_endpoint_group_seed(
        &self,
        project_id: &str,
        project_name: &str,
    ) -> Result<(), Error>;

    /// Creates and deletes a deployment group so the platform materializes
    /// the project's deployment group administrator group.
    async fn trigger_deployment_group_seed(&self, project_id: &str) -> Result<(), Error>;

    /// Creates and deletes a release definition so the platform materializes
    /// the project's release administrator group.
    async fn trigger_release_group_seed(&self, project_id: &str) -> Result<(), Error>;

    async fn patch_work_item(
        &self,
        work_item_id: u64,
        operations: &[JsonPatchOperation],
    ) -> Result<WorkItem, Error>;

    async fn add_work_item_comment(
        &self,
        work_item_id: u64,
        text: &str,
    ) -> Result<WorkItemComment, Error>;
}

/// HTTP implementation of [`DevOpsClient`].
#[derive(Debug)]
pub struct AzureDevOpsClient {
    http: reqwest::Client,
    settings: ClientSettings,
}

impl AzureDevOpsClient {
    /// Creates a new client from connection settings.
    ///
    /// # Errors
    /// Returns `Error::Http` if the underlying HTTP client cannot be built.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use devops_client::{AzureDevOpsClient, ClientSettings, DevOpsClient};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let settings = ClientSettings::new("contoso", "my-pat".to_string().into(), "Management")?;
    /// let client = AzureDevOpsClient::new(settings)?;
    ///
    /// for project in client.list_projects().await? {
    ///     println!("{}", project.name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(settings: ClientSettings) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("azp-provisioner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(
            organization = settings.organization.as_str(),
            api_version = settings.api_version.as_str(),
            "Created Azure DevOps client"
        );

        Ok(Self { http, settings })
    }

    fn org_url(&self, segments: &[&str]) -> Result<Url, Error> {
        build_url(&self.settings.base_url, &self.settings.organization, segments)
    }

    fn identity_url(&self, segments: &[&str]) -> Result<Url, Error> {
        build_url(
            &self.settings.identity_url,
            &self.settings.organization,
            segments,
        )
    }

    fn release_url(&self, segments: &[&str]) -> Result<Url, Error> {
        build_url(
            &self.settings.release_url,
            &self.settings.organization,
            segments,
        )
    }

    /// Returns the preview variant of the configured api version.
    fn preview(&self, revision: u8) -> String {
        if self.settings.api_version.contains("-preview") {
            self.settings.api_version.clone()
        } else {
            format!("{}-preview.{}", self.settings.api_version, revision)
        }
    }

    fn request(&self, method: Method, url: Url, api_version: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .query(&[("api-version", api_version)])
            .basic_auth("", Some(self.settings.pat.expose_secret()))
            .header(header::ACCEPT, "application/json")
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, Error> {
        let response = request.send().await?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
        let response = self.execute(request).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = truncate(&body),
                "Failed to deserialize Azure DevOps response"
            );
            Error::from(e)
        })
    }

    /// Sends a list request, following the continuation token header until
    /// the last page, and returns the items of every page.
    async fn send_paged<T, F>(&self, build: F) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned + Send,
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = build();
            if let Some(token) = continuation.as_deref() {
                request = request.query(&[("continuationToken", token)]);
            }

            let response = self.execute(request).await?;
            continuation = response
                .headers()
                .get(CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            let body = response.text().await?;
            let page: ListResponse<T> = serde_json::from_str(&body)?;
            items.extend(page.value);

            if continuation.is_none() {
                break;
            }
        }

        Ok(items)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), Error> {
        self.execute(request).await.map(|_| ())
    }

    async fn post_json<B, T>(&self, url: Url, api_version: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, url, api_version).json(body);
        self.send_json(request).await
    }
}

#[async_trait]
impl DevOpsClient for AzureDevOpsClient {
    fn organization(&self) -> &str {
        &self.settings.organization
    }

    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<Vec<Project>, Error> {
        let url = self.org_url(&["_apis", "projects"])?;
        let projects: Vec<Project> = self
            .send_paged(|| {
                self.request(Method::GET, url.clone(), &self.settings.api_version)
                    .query(&[("$top", "1000")])
            })
            .await
            .inspect_err(|e| log_api_error("Failed to list projects", e))?;

        debug!(count = projects.len(), "Retrieved projects");
        Ok(projects)
    }

    #[instrument(skip(self, payload), fields(project = %payload.name))]
    async fn create_project(
        &self,
        payload: &ProjectCreatePayload,
    ) -> Result<OperationReference, Error> {
        let url = self.org_url(&["_apis", "projects"])?;
        let operation: OperationReference = self
            .post_json(url, &self.settings.api_version, payload)
            .await
            .inspect_err(|e| log_api_error("Failed to request project creation", e))?;

        info!(
            project = payload.name.as_str(),
            operation_id = operation.id.as_str(),
            status = %operation.status,
            "Project creation accepted"
        );
        Ok(operation)
    }

    #[instrument(skip(self))]
    async fn get_operation_status(
        &self,
        operation_id: &str,
    ) -> Result<OperationReference, Error> {
        let url = self.org_url(&["_apis", "operations", operation_id])?;
        let request = self.request(Method::GET, url, &self.settings.api_version);
        self.send_json(request)
            .await
            .inspect_err(|e| log_api_error("Failed to get operation status", e))
    }

    #[instrument(skip(self))]
    async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>, Error> {
        let url = self.org_url(&["_apis", "projects", name])?;
        let request = self.request(Method::GET, url, &self.settings.api_version);
        match self.send_json::<Project>(request).await {
            Ok(project) => Ok(Some(project)),
            Err(Error::NotFound) => {
                debug!(project = name, "Project not found");
                Ok(None)
            }
            Err(e) => {
                log_api_error("Failed to get project by name", &e);
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_identity(&self, scope: &str, group: &str) -> Result<Option<Identity>, Error> {
        let url = self.identity_url(&["_apis", "identities"])?;
        let filter = format!("[{}]\\{}", scope, group);
        let request = self
            .request(Method::GET, url, &self.settings.api_version)
            .query(&[
                ("searchFilter", "General"),
                ("filterValue", filter.as_str()),
                ("queryMembership", "None"),
            ]);

        let list: ListResponse<Identity> = self
            .send_json(request)
            .await
            .inspect_err(|e| log_api_error("Failed to look up identity", e))?;

        Ok(list.value.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn list_repositories(&self, project: &str) -> Result<Vec<GitRepository>, Error> {
        let url = self.org_url(&[project, "_apis", "git", "repositories"])?;
        let request = self.request(Method::GET, url, &self.settings.api_version);
        let list: ListResponse<GitRepository> = self
            .send_json(request)
            .await
            .inspect_err(|e| log_api_error("Failed to list repositories", e))?;
        Ok(list.value)
    }

    #[instrument(skip(self))]
    async fn create_repository(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<GitRepository, Error> {
        let url = self.org_url(&[project_id, "_apis", "git", "repositories"])?;
        let payload = RepositoryCreatePayload::new(project_id, name);
        let repository: GitRepository = self
            .post_json(url, &self.settings.api_version, &payload)
            .await
            .inspect_err(|e| log_api_error("Failed to create repository", e))?;

        info!(
            repository = repository.name.as_str(),
            repository_id = repository.id.as_str(),
            "Created repository"
        );
        Ok(repository)
    }

    #[instrument(skip(self, push))]
    async fn push_initial_commit(
        &self,
        repository_id: &str,
        push: &GitPush,
    ) -> Result<GitPushResult, Error> {
        let url = self.org_url(&["_apis", "git", "repositories", repository_id, "pushes"])?;
        self.post_json(url, &self.settings.api_version, push)
            .await
            .inspect_err(|e| log_api_error("Failed to push initial commit", e))
    }

    #[instrument(skip(self))]
    async fn list_refs(
        &self,
        project_id: &str,
        repository_id: &str,
    ) -> Result<Vec<GitRef>, Error> {
        let url = self.org_url(&[
            project_id,
            "_apis",
            "git",
            "repositories",
            repository_id,
            "refs",
        ])?;
        let request = self
            .request(Method::GET, url, &self.settings.api_version)
            .query(&[("filter", "heads")]);
        let list: ListResponse<GitRef> = self
            .send_json(request)
            .await
            .inspect_err(|e| log_api_error("Failed to list refs", e))?;
        Ok(list.value)
    }

    #[instrument(skip(self, update), fields(branch = %update.name))]
    async fn create_branch(
        &self,
        project_id: &str,
        repository_id: &str,
        update: &GitRefUpdate,
    ) -> Result<GitRefUpdateResult, Error> {
        let url = self.org_url(&[
            project_id,
            "_apis",
            "git",
            "repositories",
            repository_id,
            "refs",
        ])?;
        let list: ListResponse<GitRefUpdateResult> = self
            .post_json(url, &self.settings.api_version, std::slice::from_ref(update))
            .await
            .inspect_err(|e| {
                if !e.is_conflict() {
                    log_api_error("Failed to create branch", e)
                }
            })?;

        list.value.into_iter().next().ok_or_else(|| {
            error!(branch = update.name.as_str(), "Ref update returned no results");
            Error::InvalidResponse
        })
    }

    #[instrument(skip(self, payload), fields(token = %payload.token))]
    async fn set_access_control_entry(
        &self,
        payload: &AccessControlEntryPayload,
    ) -> Result<(), Error> {
        let url = self.org_url(&["_apis", "AccessControlEntries", GIT_SECURITY_NAMESPACE])?;
        let request = self
            .request(Method::POST, url, &self.settings.api_version)
            .json(payload);
        self.send_empty(request)
            .await
            .inspect_err(|e| log_api_error("Failed to set access control entry", e))
    }

    #[instrument(skip(self))]
    async fn remove_permission(
        &self,
        token: &str,
        descriptor: &str,
        permissions: u64,
    ) -> Result<(), Error> {
        let bits = permissions.to_string();
        let url = self.org_url(&["_apis", "permissions", GIT_SECURITY_NAMESPACE, &bits])?;
        let request = self
            .request(Method::DELETE, url, &self.settings.api_version)
            .query(&[("descriptor", descriptor), ("token", token)]);
        self.send_empty(request)
            .await
            .inspect_err(|e| log_api_error("Failed to remove permission", e))
    }

    #[instrument(skip(self))]
    async fn list_policy_configurations(
        &self,
        project: &str,
        policy_type_id: &str,
    ) -> Result<Vec<PolicyConfiguration>, Error> {
        let url = self.org_url(&[project, "_apis", "policy", "configurations"])?;
        self.send_paged(|| {
            self.request(Method::GET, url.clone(), &self.settings.api_version)
                .query(&[("policyType", policy_type_id)])
        })
        .await
        .inspect_err(|e| log_api_error("Failed to list policy configurations", e))
    }

    #[instrument(skip(self, configuration), fields(policy_type = %configuration.policy_type.id))]
    async fn create_policy_configuration(
        &self,
        project: &str,
        configuration: &PolicyConfiguration,
    ) -> Result<PolicyConfiguration, Error> {
        let url = self.org_url(&[project, "_apis", "policy", "configurations"])?;
        self.post_json(url, &self.settings.api_version, configuration)
            .await
            .inspect_err(|e| log_api_error("Failed to create policy configuration", e))
    }

    #[instrument(skip(self, configuration), fields(policy_type = %configuration.policy_type.id))]
    async fn update_policy_configuration(
        &self,
        project: &str,
        configuration_id: u64,
        configuration: &PolicyConfiguration,
    ) -> Result<PolicyConfiguration, Error> {
        let id = configuration_id.to_string();
        let url = self.org_url(&[project, "_apis", "policy", "configurations", &id])?;
        let request = self
            .request(Method::PUT, url, &self.settings.api_version)
            .json(configuration);
        self.send_json(request)
            .await
            .inspect_err(|e| log_api_error("Failed to update policy configuration", e))
    }

    #[instrument(skip(self))]
    async fn get_scope_descriptor(&self, project_id: &str) -> Result<String, Error> {
        let url = self.identity_url(&["_apis", "graph", "descriptors", project_id])?;
        let request = self.request(Method::GET, url, &self.preview(1));
        let descriptor: GraphDescriptor = self
            .send_json(request)
            .await
            .inspect_err(|e| log_api_error("Failed to get scope descriptor", e))?;
        Ok(descriptor.value)
    }

    #[instrument(skip(self))]
    async fn list_groups(&self, scope_descriptor: &str) -> Result<Vec<GraphGroup>, Error> {
        let url = self.identity_url(&["_apis", "graph", "groups"])?;
        let groups: Vec<GraphGroup> = self
            .send_paged(|| {
                self.request(Method::GET, url.clone(), &self.preview(1))
                    .query(&[("scopeDescriptor", scope_descriptor)])
            })
            .await
            .inspect_err(|e| log_api_error("Failed to list groups", e))?;

        debug!(count = groups.len(), "Retrieved groups");
        Ok(groups)
    }

    #[instrument(skip(self, payload), fields(group = %payload.display_name))]
    async fn create_group(
        &self,
        scope_descriptor: &str,
        payload: &GroupCreatePayload,
        member_of: &[String],
    ) -> Result<GraphGroup, Error> {
        let url = self.identity_url(&["_apis", "graph", "groups"])?;
        let parents = member_of.join(",");
        let request = self
            .request(Method::POST, url, &self.preview(1))
            .query(&[
                ("scopeDescriptor", scope_descriptor),
                ("groupDescriptors", parents.as_str()),
            ])
            .json(payload);
        let group: GraphGroup = self
            .send_json(request)
            .await
            .inspect_err(|e| log_api_error("Failed to create group", e))?;

        info!(
            group = group.display_name.as_str(),
            parents = member_of.len(),
            "Created group"
        );
        Ok(group)
    }

    #[instrument(skip(self))]
    async fn trigger_endpoint_group_seed(
        &self,
        project_id: &str,
        project_name: &str,
    ) -> Result<(), Error> {
        let url = self.org_url(&["_apis", "serviceendpoint", "endpoints"])?;
        let body = serde_json::json!({
            "name": "azp-seed-endpoint",
            "type": "generic",
            "url": "https://localhost",
            "authorization": {
                "scheme": "UsernamePassword",
                "parameters": { "username": "", "password": "" }
            },
            "isShared": false,
            "serviceEndpointProjectReferences": [{
                "projectReference": { "id": project_id, "name": project_name },
                "name": "azp-seed-endpoint"
            }]
        });
        let created: CreatedResource = self
            .post_json(url, &self.settings.api_version, &body)
            .await
            .inspect_err(|e| log_api_error("Failed to create seed service endpoint", e))?;

        let id = created.id.to_string();
        let url = self.org_url(&["_apis", "serviceendpoint", "endpoints", &id])?;
        let request = self
            .request(Method::DELETE, url, &self.settings.api_version)
            .query(&[("projectIds", project_id)]);
        self.send_empty(request)
            .await
            .inspect_err(|e| log_api_error("Failed to delete seed service endpoint", e))
    }

    #[instrument(skip(self))]
    async fn trigger_deployment_group_seed(&self, project_id: &str) -> Result<(), Error> {
        let url = self.org_url(&[project_id, "_apis", "distributedtask", "deploymentgroups"])?;
        let body = serde_json::json!({
            "name": "azp-seed-deployment-group",
            "description": "Temporary group used to initialise project security groups"
        });
        let created: CreatedResource = self
            .post_json(url, &self.settings.api_version, &body)
            .await
            .inspect_err(|e| log_api_error("Failed to create seed deployment group", e))?;

        let id = created.id.to_string();
        let url = self.org_url(&[
            project_id,
            "_apis",
            "distributedtask",
            "deploymentgroups",
            &id,
        ])?;
        let request = self.request(Method::DELETE, url, &self.settings.api_version);
        self.send_empty(request)
            .await
            .inspect_err(|e| log_api_error("Failed to delete seed deployment group", e))
    }

    #[instrument(skip(self))]
    async fn trigger_release_group_seed(&self, project_id: &str) -> Result<(), Error> {
        let url = self.release_url(&[project_id, "_apis", "release", "definitions"])?;
        let body = serde_json::json!({
            "name": "azp-seed-release",
            "path": "\\",
            "environments": [{
                "name": "Stage 1",
                "rank": 1,
                "retentionPolicy": { "daysToKeep": 30, "releasesToKeep": 3, "retainBuild": true },
                "preDeployApprovals": {
                    "approvals": [{ "rank": 1, "isAutomated": true, "isNotificationOn": false }]
                },
                "postDeployApprovals": {
                    "approvals": [{ "rank": 1, "isAutomated": true, "isNotificationOn": false }]
                },
                "deployPhases": [{
                    "name": "Agent job",
                    "phaseType": "agentBasedDeployment",
                    "rank": 1,
                    "workflowTasks": []
                }]
            }]
        });
        let created: CreatedResource = self
            .post_json(url, &self.settings.api_version, &body)
            .await
            .inspect_err(|e| log_api_error("Failed to create seed release definition", e))?;

        let id = created.id.to_string();
        let url = self.release_url(&[project_id, "_apis", "release", "definitions", &id])?;
        let request = self.request(Method::DELETE, url, &self.settings.api_version);
        self.send_empty(request)
            .await
            .inspect_err(|e| log_api_error("Failed to delete seed release definition", e))
    }

    #[instrument(skip(self, operations), fields(operation_count = operations.len()))]
    async fn patch_work_item(
        &self,
        work_item_id: u64,
        operations: &[JsonPatchOperation],
    ) -> Result<WorkItem, Error> {
        let id = work_item_id.to_string();
        let url = self.org_url(&["_apis", "wit", "workitems", &id])?;
        let body = serde_json::to_vec(operations)?;
        let request = self
            .request(Method::PATCH, url, &self.settings.api_version)
            .header(header::CONTENT_TYPE, "application/json-patch+json")
            .body(body);
        self.send_json(request)
            .await
            .inspect_err(|e| log_api_error("Failed to patch work item", e))
    }

    #[instrument(skip(self, text))]
    async fn add_work_item_comment(
        &self,
        work_item_id: u64,
        text: &str,
    ) -> Result<WorkItemComment, Error> {
        let id = work_item_id.to_string();
        let url = self.org_url(&[
            &self.settings.management_project,
            "_apis",
            "wit",
            "workItems",
            &id,
            "comments",
        ])?;
        let body = serde_json::json!({ "text": text });
        self.post_json(url, &self.preview(4), &body)
            .await
            .inspect_err(|e| log_api_error("Failed to add work item comment", e))
    }
}

/// Appends `organization` and `segments` to the path of `base`.
///
/// Segments are percent-encoded individually, so a project name containing
/// a `/` or a space cannot change the shape of the path.
fn build_url(base: &Url, organization: &str, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Url(format!("'{}' cannot be used as a base URL", base)))?
        .pop_if_empty()
        .push(organization)
        .extend(segments);
    Ok(url)
}

async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(Error::NotFound),
        StatusCode::CONFLICT => Err(Error::Conflict(truncate(&body))),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!(status = status.as_u16(), "Azure DevOps rejected the credentials");
            Err(Error::AuthError(format!("status {}", status.as_u16())))
        }
        _ => Err(Error::Api {
            status: status.as_u16(),
            message: truncate(&body),
        }),
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn log_api_error(message: &str, e: &Error) {
    match e {
        Error::Api { status, message: body } => error!(
            status = status,
            error_message = body.as_str(),
            "{}. Received an error from Azure DevOps",
            message
        ),
        Error::AuthError(detail) => error!(
            error_message = detail.as_str(),
            "{}. The personal access token was rejected.",
            message
        ),
        Error::NotFound => debug!("{}. The resource does not exist.", message),
        _ => error!(error_message = e.to_string(), "{}", message),
    };
}
