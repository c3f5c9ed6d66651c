use crate::definition::{DistributionSpec, InfrastructureSpec, RecipeSpec};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Error taxonomy for remote registry calls.
///
/// `NotFound`, `InvalidParameter` and `LimitExceeded` are recovered (or
/// deliberately tolerated) locally by the provisioners; everything else is
/// `Remote` and aborts the run immediately. Nothing here is retried beyond
/// the single documented recovery path per variant.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("remote call failed: {0}")]
    Remote(String),
}

/// Body of a component revision about to be created.
pub enum ComponentPayload {
    /// Document embedded directly in the create call.
    Inline(String),
    /// Document staged to object storage beforehand, referenced by URI.
    /// Works around the payload-size limit on direct inline creation.
    Uri(String),
}

pub struct NewComponent<'a> {
    pub name: &'a str,
    pub version: String,
    pub description: &'a str,
    pub platform: &'a str,
    pub payload: ComponentPayload,
    pub tags: HashMap<String, String>,
}

/// Next semantic version for a named, multi-revision resource kind
/// (components, recipes): one past the number of currently listed
/// revisions. Derived, never stored — deleting old revisions makes the
/// counter regress, which is accepted and documented behavior.
pub fn next_revision(existing: usize) -> String {
    format!("0.0.{}", existing + 1)
}

/// Component registry: get-by-id, name-filtered revision listing, and
/// revision creation (inline or by staged URI).
#[async_trait]
pub trait ComponentRegistry {
    async fn get_component(&self, arn: &str) -> Result<(), ApiError>;

    async fn count_component_versions(&self, name: &str) -> Result<usize, ApiError>;

    /// Returns the build version identifier of the created revision.
    async fn create_component(&self, component: NewComponent<'_>) -> Result<String, ApiError>;
}

/// Recipe, infrastructure configuration, distribution configuration and
/// pipeline registries. All keyed by a human name; identifiers are opaque.
#[async_trait]
pub trait ResourceRegistry {
    async fn count_recipe_versions(&self, name: &str) -> Result<usize, ApiError>;

    async fn create_recipe(
        &self,
        spec: &RecipeSpec,
        version: &str,
        component_arns: &[String],
    ) -> Result<String, ApiError>;

    async fn find_infrastructure_configuration(
        &self,
        name: &str,
    ) -> Result<Option<String>, ApiError>;

    async fn create_infrastructure_configuration(
        &self,
        spec: &InfrastructureSpec,
        instance_profile: &str,
    ) -> Result<String, ApiError>;

    async fn delete_infrastructure_configuration(&self, arn: &str) -> Result<(), ApiError>;

    async fn find_distribution_configuration(&self, name: &str)
        -> Result<Option<String>, ApiError>;

    async fn create_distribution_configuration(
        &self,
        spec: &DistributionSpec,
    ) -> Result<String, ApiError>;

    async fn delete_distribution_configuration(&self, arn: &str) -> Result<(), ApiError>;

    async fn find_pipeline(&self, name: &str) -> Result<Option<String>, ApiError>;

    async fn create_pipeline(
        &self,
        name: &str,
        recipe_arn: &str,
        infrastructure_arn: &str,
        distribution_arn: &str,
    ) -> Result<String, ApiError>;

    async fn delete_pipeline(&self, arn: &str) -> Result<(), ApiError>;

    /// Returns the image build version identifier of the triggered build.
    async fn start_pipeline(&self, arn: &str) -> Result<String, ApiError>;
}

/// Identity service operations used to provision the instance profile.
#[async_trait]
pub trait Identity {
    async fn instance_profile_exists(&self, name: &str) -> Result<bool, ApiError>;

    async fn create_instance_profile(&self, name: &str) -> Result<(), ApiError>;

    async fn create_role(&self, name: &str, trust_policy: &str) -> Result<(), ApiError>;

    /// Returns the created policy's identifier.
    async fn create_policy(&self, name: &str, document: &str) -> Result<String, ApiError>;

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ApiError>;

    async fn add_role_to_instance_profile(&self, profile: &str, role: &str)
        -> Result<(), ApiError>;

    async fn create_policy_version(
        &self,
        policy_arn: &str,
        document: &str,
    ) -> Result<(), ApiError>;

    async fn oldest_policy_version(&self, policy_arn: &str) -> Result<Option<String>, ApiError>;

    async fn delete_policy_version(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> Result<(), ApiError>;
}

/// Object staging for large inline component documents.
#[async_trait]
pub trait Staging {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), ApiError>;
}
