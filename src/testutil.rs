//! In-memory fake of the cloud registries for tests. Records every call
//! in order and serves scripted state, so tests can assert on exactly
//! which remote operations a provisioner performed.

use crate::api::{
    ApiError, ComponentPayload, ComponentRegistry, Identity, NewComponent, ResourceRegistry,
    Staging,
};
use crate::definition::{DistributionSpec, InfrastructureSpec, RecipeSpec};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct CreatedComponent {
    pub name: String,
    pub version: String,
    pub description: String,
    pub platform: String,
    pub inline: Option<String>,
    pub uri: Option<String>,
    pub tags: HashMap<String, String>,
}

pub struct CreatedRecipe {
    pub name: String,
    pub version: String,
    pub component_arns: Vec<String>,
    pub has_block_device_mappings: bool,
    pub has_tags: bool,
}

pub struct CreatedPipeline {
    pub name: String,
    pub recipe_arn: String,
    pub infrastructure_arn: String,
    pub distribution_arn: String,
}

#[derive(Default)]
pub struct FakeCloud {
    calls: Mutex<Vec<String>>,

    // Component registry state.
    known_component_arns: Mutex<Vec<String>>,
    quirk_component_arns: Mutex<Vec<String>>,
    component_versions: Mutex<HashMap<String, usize>>,
    pub created_components: Mutex<Vec<CreatedComponent>>,

    // Recipe / configuration / pipeline registry state.
    recipe_versions: Mutex<HashMap<String, usize>>,
    pub created_recipes: Mutex<Vec<CreatedRecipe>>,
    infrastructure: Mutex<HashMap<String, String>>,
    distribution: Mutex<HashMap<String, String>>,
    pipelines: Mutex<HashMap<String, String>>,
    pub created_pipelines: Mutex<Vec<CreatedPipeline>>,

    // Identity state.
    profiles: Mutex<Vec<String>>,
    policy_versions: Mutex<Vec<String>>,
    policy_version_limit: Option<usize>,

    // Staged objects as (bucket, key).
    pub staged: Mutex<Vec<(String, String)>>,
}

impl FakeCloud {
    /// An identifier that `get_component` resolves.
    pub fn known_component(self, arn: &str) -> Self {
        self.known_component_arns.lock().unwrap().push(arn.into());
        self
    }

    /// An identifier rejected as malformed until `/1` is appended.
    pub fn quirky_component(self, arn: &str) -> Self {
        self.quirk_component_arns.lock().unwrap().push(arn.into());
        self.known_component(&format!("{arn}/1"))
    }

    pub fn existing_component_versions(self, name: &str, count: usize) -> Self {
        self.component_versions
            .lock()
            .unwrap()
            .insert(name.into(), count);
        self
    }

    pub fn existing_recipe_versions(self, name: &str, count: usize) -> Self {
        self.recipe_versions
            .lock()
            .unwrap()
            .insert(name.into(), count);
        self
    }

    pub fn existing_infrastructure(self, name: &str, arn: &str) -> Self {
        self.infrastructure
            .lock()
            .unwrap()
            .insert(name.into(), arn.into());
        self
    }

    pub fn existing_distribution(self, name: &str, arn: &str) -> Self {
        self.distribution
            .lock()
            .unwrap()
            .insert(name.into(), arn.into());
        self
    }

    pub fn existing_pipeline(self, name: &str, arn: &str) -> Self {
        self.pipelines
            .lock()
            .unwrap()
            .insert(name.into(), arn.into());
        self
    }

    pub fn existing_profile(self, name: &str) -> Self {
        self.profiles.lock().unwrap().push(name.into());
        self
    }

    /// Seed `count` policy versions (`v1`..`vN`, newest first) and an
    /// optional bounded-history limit.
    pub fn policy_version_history(mut self, count: usize, limit: Option<usize>) -> Self {
        let versions = (1..=count).map(|n| format!("v{n}")).collect();
        self.policy_versions = Mutex::new(versions);
        self.policy_version_limit = limit;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls for one operation name.
    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split_whitespace().next() == Some(operation))
            .count()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ComponentRegistry for FakeCloud {
    async fn get_component(&self, arn: &str) -> Result<(), ApiError> {
        self.log(format!("get_component {arn}"));
        if self
            .known_component_arns
            .lock()
            .unwrap()
            .iter()
            .any(|a| a == arn)
        {
            return Ok(());
        }
        if self
            .quirk_component_arns
            .lock()
            .unwrap()
            .iter()
            .any(|a| a == arn)
        {
            return Err(ApiError::InvalidParameter(
                "missing build version suffix".into(),
            ));
        }
        Err(ApiError::NotFound)
    }

    async fn count_component_versions(&self, name: &str) -> Result<usize, ApiError> {
        self.log(format!("list_components {name}"));
        Ok(*self.component_versions.lock().unwrap().get(name).unwrap_or(&0))
    }

    async fn create_component(&self, component: NewComponent<'_>) -> Result<String, ApiError> {
        self.log(format!(
            "create_component {} {}",
            component.name, component.version
        ));
        let arn = format!(
            "arn:aws:imagebuilder:us-east-1:123456789012:component/{}/{}/1",
            component.name, component.version
        );
        let (inline, uri) = match component.payload {
            ComponentPayload::Inline(data) => (Some(data), None),
            ComponentPayload::Uri(uri) => (None, Some(uri)),
        };
        self.created_components.lock().unwrap().push(CreatedComponent {
            name: component.name.to_string(),
            version: component.version.clone(),
            description: component.description.to_string(),
            platform: component.platform.to_string(),
            inline,
            uri,
            tags: component.tags,
        });
        *self
            .component_versions
            .lock()
            .unwrap()
            .entry(component.name.to_string())
            .or_insert(0) += 1;
        Ok(arn)
    }
}

#[async_trait]
impl ResourceRegistry for FakeCloud {
    async fn count_recipe_versions(&self, name: &str) -> Result<usize, ApiError> {
        self.log(format!("list_image_recipes {name}"));
        Ok(*self.recipe_versions.lock().unwrap().get(name).unwrap_or(&0))
    }

    async fn create_recipe(
        &self,
        spec: &RecipeSpec,
        version: &str,
        component_arns: &[String],
    ) -> Result<String, ApiError> {
        self.log(format!("create_image_recipe {} {version}", spec.name));
        self.created_recipes.lock().unwrap().push(CreatedRecipe {
            name: spec.name.clone(),
            version: version.to_string(),
            component_arns: component_arns.to_vec(),
            has_block_device_mappings: spec.block_device_mappings.is_some(),
            has_tags: spec.tags.is_some(),
        });
        *self
            .recipe_versions
            .lock()
            .unwrap()
            .entry(spec.name.clone())
            .or_insert(0) += 1;
        Ok(format!(
            "arn:aws:imagebuilder:us-east-1:123456789012:image-recipe/{}/{version}",
            spec.name
        ))
    }

    async fn find_infrastructure_configuration(
        &self,
        name: &str,
    ) -> Result<Option<String>, ApiError> {
        self.log(format!("list_infrastructure_configurations {name}"));
        Ok(self.infrastructure.lock().unwrap().get(name).cloned())
    }

    async fn create_infrastructure_configuration(
        &self,
        spec: &InfrastructureSpec,
        instance_profile: &str,
    ) -> Result<String, ApiError> {
        self.log(format!(
            "create_infrastructure_configuration {} {instance_profile}",
            spec.name
        ));
        let arn = format!(
            "arn:aws:imagebuilder:us-east-1:123456789012:infrastructure-configuration/{}",
            spec.name
        );
        self.infrastructure
            .lock()
            .unwrap()
            .insert(spec.name.clone(), arn.clone());
        Ok(arn)
    }

    async fn delete_infrastructure_configuration(&self, arn: &str) -> Result<(), ApiError> {
        self.log(format!("delete_infrastructure_configuration {arn}"));
        self.infrastructure.lock().unwrap().retain(|_, a| a != arn);
        Ok(())
    }

    async fn find_distribution_configuration(
        &self,
        name: &str,
    ) -> Result<Option<String>, ApiError> {
        self.log(format!("list_distribution_configurations {name}"));
        Ok(self.distribution.lock().unwrap().get(name).cloned())
    }

    async fn create_distribution_configuration(
        &self,
        spec: &DistributionSpec,
    ) -> Result<String, ApiError> {
        self.log(format!("create_distribution_configuration {}", spec.name));
        let arn = format!(
            "arn:aws:imagebuilder:us-east-1:123456789012:distribution-configuration/{}",
            spec.name
        );
        self.distribution
            .lock()
            .unwrap()
            .insert(spec.name.clone(), arn.clone());
        Ok(arn)
    }

    async fn delete_distribution_configuration(&self, arn: &str) -> Result<(), ApiError> {
        self.log(format!("delete_distribution_configuration {arn}"));
        self.distribution.lock().unwrap().retain(|_, a| a != arn);
        Ok(())
    }

    async fn find_pipeline(&self, name: &str) -> Result<Option<String>, ApiError> {
        self.log(format!("list_image_pipelines {name}"));
        Ok(self.pipelines.lock().unwrap().get(name).cloned())
    }

    async fn create_pipeline(
        &self,
        name: &str,
        recipe_arn: &str,
        infrastructure_arn: &str,
        distribution_arn: &str,
    ) -> Result<String, ApiError> {
        self.log(format!("create_pipeline {name}"));
        let serial = self.created_pipelines.lock().unwrap().len() + 1;
        let arn = format!(
            "arn:aws:imagebuilder:us-east-1:123456789012:image-pipeline/{name}/{serial}"
        );
        self.created_pipelines.lock().unwrap().push(CreatedPipeline {
            name: name.to_string(),
            recipe_arn: recipe_arn.to_string(),
            infrastructure_arn: infrastructure_arn.to_string(),
            distribution_arn: distribution_arn.to_string(),
        });
        self.pipelines
            .lock()
            .unwrap()
            .insert(name.to_string(), arn.clone());
        Ok(arn)
    }

    async fn delete_pipeline(&self, arn: &str) -> Result<(), ApiError> {
        self.log(format!("delete_pipeline {arn}"));
        self.pipelines.lock().unwrap().retain(|_, a| a != arn);
        Ok(())
    }

    async fn start_pipeline(&self, arn: &str) -> Result<String, ApiError> {
        self.log(format!("start_pipeline {arn}"));
        Ok(format!("{arn}/image/1"))
    }
}

#[async_trait]
impl Identity for FakeCloud {
    async fn instance_profile_exists(&self, name: &str) -> Result<bool, ApiError> {
        self.log(format!("get_instance_profile {name}"));
        Ok(self.profiles.lock().unwrap().iter().any(|p| p == name))
    }

    async fn create_instance_profile(&self, name: &str) -> Result<(), ApiError> {
        self.log(format!("create_instance_profile {name}"));
        self.profiles.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn create_role(&self, name: &str, _trust_policy: &str) -> Result<(), ApiError> {
        self.log(format!("create_role {name}"));
        Ok(())
    }

    async fn create_policy(&self, name: &str, _document: &str) -> Result<String, ApiError> {
        self.log(format!("create_policy {name}"));
        Ok(format!(
            "arn:aws:iam::123456789012:policy/imagebuilder/{name}"
        ))
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ApiError> {
        self.log(format!("attach_role_policy {role} {policy_arn}"));
        Ok(())
    }

    async fn add_role_to_instance_profile(
        &self,
        profile: &str,
        role: &str,
    ) -> Result<(), ApiError> {
        self.log(format!("add_role_to_instance_profile {profile} {role}"));
        Ok(())
    }

    async fn create_policy_version(
        &self,
        policy_arn: &str,
        _document: &str,
    ) -> Result<(), ApiError> {
        self.log(format!("create_policy_version {policy_arn}"));
        let mut versions = self.policy_versions.lock().unwrap();
        if let Some(limit) = self.policy_version_limit {
            if versions.len() >= limit {
                return Err(ApiError::LimitExceeded("policy version history full".into()));
            }
        }
        let next = format!("v{}", versions.len() + 1);
        versions.insert(0, next);
        Ok(())
    }

    async fn oldest_policy_version(&self, policy_arn: &str) -> Result<Option<String>, ApiError> {
        self.log(format!("list_policy_versions {policy_arn}"));
        Ok(self.policy_versions.lock().unwrap().last().cloned())
    }

    async fn delete_policy_version(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> Result<(), ApiError> {
        self.log(format!("delete_policy_version {policy_arn} {version_id}"));
        self.policy_versions
            .lock()
            .unwrap()
            .retain(|v| v != version_id);
        Ok(())
    }
}

#[async_trait]
impl Staging for FakeCloud {
    async fn put_object(&self, bucket: &str, key: &str, _body: Vec<u8>) -> Result<(), ApiError> {
        self.log(format!("put_object {bucket} {key}"));
        self.staged
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}
