//! Concrete implementations of the registry traits over the AWS SDK.
//! One client handle per remote service, constructed once from a shared
//! `SdkConfig` and passed into the provisioners as dependencies.

use crate::api::{
    ApiError, ComponentPayload, ComponentRegistry, Identity, NewComponent, ResourceRegistry,
    Staging,
};
use crate::definition::{
    BlockDeviceMapping, DistributionSpec, DistributionTarget, InfrastructureSpec, RecipeSpec,
};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_imagebuilder::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_imagebuilder::types::{
    AmiDistributionConfiguration, ComponentConfiguration, Distribution,
    EbsInstanceBlockDeviceSpecification, EbsVolumeType, Filter, InstanceBlockDeviceMapping,
    Ownership, Platform,
};
use aws_sdk_s3::primitives::ByteStream;

const RESOURCE_PATH: &str = "/imagebuilder/";

/// Map an SDK failure onto the local error taxonomy. Only the codes the
/// provisioners recover from are distinguished; everything else is a
/// fatal `Remote` error, surfaced with full context and never retried.
fn classify<E>(err: SdkError<E>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err.code() {
        Some("ResourceNotFoundException") | Some("NoSuchEntity") | Some("NoSuchEntityException") => {
            ApiError::NotFound
        }
        Some("InvalidParameterValueException") => {
            ApiError::InvalidParameter(err.message().unwrap_or_default().to_string())
        }
        Some("LimitExceeded") | Some("LimitExceededException") => {
            ApiError::LimitExceeded(err.message().unwrap_or_default().to_string())
        }
        _ => ApiError::Remote(DisplayErrorContext(&err).to_string()),
    }
}

fn name_filter(name: &str) -> Filter {
    Filter::builder().name("name").values(name).build()
}

fn missing_field(what: &str) -> ApiError {
    ApiError::Remote(format!("{what} missing from response"))
}

pub struct ImageBuilderService {
    client: aws_sdk_imagebuilder::Client,
}

impl ImageBuilderService {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_imagebuilder::Client::new(config),
        }
    }
}

#[async_trait]
impl ComponentRegistry for ImageBuilderService {
    async fn get_component(&self, arn: &str) -> Result<(), ApiError> {
        self.client
            .get_component()
            .component_build_version_arn(arn)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn count_component_versions(&self, name: &str) -> Result<usize, ApiError> {
        let output = self
            .client
            .list_components()
            .owner(Ownership::from("Self"))
            .filters(name_filter(name))
            .send()
            .await
            .map_err(classify)?;
        Ok(output.component_version_list().len())
    }

    async fn create_component(&self, component: NewComponent<'_>) -> Result<String, ApiError> {
        let mut request = self
            .client
            .create_component()
            .name(component.name)
            .semantic_version(component.version.as_str())
            .description(component.description)
            .platform(Platform::from(component.platform));
        for (key, value) in &component.tags {
            request = request.tags(key.clone(), value.clone());
        }
        request = match component.payload {
            ComponentPayload::Inline(data) => request.data(data),
            ComponentPayload::Uri(uri) => request.uri(uri),
        };

        let output = request.send().await.map_err(classify)?;
        output
            .component_build_version_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field("component build version arn"))
    }
}

#[async_trait]
impl ResourceRegistry for ImageBuilderService {
    async fn count_recipe_versions(&self, name: &str) -> Result<usize, ApiError> {
        let output = self
            .client
            .list_image_recipes()
            .owner(Ownership::from("Self"))
            .filters(name_filter(name))
            .send()
            .await
            .map_err(classify)?;
        Ok(output.image_recipe_summary_list().len())
    }

    async fn create_recipe(
        &self,
        spec: &RecipeSpec,
        version: &str,
        component_arns: &[String],
    ) -> Result<String, ApiError> {
        let mut request = self
            .client
            .create_image_recipe()
            .name(spec.name.as_str())
            .description(spec.description.as_str())
            .semantic_version(version)
            .parent_image(spec.parent_image.as_str());
        for arn in component_arns {
            request = request.components(
                ComponentConfiguration::builder()
                    .component_arn(arn.as_str())
                    .build()
                    .map_err(|err| ApiError::Remote(err.to_string()))?,
            );
        }
        if let Some(mappings) = &spec.block_device_mappings {
            for mapping in mappings {
                request = request.block_device_mappings(to_block_device_mapping(mapping));
            }
        }
        if let Some(tags) = &spec.tags {
            for (key, value) in tags {
                request = request.tags(key.clone(), value.clone());
            }
        }

        let output = request.send().await.map_err(classify)?;
        output
            .image_recipe_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field("image recipe arn"))
    }

    async fn find_infrastructure_configuration(
        &self,
        name: &str,
    ) -> Result<Option<String>, ApiError> {
        let output = self
            .client
            .list_infrastructure_configurations()
            .filters(name_filter(name))
            .send()
            .await
            .map_err(classify)?;
        Ok(output
            .infrastructure_configuration_summary_list()
            .first()
            .and_then(|summary| summary.arn())
            .map(str::to_string))
    }

    async fn create_infrastructure_configuration(
        &self,
        spec: &InfrastructureSpec,
        instance_profile: &str,
    ) -> Result<String, ApiError> {
        let mut request = self
            .client
            .create_infrastructure_configuration()
            .name(spec.name.as_str())
            .instance_profile_name(instance_profile);
        if let Some(description) = &spec.description {
            request = request.description(description.as_str());
        }
        if let Some(types) = &spec.instance_types {
            for instance_type in types {
                request = request.instance_types(instance_type.as_str());
            }
        }
        if let Some(subnet_id) = &spec.subnet_id {
            request = request.subnet_id(subnet_id.as_str());
        }
        if let Some(groups) = &spec.security_group_ids {
            for group in groups {
                request = request.security_group_ids(group.as_str());
            }
        }
        if let Some(key_pair) = &spec.key_pair {
            request = request.key_pair(key_pair.as_str());
        }
        if let Some(terminate) = spec.terminate_instance_on_failure {
            request = request.terminate_instance_on_failure(terminate);
        }
        if let Some(topic) = &spec.sns_topic_arn {
            request = request.sns_topic_arn(topic.as_str());
        }
        if let Some(tags) = &spec.resource_tags {
            for (key, value) in tags {
                request = request.resource_tags(key.clone(), value.clone());
            }
        }
        if let Some(tags) = &spec.tags {
            for (key, value) in tags {
                request = request.tags(key.clone(), value.clone());
            }
        }

        let output = request.send().await.map_err(classify)?;
        output
            .infrastructure_configuration_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field("infrastructure configuration arn"))
    }

    async fn delete_infrastructure_configuration(&self, arn: &str) -> Result<(), ApiError> {
        self.client
            .delete_infrastructure_configuration()
            .infrastructure_configuration_arn(arn)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn find_distribution_configuration(
        &self,
        name: &str,
    ) -> Result<Option<String>, ApiError> {
        let output = self
            .client
            .list_distribution_configurations()
            .filters(name_filter(name))
            .send()
            .await
            .map_err(classify)?;
        Ok(output
            .distribution_configuration_summary_list()
            .first()
            .and_then(|summary| summary.arn())
            .map(str::to_string))
    }

    async fn create_distribution_configuration(
        &self,
        spec: &DistributionSpec,
    ) -> Result<String, ApiError> {
        let mut request = self
            .client
            .create_distribution_configuration()
            .name(spec.name.as_str());
        if let Some(description) = &spec.description {
            request = request.description(description.as_str());
        }
        for target in &spec.distributions {
            request = request.distributions(to_distribution(target)?);
        }
        if let Some(tags) = &spec.tags {
            for (key, value) in tags {
                request = request.tags(key.clone(), value.clone());
            }
        }

        let output = request.send().await.map_err(classify)?;
        output
            .distribution_configuration_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field("distribution configuration arn"))
    }

    async fn delete_distribution_configuration(&self, arn: &str) -> Result<(), ApiError> {
        self.client
            .delete_distribution_configuration()
            .distribution_configuration_arn(arn)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn find_pipeline(&self, name: &str) -> Result<Option<String>, ApiError> {
        let output = self
            .client
            .list_image_pipelines()
            .filters(name_filter(name))
            .send()
            .await
            .map_err(classify)?;
        Ok(output
            .image_pipeline_list()
            .first()
            .and_then(|pipeline| pipeline.arn())
            .map(str::to_string))
    }

    async fn create_pipeline(
        &self,
        name: &str,
        recipe_arn: &str,
        infrastructure_arn: &str,
        distribution_arn: &str,
    ) -> Result<String, ApiError> {
        let output = self
            .client
            .create_image_pipeline()
            .name(name)
            .description(name)
            .image_recipe_arn(recipe_arn)
            .infrastructure_configuration_arn(infrastructure_arn)
            .distribution_configuration_arn(distribution_arn)
            .send()
            .await
            .map_err(classify)?;
        output
            .image_pipeline_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field("image pipeline arn"))
    }

    async fn delete_pipeline(&self, arn: &str) -> Result<(), ApiError> {
        self.client
            .delete_image_pipeline()
            .image_pipeline_arn(arn)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn start_pipeline(&self, arn: &str) -> Result<String, ApiError> {
        let output = self
            .client
            .start_image_pipeline_execution()
            .image_pipeline_arn(arn)
            .send()
            .await
            .map_err(classify)?;
        output
            .image_build_version_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field("image build version arn"))
    }
}

fn to_block_device_mapping(mapping: &BlockDeviceMapping) -> InstanceBlockDeviceMapping {
    let mut builder = InstanceBlockDeviceMapping::builder();
    if let Some(device_name) = &mapping.device_name {
        builder = builder.device_name(device_name.as_str());
    }
    if let Some(virtual_name) = &mapping.virtual_name {
        builder = builder.virtual_name(virtual_name.as_str());
    }
    if let Some(no_device) = &mapping.no_device {
        builder = builder.no_device(no_device.as_str());
    }
    if let Some(ebs) = &mapping.ebs {
        let mut ebs_builder = EbsInstanceBlockDeviceSpecification::builder();
        if let Some(encrypted) = ebs.encrypted {
            ebs_builder = ebs_builder.encrypted(encrypted);
        }
        if let Some(delete_on_termination) = ebs.delete_on_termination {
            ebs_builder = ebs_builder.delete_on_termination(delete_on_termination);
        }
        if let Some(iops) = ebs.iops {
            ebs_builder = ebs_builder.iops(iops);
        }
        if let Some(kms_key_id) = &ebs.kms_key_id {
            ebs_builder = ebs_builder.kms_key_id(kms_key_id.as_str());
        }
        if let Some(snapshot_id) = &ebs.snapshot_id {
            ebs_builder = ebs_builder.snapshot_id(snapshot_id.as_str());
        }
        if let Some(volume_size) = ebs.volume_size {
            ebs_builder = ebs_builder.volume_size(volume_size);
        }
        if let Some(volume_type) = &ebs.volume_type {
            ebs_builder = ebs_builder.volume_type(EbsVolumeType::from(volume_type.as_str()));
        }
        if let Some(throughput) = ebs.throughput {
            ebs_builder = ebs_builder.throughput(throughput);
        }
        builder = builder.ebs(ebs_builder.build());
    }
    builder.build()
}

fn to_distribution(target: &DistributionTarget) -> Result<Distribution, ApiError> {
    let mut builder = Distribution::builder().region(target.region.as_str());
    if let Some(ami) = &target.ami_distribution_configuration {
        let mut ami_builder = AmiDistributionConfiguration::builder();
        if let Some(name) = &ami.name {
            ami_builder = ami_builder.name(name.as_str());
        }
        if let Some(description) = &ami.description {
            ami_builder = ami_builder.description(description.as_str());
        }
        if let Some(kms_key_id) = &ami.kms_key_id {
            ami_builder = ami_builder.kms_key_id(kms_key_id.as_str());
        }
        if let Some(account_ids) = &ami.target_account_ids {
            for account_id in account_ids {
                ami_builder = ami_builder.target_account_ids(account_id.as_str());
            }
        }
        if let Some(tags) = &ami.ami_tags {
            for (key, value) in tags {
                ami_builder = ami_builder.ami_tags(key.clone(), value.clone());
            }
        }
        builder = builder.ami_distribution_configuration(ami_builder.build());
    }
    if let Some(arns) = &target.license_configuration_arns {
        for arn in arns {
            builder = builder.license_configuration_arns(arn.as_str());
        }
    }
    builder.build().map_err(|err| ApiError::Remote(err.to_string()))
}

pub struct IdentityService {
    client: aws_sdk_iam::Client,
}

impl IdentityService {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_iam::Client::new(config),
        }
    }
}

#[async_trait]
impl Identity for IdentityService {
    async fn instance_profile_exists(&self, name: &str) -> Result<bool, ApiError> {
        match self
            .client
            .get_instance_profile()
            .instance_profile_name(name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => match classify(err) {
                ApiError::NotFound => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_instance_profile(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .create_instance_profile()
            .instance_profile_name(name)
            .path(RESOURCE_PATH)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn create_role(&self, name: &str, trust_policy: &str) -> Result<(), ApiError> {
        self.client
            .create_role()
            .path(RESOURCE_PATH)
            .role_name(name)
            .assume_role_policy_document(trust_policy)
            .description("Role for Image Builder")
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn create_policy(&self, name: &str, document: &str) -> Result<String, ApiError> {
        let output = self
            .client
            .create_policy()
            .policy_name(name)
            .path(RESOURCE_PATH)
            .policy_document(document)
            .send()
            .await
            .map_err(classify)?;
        output
            .policy()
            .and_then(|policy| policy.arn())
            .map(str::to_string)
            .ok_or_else(|| missing_field("policy arn"))
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ApiError> {
        self.client
            .attach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn add_role_to_instance_profile(
        &self,
        profile: &str,
        role: &str,
    ) -> Result<(), ApiError> {
        self.client
            .add_role_to_instance_profile()
            .instance_profile_name(profile)
            .role_name(role)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn create_policy_version(
        &self,
        policy_arn: &str,
        document: &str,
    ) -> Result<(), ApiError> {
        self.client
            .create_policy_version()
            .policy_arn(policy_arn)
            .policy_document(document)
            .set_as_default(true)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn oldest_policy_version(&self, policy_arn: &str) -> Result<Option<String>, ApiError> {
        let output = self
            .client
            .list_policy_versions()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(classify)?;
        // Versions are listed newest first; the oldest is last.
        Ok(output
            .versions()
            .last()
            .and_then(|version| version.version_id())
            .map(str::to_string))
    }

    async fn delete_policy_version(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> Result<(), ApiError> {
        self.client
            .delete_policy_version()
            .policy_arn(policy_arn)
            .version_id(version_id)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

pub struct StagingService {
    client: aws_sdk_s3::Client,
}

impl StagingService {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl Staging for StagingService {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), ApiError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

pub struct SessionDetails {
    pub account: String,
    pub arn: String,
    pub aliases: Vec<String>,
}

impl SessionDetails {
    /// Second path segment of the caller identifier, e.g. the user name
    /// of `arn:aws:iam::123456789012:user/someone`.
    pub fn user(&self) -> &str {
        self.arn.split('/').nth(1).unwrap_or(&self.arn)
    }
}

/// Caller identity and account aliases, logged at startup.
pub async fn session_details(config: &SdkConfig) -> Result<SessionDetails, ApiError> {
    let sts = aws_sdk_sts::Client::new(config);
    let identity = sts.get_caller_identity().send().await.map_err(classify)?;

    let iam = aws_sdk_iam::Client::new(config);
    let aliases = iam.list_account_aliases().send().await.map_err(classify)?;

    Ok(SessionDetails {
        account: identity.account().unwrap_or_default().to_string(),
        arn: identity.arn().unwrap_or_default().to_string(),
        aliases: aliases.account_aliases().to_vec(),
    })
}
