use crate::api::{ApiError, ResourceRegistry};
use crate::definition::InfrastructureSpec;
use log::{debug, warn};

/// Provision the infrastructure configuration, idempotent by name: an
/// existing configuration is reused as-is, otherwise the resolved instance
/// profile name is injected into the definition and a new one is created.
pub async fn provision(
    registry: &impl ResourceRegistry,
    spec: &InfrastructureSpec,
    instance_profile: &str,
) -> Result<String, ApiError> {
    if let Some(arn) = registry.find_infrastructure_configuration(&spec.name).await? {
        warn!("Infrastructure configuration with this name already exists! Reusing");
        return Ok(arn);
    }

    let arn = registry
        .create_infrastructure_configuration(spec, instance_profile)
        .await?;
    debug!("{arn}");
    Ok(arn)
}
