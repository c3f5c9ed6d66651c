use crate::api::{ApiError, ResourceRegistry};
use crate::definition::DistributionSpec;
use log::{debug, warn};

/// Provision the distribution configuration. Same idempotent-by-name
/// policy as the infrastructure configuration.
pub async fn provision(
    registry: &impl ResourceRegistry,
    spec: &DistributionSpec,
) -> Result<String, ApiError> {
    if let Some(arn) = registry.find_distribution_configuration(&spec.name).await? {
        warn!("Distribution configuration with this name already exists! Reusing");
        return Ok(arn);
    }

    let arn = registry.create_distribution_configuration(spec).await?;
    debug!("{arn}");
    Ok(arn)
}
