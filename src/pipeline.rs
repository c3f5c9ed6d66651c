use crate::api::{ApiError, ResourceRegistry};
use log::{debug, warn};

/// Provision the image pipeline binding recipe, infrastructure
/// configuration and distribution configuration. Unlike the two
/// configurations there is no reuse path: an existing pipeline with the
/// same name is deleted and recreated, so the two are never live at once.
pub async fn provision(
    registry: &impl ResourceRegistry,
    name: &str,
    recipe_arn: &str,
    infrastructure_arn: &str,
    distribution_arn: &str,
) -> Result<String, ApiError> {
    if let Some(arn) = registry.find_pipeline(name).await? {
        warn!("Image pipeline with this name already exists! Recreating");
        registry.delete_pipeline(&arn).await?;
    }

    let arn = registry
        .create_pipeline(name, recipe_arn, infrastructure_arn, distribution_arn)
        .await?;
    debug!("{arn}");
    Ok(arn)
}

/// Trigger a build execution, returning the image build version
/// identifier for display.
pub async fn start(registry: &impl ResourceRegistry, arn: &str) -> Result<String, ApiError> {
    registry.start_pipeline(arn).await
}
