use crate::api::{ApiError, ResourceRegistry};
use crate::definition::PipelineDefinition;
use log::warn;

/// Delete the non-versioned resources named by the definition so a rerun
/// recreates them from scratch. The pipeline is deleted unconditionally
/// when present; the infrastructure and distribution configurations only
/// in update mode. Components, recipes and instance profiles are
/// versioned or reused resources and are never deleted here.
pub async fn run(
    registry: &impl ResourceRegistry,
    definition: &PipelineDefinition,
    update: bool,
) -> Result<(), ApiError> {
    if let Some(arn) = registry.find_pipeline(&definition.pipeline_name).await? {
        warn!("Deleting pipeline");
        registry.delete_pipeline(&arn).await?;
    }

    if let Some(arn) = registry
        .find_infrastructure_configuration(&definition.infrastructure_configuration.name)
        .await?
    {
        if update {
            warn!("Deleting infrastructure configuration");
            registry.delete_infrastructure_configuration(&arn).await?;
        }
    }

    if let Some(arn) = registry
        .find_distribution_configuration(&definition.distribution_configuration.name)
        .await?
    {
        if update {
            warn!("Deleting distribution configuration");
            registry.delete_distribution_configuration(&arn).await?;
        }
    }

    Ok(())
}
