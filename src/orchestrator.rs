use crate::api::{ApiError, ComponentRegistry, Identity, ResourceRegistry, Staging};
use crate::definition::PipelineDefinition;
use crate::{component, distribution, infra, pipeline, profile, recipe, teardown};
use log::info;
use thiserror::Error;

/// Options from the command line, separate from the parsed definition.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Bucket for staging large inline component documents.
    pub staging_bucket: Option<String>,
    /// Trigger a build immediately after the pipeline is created.
    pub start_pipeline: bool,
    /// Recreate non-versioned resources instead of reusing them.
    pub update: bool,
}

pub struct Outcome {
    pub pipeline_arn: String,
    /// Build version identifier of the triggered build, when requested.
    pub image_build_arn: Option<String>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("component resolution: {0}")]
    Component(#[from] component::Error),

    #[error("instance profile: {0}")]
    Profile(#[from] profile::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Walk the pipeline definition and provision every dependent resource in
/// order, threading each stage's identifier into the next. Strictly
/// sequential; no stage re-enters an earlier one.
pub async fn run<R>(
    registry: &R,
    identity: &impl Identity,
    staging: &impl Staging,
    options: &RunOptions,
    definition: &PipelineDefinition,
    account_id: &str,
) -> Result<Outcome, Error>
where
    R: ComponentRegistry + ResourceRegistry,
{
    if options.update {
        info!("Complete update requested! Deleting non-versioned pipeline resources");
        teardown::run(registry, definition, options.update).await?;
    }

    info!("Creating components");
    let component_arns = component::resolve(
        registry,
        staging,
        options.staging_bucket.as_deref(),
        &definition.platform,
        &definition.components,
    )
    .await?;

    let instance_profile = match &definition.instance_profile.file {
        Some(file) => {
            info!("Creating instance profile");
            profile::provision(
                identity,
                &definition.instance_profile.name,
                file,
                account_id,
                options.update,
            )
            .await?
        }
        None => definition.instance_profile.name.clone(),
    };

    info!("Creating image recipe");
    let recipe_arn = recipe::provision(registry, &definition.image_recipe, &component_arns).await?;

    info!("Creating infrastructure configuration");
    let infrastructure_arn = infra::provision(
        registry,
        &definition.infrastructure_configuration,
        &instance_profile,
    )
    .await?;

    info!("Creating distribution configuration");
    let distribution_arn =
        distribution::provision(registry, &definition.distribution_configuration).await?;

    info!("Creating pipeline");
    let pipeline_arn = pipeline::provision(
        registry,
        &definition.pipeline_name,
        &recipe_arn,
        &infrastructure_arn,
        &distribution_arn,
    )
    .await?;

    let image_build_arn = if options.start_pipeline {
        info!("Starting pipeline");
        Some(pipeline::start(registry, &pipeline_arn).await?)
    } else {
        None
    };

    Ok(Outcome {
        pipeline_arn,
        image_build_arn,
    })
}
