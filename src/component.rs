use crate::api::{ApiError, ComponentPayload, ComponentRegistry, NewComponent, Staging};
use crate::definition::{ComponentDefinition, ComponentSource};
use chrono::Utc;
use log::{debug, error, info};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("serialize component document: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Resolve every component definition into a component build version
/// identifier, preserving definition order — the order defines execution
/// order on the built instance.
///
/// A referenced identifier that does not exist is reported and skipped;
/// the gap surfaces downstream when the recipe is created. All other
/// remote failures abort immediately.
pub async fn resolve(
    registry: &impl ComponentRegistry,
    staging: &impl Staging,
    bucket: Option<&str>,
    platform: &str,
    definitions: &[ComponentDefinition],
) -> Result<Vec<String>, Error> {
    let mut arns = Vec::with_capacity(definitions.len());

    for definition in definitions {
        match &definition.source {
            ComponentSource::Reference { arn } => {
                // Verify the component exists to prevent downstream issues.
                match registry.get_component(arn).await {
                    Ok(()) => arns.push(arn.clone()),
                    Err(ApiError::NotFound) => {
                        error!("the specified arn for {} is invalid!", definition.name);
                    }
                    // Some valid identifiers are rejected as malformed
                    // unless a build version suffix is appended.
                    // https://github.com/boto/boto3/issues/2224
                    Err(ApiError::InvalidParameter(_)) => {
                        let suffixed = format!("{arn}/1");
                        registry.get_component(&suffixed).await?;
                        arns.push(suffixed);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            ComponentSource::Inline {
                description,
                document,
            } => {
                let existing = registry.count_component_versions(&definition.name).await?;
                let version = crate::api::next_revision(existing);
                let body = serde_yaml::to_string(document)?;
                let created = Utc::now().format("%Y-%m-%dT%H-%M-%S%.6f").to_string();

                let payload = match bucket {
                    Some(bucket) => {
                        info!("Uploading component {} to S3", definition.name);
                        let key = format!("imagebuilder/{}_{}.yaml", definition.name, created);
                        staging.put_object(bucket, &key, body.into_bytes()).await?;
                        ComponentPayload::Uri(format!("s3://{bucket}/{key}"))
                    }
                    None => ComponentPayload::Inline(body),
                };

                let arn = registry
                    .create_component(NewComponent {
                        name: &definition.name,
                        version,
                        description,
                        platform,
                        payload,
                        tags: HashMap::from([
                            ("component-name".to_string(), definition.name.clone()),
                            ("created-at".to_string(), created),
                        ]),
                    })
                    .await?;
                arns.push(arn);
            }
        }
    }

    debug!("resolved components: {arns:?}");
    Ok(arns)
}
