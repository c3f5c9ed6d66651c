use crate::api::{next_revision, ApiError, ResourceRegistry};
use crate::definition::RecipeSpec;
use log::debug;

/// Create a new image recipe revision from the ordered, resolved
/// components. Recipes are never reused by name; every run produces a
/// fresh revision with the next derived version.
pub async fn provision(
    registry: &impl ResourceRegistry,
    spec: &RecipeSpec,
    component_arns: &[String],
) -> Result<String, ApiError> {
    let existing = registry.count_recipe_versions(&spec.name).await?;
    let version = next_revision(existing);

    let arn = registry.create_recipe(spec, &version, component_arns).await?;
    debug!("{arn}");
    Ok(arn)
}
