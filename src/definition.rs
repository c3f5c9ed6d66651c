use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use Error::*;

#[derive(Error, Debug)]
pub enum Error {
    #[error("read {path}: {source}")]
    ReadFile {
        source: std::io::Error,
        path: String,
    },

    #[error("deserialize: {0}")]
    Deserialize(#[from] serde_yaml::Error),

    #[error("{path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Parsed pipeline definition, the root input to one provisioning run.
/// Immutable once loaded; validation happens entirely at parse time so
/// schema violations surface before any remote call is made.
#[derive(Debug)]
pub struct PipelineDefinition {
    pub platform: String,
    pub components: Vec<ComponentDefinition>,
    pub image_recipe: RecipeSpec,
    pub instance_profile: InstanceProfileSpec,
    pub infrastructure_configuration: InfrastructureSpec,
    pub distribution_configuration: DistributionSpec,
    pub pipeline_name: String,
}

/// A named component entry from the `components` list.
#[derive(Debug)]
pub struct ComponentDefinition {
    pub name: String,
    pub source: ComponentSource,
}

#[derive(Debug)]
pub enum ComponentSource {
    /// Reference to an existing component build version by identifier.
    Reference { arn: String },

    /// Inline component document. `document` is the complete mapping under
    /// the component name (description, schemaVersion, phases, ...) and is
    /// serialized back to YAML when the revision is created.
    Inline {
        description: String,
        document: serde_yaml::Mapping,
    },
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSpec {
    pub name: String,
    pub description: String,
    pub parent_image: String,
    pub block_device_mappings: Option<Vec<BlockDeviceMapping>>,
    pub tags: Option<HashMap<String, String>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeviceMapping {
    pub device_name: Option<String>,
    pub virtual_name: Option<String>,
    pub no_device: Option<String>,
    pub ebs: Option<EbsSettings>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EbsSettings {
    pub encrypted: Option<bool>,
    pub delete_on_termination: Option<bool>,
    pub iops: Option<i32>,
    pub kms_key_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub volume_size: Option<i32>,
    pub volume_type: Option<String>,
    pub throughput: Option<i32>,
}

/// Instance profile settings. When `file` is present the profile (and its
/// role and policy) is provisioned from the policy document at that path;
/// otherwise `name` refers to a pre-existing profile and is used verbatim.
#[derive(Deserialize, Debug)]
pub struct InstanceProfileSpec {
    pub name: String,
    pub file: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    pub name: String,
    pub description: Option<String>,
    pub instance_types: Option<Vec<String>>,
    pub subnet_id: Option<String>,
    pub security_group_ids: Option<Vec<String>>,
    pub key_pair: Option<String>,
    pub terminate_instance_on_failure: Option<bool>,
    pub sns_topic_arn: Option<String>,
    pub resource_tags: Option<HashMap<String, String>>,
    pub tags: Option<HashMap<String, String>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSpec {
    pub name: String,
    pub description: Option<String>,
    pub distributions: Vec<DistributionTarget>,
    pub tags: Option<HashMap<String, String>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DistributionTarget {
    pub region: String,
    pub ami_distribution_configuration: Option<AmiDistribution>,
    pub license_configuration_arns: Option<Vec<String>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AmiDistribution {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kms_key_id: Option<String>,
    pub target_account_ids: Option<Vec<String>>,
    pub ami_tags: Option<HashMap<String, String>>,
}

impl PipelineDefinition {
    pub fn parse(yaml_string: &str) -> Result<Self, Error> {
        let parsed = serde_yaml::from_str::<raw::PipelineDefinition>(yaml_string)?;
        let components = parsed
            .components
            .iter()
            .enumerate()
            .map(|(index, entry)| component_from_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            platform: parsed.platform,
            components,
            image_recipe: parsed.image_recipe,
            instance_profile: parsed.instance_profile,
            infrastructure_configuration: parsed.infrastructure_configuration,
            distribution_configuration: parsed.distribution_configuration,
            pipeline_name: parsed.pipeline_name,
        })
    }

    pub fn parse_file(path: &str) -> Result<Self, Error> {
        Self::parse(&std::fs::read_to_string(path).map_err(|source| ReadFile {
            source,
            path: path.to_string(),
        })?)
    }
}

/// Each `components` entry is a single-key mapping of component name to
/// either an `arn` reference or an inline component document.
fn component_from_entry(
    index: usize,
    entry: &serde_yaml::Mapping,
) -> Result<ComponentDefinition, Error> {
    if entry.len() != 1 {
        return Err(Invalid {
            path: format!("components[{index}]"),
            reason: "expected a single-key `name: {...}` mapping".into(),
        });
    }
    let Some((key, value)) = entry.iter().next() else {
        return Err(Invalid {
            path: format!("components[{index}]"),
            reason: "empty mapping".into(),
        });
    };
    let name = key
        .as_str()
        .ok_or_else(|| Invalid {
            path: format!("components[{index}]"),
            reason: "component name must be a string".into(),
        })?
        .to_string();
    let body = value.as_mapping().ok_or_else(|| Invalid {
        path: format!("components[{index}].{name}"),
        reason: "expected a mapping".into(),
    })?;

    let source = match body.get("arn") {
        Some(arn) => {
            let arn = arn
                .as_str()
                .ok_or_else(|| Invalid {
                    path: format!("components[{index}].{name}.arn"),
                    reason: "must be a string".into(),
                })?
                .to_string();
            ComponentSource::Reference { arn }
        }
        None => {
            let description = body
                .get("description")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Invalid {
                    path: format!("components[{index}].{name}.description"),
                    reason: "missing or not a string".into(),
                })?
                .to_string();
            ComponentSource::Inline {
                description,
                document: body.clone(),
            }
        }
    };

    Ok(ComponentDefinition { name, source })
}

mod raw {
    use serde::Deserialize;

    #[derive(Deserialize)]
    pub struct PipelineDefinition {
        pub platform: String,
        pub components: Vec<serde_yaml::Mapping>,
        #[serde(rename = "image-recipe")]
        pub image_recipe: super::RecipeSpec,
        #[serde(rename = "instance-profile")]
        pub instance_profile: super::InstanceProfileSpec,
        #[serde(rename = "infrastructure-configuration")]
        pub infrastructure_configuration: super::InfrastructureSpec,
        #[serde(rename = "distribution-configuration")]
        pub distribution_configuration: super::DistributionSpec,
        #[serde(rename = "pipeline-name")]
        pub pipeline_name: String,
    }
}
