use crate::api::{ApiError, Identity};
use log::{debug, warn};
use thiserror::Error;

/// All identity resources live under this prefix and path.
const RESOURCE_PREFIX: &str = "imagebuilder-";

#[derive(Error, Debug)]
pub enum Error {
    #[error("read policy file {path}: {source}")]
    PolicyFile {
        source: std::io::Error,
        path: String,
    },

    #[error("policy file {path}: {source}")]
    PolicyParse {
        source: serde_json::Error,
        path: String,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Provision the instance profile the build instance runs as, returning
/// its resource name. Naming is deterministic (`imagebuilder-<name>`), so
/// the same input always maps to the same resource.
///
/// An existing profile is reused; in update mode its policy gets a new
/// default version instead, evicting the oldest version once if the
/// provider's bounded history is full. A fresh profile takes four
/// dependent creation calls (profile, role, policy, attachments); a
/// failure partway leaves the partial resources in place.
pub async fn provision(
    identity: &impl Identity,
    name: &str,
    policy_path: &str,
    account_id: &str,
    update: bool,
) -> Result<String, Error> {
    let resource_name = format!("{RESOURCE_PREFIX}{name}");

    // Syntax validation of the policy document happens here, before any
    // remote call.
    let policy_text = std::fs::read_to_string(policy_path).map_err(|source| Error::PolicyFile {
        source,
        path: policy_path.to_string(),
    })?;
    let policy: serde_json::Value =
        serde_json::from_str(&policy_text).map_err(|source| Error::PolicyParse {
            source,
            path: policy_path.to_string(),
        })?;
    let policy_document = policy.to_string();

    if identity.instance_profile_exists(&resource_name).await? {
        if update {
            warn!("Instance profile {resource_name} exists! Updating associated iam role policy");
            let policy_arn =
                format!("arn:aws:iam::{account_id}:policy/imagebuilder/{resource_name}");
            match identity
                .create_policy_version(&policy_arn, &policy_document)
                .await
            {
                Ok(()) => {}
                Err(ApiError::LimitExceeded(_)) => {
                    debug!("policy version limit encountered, dropping oldest version");
                    if let Some(version_id) = identity.oldest_policy_version(&policy_arn).await? {
                        identity
                            .delete_policy_version(&policy_arn, &version_id)
                            .await?;
                    }
                    identity
                        .create_policy_version(&policy_arn, &policy_document)
                        .await?;
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            warn!("Instance profile {resource_name} exists! Skipping creation");
        }
        return Ok(resource_name);
    }

    identity.create_instance_profile(&resource_name).await?;
    identity
        .create_role(&resource_name, &trust_policy())
        .await?;
    let policy_arn = identity
        .create_policy(&resource_name, &policy_document)
        .await?;
    identity
        .attach_role_policy(&resource_name, &policy_arn)
        .await?;
    identity
        .add_role_to_instance_profile(&resource_name, &resource_name)
        .await?;

    debug!("{resource_name}");
    Ok(resource_name)
}

/// Trust policy scoped to the build-service principal.
fn trust_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": {
                    "Service": "ec2.amazonaws.com"
                },
                "Action": "sts:AssumeRole"
            }
        ]
    })
    .to_string()
}
