//! Backend that drives the `aws` CLI.
//!
//! Credentials, region and profile resolution are left to the CLI's own
//! environment handling; this backend only builds `aws iam ...` invocations
//! and parses their JSON output.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{CreatePolicyRequest, Policy, PolicyEntities};
use serde::Deserialize;
use std::process::{Command, Output};

/// Backend that executes real `aws iam` commands.
pub struct AwsCliBackend {
    /// Path to the aws executable
    aws_path: String,
    /// Named profile passed as `--profile`
    profile: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyEnvelope {
    policy: PolicyJson,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyJson {
    policy_name: String,
    arn: String,
    #[serde(default = "root_path")]
    path: String,
}

fn root_path() -> String {
    "/".to_string()
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct EntitiesJson {
    policy_groups: Vec<GroupJson>,
    policy_roles: Vec<RoleJson>,
    policy_users: Vec<UserJson>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupJson {
    group_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleJson {
    role_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserJson {
    user_name: String,
}

impl AwsCliBackend {
    /// Create a new AwsCliBackend.
    ///
    /// Returns an error if the AWS CLI is not installed.
    pub fn new() -> Result<Self> {
        let aws_path = find_aws()?;
        Ok(Self {
            aws_path,
            profile: None,
        })
    }

    /// Use a named CLI profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Run an `aws iam` subcommand.
    fn run_iam(&self, args: &[&str]) -> Result<Output> {
        let mut command = Command::new(&self.aws_path);
        command.arg("iam").args(args).args(["--output", "json"]);
        if let Some(profile) = &self.profile {
            command.args(["--profile", profile.as_str()]);
        }

        log::debug!("aws iam {}", args.first().copied().unwrap_or_default());
        command.output().map_err(|e| Error::CommandFailed {
            message: format!("failed to execute aws: {e}"),
            stderr: String::new(),
        })
    }

    /// Run an `aws iam` subcommand and check for success.
    fn run_iam_checked(&self, args: &[&str], name: Option<&str>) -> Result<Vec<u8>> {
        let output = self.run_iam(args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_aws_output(&stderr, name));
        }

        Ok(output.stdout)
    }
}

impl From<PolicyJson> for Policy {
    fn from(json: PolicyJson) -> Self {
        Self {
            name: json.policy_name,
            arn: json.arn,
            path: json.path,
        }
    }
}

impl Backend for AwsCliBackend {
    fn create_policy(&self, request: &CreatePolicyRequest) -> Result<Policy> {
        let stdout = self.run_iam_checked(
            &[
                "create-policy",
                "--policy-name",
                &request.name,
                "--path",
                &request.path,
                "--policy-document",
                &request.document,
            ],
            Some(&request.name),
        )?;
        let envelope: PolicyEnvelope = serde_json::from_slice(&stdout)?;
        Ok(envelope.policy.into())
    }

    fn get_policy(&self, arn: &str) -> Result<Policy> {
        let stdout = self.run_iam_checked(&["get-policy", "--policy-arn", arn], Some(arn))?;
        let envelope: PolicyEnvelope = serde_json::from_slice(&stdout)?;
        Ok(envelope.policy.into())
    }

    fn list_entities_for_policy(&self, arn: &str) -> Result<PolicyEntities> {
        let stdout = self.run_iam_checked(
            &["list-entities-for-policy", "--policy-arn", arn],
            Some(arn),
        )?;
        parse_entities(&stdout)
    }

    fn detach_group_policy(&self, arn: &str, group: &str) -> Result<()> {
        self.run_iam_checked(
            &["detach-group-policy", "--group-name", group, "--policy-arn", arn],
            Some(group),
        )?;
        Ok(())
    }

    fn detach_role_policy(&self, arn: &str, role: &str) -> Result<()> {
        self.run_iam_checked(
            &["detach-role-policy", "--role-name", role, "--policy-arn", arn],
            Some(role),
        )?;
        Ok(())
    }

    fn detach_user_policy(&self, arn: &str, user: &str) -> Result<()> {
        self.run_iam_checked(
            &["detach-user-policy", "--user-name", user, "--policy-arn", arn],
            Some(user),
        )?;
        Ok(())
    }

    fn delete_policy(&self, arn: &str) -> Result<()> {
        self.run_iam_checked(&["delete-policy", "--policy-arn", arn], Some(arn))?;
        Ok(())
    }
}

/// Parse `list-entities-for-policy` output.
fn parse_entities(stdout: &[u8]) -> Result<PolicyEntities> {
    let json: EntitiesJson = serde_json::from_slice(stdout)?;
    Ok(PolicyEntities {
        groups: json.policy_groups.into_iter().map(|g| g.group_name).collect(),
        roles: json.policy_roles.into_iter().map(|r| r.role_name).collect(),
        users: json.policy_users.into_iter().map(|u| u.user_name).collect(),
    })
}

/// Find the aws executable.
fn find_aws() -> Result<String> {
    let paths = ["/usr/local/bin/aws", "/opt/homebrew/bin/aws", "/usr/bin/aws"];

    for path in &paths {
        if std::path::Path::new(path).exists() {
            return Ok(path.to_string());
        }
    }

    let output = Command::new("which")
        .arg("aws")
        .output()
        .map_err(|_| Error::CliNotFound)?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Ok(path);
        }
    }

    Err(Error::CliNotFound)
}
