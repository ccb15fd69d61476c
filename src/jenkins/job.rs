//! Declarative job definition and idempotent sync.
//!
//! A [`JobDescriptor`] renders to the Jenkins config.xml the control plane
//! stores. Syncing is an existence-check-then-branch upsert: this is racy
//! against a concurrent writer on the same job name, which is why only one
//! pilot run may be active at a time (documented precondition).

use tracing::{info, warn};

use crate::error::ControlPlaneError;

use super::ControlPlane;

/// A named job and the declarative config it should hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Job name, the stable key on the control plane.
    pub name: String,
    /// Git repository the job checks out.
    pub repo_url: String,
    /// Branch specifier (e.g. "*/master").
    pub branch_spec: String,
    /// Shell command the job runs.
    pub build_command: String,
}

impl JobDescriptor {
    /// Render the descriptor as Jenkins freestyle-project config.xml with
    /// a git SCM block and a single shell builder.
    pub fn config_xml(&self) -> String {
        format!(
            r#"<?xml version='1.1' encoding='UTF-8'?>
<project>
  <description>Job for {repo}</description>
  <scm class="hudson.plugins.git.GitSCM">
    <userRemoteConfigs>
      <hudson.plugins.git.UserRemoteConfig>
        <url>{repo}</url>
      </hudson.plugins.git.UserRemoteConfig>
    </userRemoteConfigs>
    <branches>
      <hudson.plugins.git.BranchSpec>
        <name>{branch}</name>
      </hudson.plugins.git.BranchSpec>
    </branches>
  </scm>
  <builders>
    <hudson.tasks.Shell>
      <command>{command}</command>
    </hudson.tasks.Shell>
  </builders>
</project>
"#,
            repo = self.repo_url,
            branch = self.branch_spec,
            command = self.build_command,
        )
    }
}

/// Which branch of the upsert ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// The job existed and was reconfigured.
    Updated,
    /// The job was created.
    Created,
}

/// Create or update the job so its stored config equals the descriptor.
///
/// Any failure reading the existing config is interpreted as "job absent"
/// and routed to create; a genuinely broken control plane then fails the
/// create with a typed error.
pub async fn sync_job(
    plane: &dyn ControlPlane,
    descriptor: &JobDescriptor,
) -> Result<SyncAction, ControlPlaneError> {
    let config_xml = descriptor.config_xml();

    match plane.job_config(&descriptor.name).await {
        Ok(_) => {
            info!(job = %descriptor.name, "Job exists, updating it");
            plane
                .reconfigure_job(&descriptor.name, &config_xml)
                .await?;
            Ok(SyncAction::Updated)
        }
        Err(e) => {
            if !matches!(e, ControlPlaneError::JobNotFound(_)) {
                warn!(job = %descriptor.name, error = %e, "Config read failed, treating job as absent");
            }
            info!(job = %descriptor.name, "Creating new job");
            plane.create_job(&descriptor.name, &config_xml).await?;
            Ok(SyncAction::Created)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jenkins::{BuildStatus, Identity, JobInfo};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Control plane holding job configs in memory.
    #[derive(Default)]
    struct FakePlane {
        jobs: Mutex<HashMap<String, String>>,
        creates: Mutex<u32>,
        updates: Mutex<u32>,
    }

    #[async_trait]
    impl ControlPlane for FakePlane {
        async fn who_am_i(&self) -> Result<Identity, ControlPlaneError> {
            Ok(Identity {
                full_name: "admin".to_string(),
            })
        }

        async fn job_config(&self, name: &str) -> Result<String, ControlPlaneError> {
            self.jobs
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| ControlPlaneError::JobNotFound(name.to_string()))
        }

        async fn create_job(&self, name: &str, config_xml: &str) -> Result<(), ControlPlaneError> {
            *self.creates.lock().unwrap() += 1;
            self.jobs
                .lock()
                .unwrap()
                .insert(name.to_string(), config_xml.to_string());
            Ok(())
        }

        async fn reconfigure_job(
            &self,
            name: &str,
            config_xml: &str,
        ) -> Result<(), ControlPlaneError> {
            *self.updates.lock().unwrap() += 1;
            self.jobs
                .lock()
                .unwrap()
                .insert(name.to_string(), config_xml.to_string());
            Ok(())
        }

        async fn trigger_build(&self, _name: &str) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn job_info(&self, _name: &str) -> Result<JobInfo, ControlPlaneError> {
            Ok(JobInfo { last_build: None })
        }

        async fn build_status(
            &self,
            _name: &str,
            _number: u32,
        ) -> Result<BuildStatus, ControlPlaneError> {
            Ok(BuildStatus { building: false })
        }

        async fn console_output(
            &self,
            _name: &str,
            _number: u32,
        ) -> Result<String, ControlPlaneError> {
            Ok(String::new())
        }
    }

    fn descriptor() -> JobDescriptor {
        JobDescriptor {
            name: "arc_job".to_string(),
            repo_url: "https://github.com/arya2004/arc".to_string(),
            branch_spec: "*/master".to_string(),
            build_command: "dotnet test arc.sln".to_string(),
        }
    }

    #[test]
    fn test_config_xml_embeds_descriptor_fields() {
        let xml = descriptor().config_xml();
        assert!(xml.contains("<url>https://github.com/arya2004/arc</url>"));
        assert!(xml.contains("<name>*/master</name>"));
        assert!(xml.contains("<command>dotnet test arc.sln</command>"));
        assert!(xml.starts_with("<?xml version='1.1'"));
    }

    #[tokio::test]
    async fn test_sync_creates_absent_job() {
        let plane = FakePlane::default();
        let action = sync_job(&plane, &descriptor()).await.unwrap();

        assert_eq!(action, SyncAction::Created);
        assert_eq!(
            plane.jobs.lock().unwrap().get("arc_job"),
            Some(&descriptor().config_xml())
        );
    }

    #[tokio::test]
    async fn test_sync_twice_is_an_idempotent_upsert() {
        let plane = FakePlane::default();
        let desc = descriptor();

        let first = sync_job(&plane, &desc).await.unwrap();
        let stored_after_first = plane.jobs.lock().unwrap().get("arc_job").cloned();
        let second = sync_job(&plane, &desc).await.unwrap();
        let stored_after_second = plane.jobs.lock().unwrap().get("arc_job").cloned();

        assert_eq!(first, SyncAction::Created);
        assert_eq!(second, SyncAction::Updated);
        assert_eq!(stored_after_first, Some(desc.config_xml()));
        assert_eq!(stored_after_first, stored_after_second);
        assert_eq!(*plane.creates.lock().unwrap(), 1);
        assert_eq!(*plane.updates.lock().unwrap(), 1);
    }
}
