//! CI/CD job run rows (`cicd_job_runs` and its child tables).

use sqlx::types::Json;
use sqlx::FromRow;
use velocity_core::event::{ChildRun, JobRunEvent, JobRunMetadata, JobRunParam};
use velocity_core::types::{DbId, Timestamp};

/// A row from the `cicd_job_runs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRunRow {
    pub id: DbId,
    pub cicd_job_id: String,
    pub integration_id: String,
    pub instance_name: Option<String>,
    pub job_name: String,
    pub job_normalized_full_name: Option<String>,
    pub project: Option<String>,
    pub job_run_number: i64,
    pub status: Option<String>,
    pub cicd_user_id: Option<String>,
    pub triage_rules: Vec<String>,
    pub metadata: Json<JobRunMetadata>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub duration_secs: Option<i64>,
}

/// A row from `cicd_job_run_stages` or `cicd_job_run_steps`.
#[derive(Debug, Clone, FromRow)]
pub struct ChildRunRow {
    pub job_run_id: DbId,
    pub name: String,
    pub result: Option<String>,
}

/// A row from `cicd_job_run_params`.
#[derive(Debug, Clone, FromRow)]
pub struct JobRunParamRow {
    pub job_run_id: DbId,
    pub name: String,
    pub value: String,
}

impl JobRunRow {
    /// Convert to an event, attaching the children that belong to this run.
    pub fn into_event(
        self,
        stages: &[ChildRunRow],
        steps: &[ChildRunRow],
        params: &[JobRunParamRow],
    ) -> JobRunEvent {
        let children = |rows: &[ChildRunRow]| -> Vec<ChildRun> {
            rows.iter()
                .filter(|c| c.job_run_id == self.id)
                .map(|c| ChildRun {
                    name: c.name.clone(),
                    result: c.result.clone(),
                })
                .collect()
        };
        let stages = children(stages);
        let steps = children(steps);
        let params = params
            .iter()
            .filter(|p| p.job_run_id == self.id)
            .map(|p| JobRunParam {
                name: p.name.clone(),
                value: p.value.clone(),
            })
            .collect();

        JobRunEvent {
            id: self.id,
            cicd_job_id: self.cicd_job_id,
            integration_id: self.integration_id,
            instance_name: self.instance_name,
            job_name: self.job_name,
            job_normalized_full_name: self.job_normalized_full_name,
            project: self.project,
            job_run_number: self.job_run_number,
            status: self.status,
            cicd_user_id: self.cicd_user_id,
            triage_rules: self.triage_rules,
            metadata: self.metadata.0,
            params,
            stages,
            steps,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_secs: self.duration_secs,
        }
    }
}
