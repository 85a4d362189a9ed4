//! Job-scheduler environment.
//!
//! Under SLURM each rank learns its job id from `SLURM_JOB_ID` and its GPUs
//! from `SLURM_STEP_GPUS` (set when the job requests `--gpus-per-task`).
//! Without a GPU list the rank index modulo the node's GPU count is used.
//! That fallback assumes every node carries `targets_per_node` GPUs.

use super::validate::ValidationError;
use std::path::PathBuf;

pub const JOB_ID_VAR: &str = "SLURM_JOB_ID";
pub const STEP_GPUS_VAR: &str = "SLURM_STEP_GPUS";
pub const PROC_ID_VAR: &str = "SLURM_PROCID";

/// Output file prefix used when no output file is given
const OUTPUT_PREFIX: &str = "gpusnap";

/// Where this rank's targets came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    /// Listed by the scheduler
    Assigned,
    /// Derived from the rank index
    RankFallback { rank: u32 },
    /// Nothing known; sample every visible target
    All,
}

/// Scheduler-provided identity of this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEnvironment {
    pub job_id: Option<String>,
    pub targets: Vec<u32>,
    pub source: TargetSource,
}

impl JobEnvironment {
    /// Read the process environment
    pub fn from_env(targets_per_node: u32) -> Result<Self, ValidationError> {
        Self::from_lookup(|k| std::env::var(k).ok(), targets_per_node)
    }

    /// Resolve from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F, targets_per_node: u32) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty =
            |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let job_id = non_empty(JOB_ID_VAR);

        if let Some(gpus) = non_empty(STEP_GPUS_VAR) {
            let targets = gpus
                .split(',')
                .map(|g| parse_u32(STEP_GPUS_VAR, g.trim(), &gpus))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self { job_id, targets, source: TargetSource::Assigned });
        }

        if let Some(proc_id) = non_empty(PROC_ID_VAR) {
            if targets_per_node == 0 {
                return Err(ValidationError::InvalidTargetsPerNode(targets_per_node));
            }
            let rank = parse_u32(PROC_ID_VAR, &proc_id, &proc_id)?;
            let target = rank % targets_per_node;
            log::warn!(
                "{STEP_GPUS_VAR} not set; using {PROC_ID_VAR} mod {targets_per_node} = {target} as target"
            );
            return Ok(Self {
                job_id,
                targets: vec![target],
                source: TargetSource::RankFallback { rank },
            });
        }

        Ok(Self { job_id, targets: Vec::new(), source: TargetSource::All })
    }

    /// `gpusnap_<job>.sqlite`, or `gpusnap.sqlite` outside a job
    pub fn default_output(&self) -> PathBuf {
        match &self.job_id {
            Some(job) => PathBuf::from(format!("{OUTPUT_PREFIX}_{job}.sqlite")),
            None => PathBuf::from(format!("{OUTPUT_PREFIX}.sqlite")),
        }
    }
}

fn parse_u32(var: &str, item: &str, whole: &str) -> Result<u32, ValidationError> {
    item.parse().map_err(|_| ValidationError::InvalidEnvironment {
        var: var.to_string(),
        value: whole.to_string(),
    })
}
