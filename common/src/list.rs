use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Registro que devuelve el listado de jobs.
/// El servicio lo manda como {"name": <id>, "mtime": <rfc3339>, ...}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    #[serde(rename = "name")]
    pub id: JobId,

    #[serde(rename = "mtime")]
    pub modified_time: DateTime<Utc>,
}

impl JobSummary {
    /// Ruta del job dentro de la cuenta; sirve como `marker` de la siguiente página.
    pub fn path(&self, account: &str) -> String {
        format!("/{}/jobs/{}", account, self.id)
    }
}

/// Filtros de ListJobs. Los valores por defecto no se mandan al servicio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListJobsInput {
    pub running_only: bool,
    pub limit: u64,
    pub marker: String,
}

impl ListJobsInput {
    /// Parámetros de query, solo los que difieren del default.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if self.running_only {
            query.push(("state".to_string(), "running".to_string()));
        }
        if self.limit != 0 {
            query.push(("limit".to_string(), self.limit.to_string()));
        }
        if !self.marker.is_empty() {
            query.push(("manta_path".to_string(), self.marker.clone()));
        }
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListJobsOutput {
    pub jobs: Vec<JobSummary>,
    /// Total de jobs que cumplen el filtro (no solo esta página).
    /// 0 si el servicio no mandó el header o no se pudo leer.
    pub result_set_size: u64,
}
