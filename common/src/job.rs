use serde::{Deserialize, Serialize};

pub type JobId = String;

/// Valores de memoria (MB) que acepta el servicio para una zona de cómputo.
pub const ALLOWED_MEMORY_MB: [u64; 6] = [256, 512, 1024, 2048, 4096, 8192];

/// Valores de disco (GB) que acepta el servicio para una zona de cómputo.
pub const ALLOWED_DISK_GB: [u64; 10] = [2, 4, 8, 16, 32, 64, 128, 256, 512, 1024];

/// Máximo de reducers por fase.
pub const MAX_REDUCER_COUNT: u32 = 1024;

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

/* --------- Fases de un job --------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseType {
    Map,
    Reduce,
}

/// Una etapa (map o reduce) del pipeline de un job.
///
/// Los campos numéricos en 0 significan "sin definir": no se serializan y el
/// servicio elige su default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPhase {
    /// Se serializa como "type". Si es None el servicio usa su default (map).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub phase_type: Option<PhaseType>,

    /// Objetos que se copian a la zona de cómputo antes de ejecutar.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,

    /// Comando de shell, una vez por input (map) o por reducer (reduce).
    pub exec: String,

    /// Comando que corre una vez por zona antes de cualquier exec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,

    #[serde(rename = "count", default, skip_serializing_if = "is_zero_u32")]
    pub reducer_count: u32,

    #[serde(rename = "memory", default, skip_serializing_if = "is_zero_u64")]
    pub memory_mb: u64,

    #[serde(rename = "disk", default, skip_serializing_if = "is_zero_u64")]
    pub disk_gb: u64,
}

impl JobPhase {
    pub fn new(exec: impl Into<String>) -> Self {
        Self {
            phase_type: None,
            assets: Vec::new(),
            exec: exec.into(),
            init: None,
            reducer_count: 0,
            memory_mb: 0,
            disk_gb: 0,
        }
    }

    pub fn map(exec: impl Into<String>) -> Self {
        Self {
            phase_type: Some(PhaseType::Map),
            ..Self::new(exec)
        }
    }

    pub fn reduce(exec: impl Into<String>) -> Self {
        Self {
            phase_type: Some(PhaseType::Reduce),
            ..Self::new(exec)
        }
    }

    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets = assets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_init(mut self, init: impl Into<String>) -> Self {
        self.init = Some(init.into());
        self
    }

    pub fn with_reducers(mut self, count: u32) -> Self {
        self.reducer_count = count;
        self
    }

    pub fn with_memory_mb(mut self, memory_mb: u64) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_disk_gb(mut self, disk_gb: u64) -> Self {
        self.disk_gb = disk_gb;
        self
    }

    /// Avisos sobre valores que el servicio probablemente rechace.
    /// Es solo informativo: el cliente manda la fase tal cual.
    pub fn sizing_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.exec.trim().is_empty() {
            warnings.push("exec vacío".to_string());
        }
        if self.reducer_count > MAX_REDUCER_COUNT {
            warnings.push(format!(
                "count={} supera el máximo de {}",
                self.reducer_count, MAX_REDUCER_COUNT
            ));
        }
        if self.memory_mb != 0 && !ALLOWED_MEMORY_MB.contains(&self.memory_mb) {
            warnings.push(format!(
                "memory={} no es uno de {:?}",
                self.memory_mb, ALLOWED_MEMORY_MB
            ));
        }
        if self.disk_gb != 0 && !ALLOWED_DISK_GB.contains(&self.disk_gb) {
            warnings.push(format!(
                "disk={} no es uno de {:?}",
                self.disk_gb, ALLOWED_DISK_GB
            ));
        }

        warnings
    }
}

/* --------- Parámetros de cada operación --------- */

/// Cuerpo de CreateJob. El orden de `phases` es el orden del pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJobInput {
    pub name: String,
    pub phases: Vec<JobPhase>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateJobOutput {
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddJobInputsInput {
    pub job_id: JobId,
    pub object_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndJobInputInput {
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelJobInput {
    pub job_id: JobId,
}
