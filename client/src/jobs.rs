//! Operaciones del ciclo de vida de un job:
//! CreateJob -> AddJobInputs* -> EndJobInput, con CancelJob y ListJobs aparte.

use std::sync::Arc;

use bytes::Bytes;
use common::{
    AddJobInputsInput, CancelJobInput, CreateJobInput, CreateJobOutput, EndJobInputInput, JobId,
    JobSummary, ListJobsInput, ListJobsOutput,
};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION};
use reqwest::Method;
use tracing::{debug, warn};

use crate::config::{ClientConfig, ClientOptions};
use crate::decode::JobSummaryStream;
use crate::error::ClientError;
use crate::executor::{ApiRequest, HttpExecutor, RequestExecutor};

pub const RESULT_SET_SIZE: &str = "result-set-size";

/// Cliente de jobs. Es barato de clonar y se puede usar desde varias
/// tareas a la vez: no guarda estado entre llamadas.
#[derive(Clone)]
pub struct Client {
    account: Arc<str>,
    executor: Arc<dyn RequestExecutor>,
}

/// Una página de ListJobs leída de a un job por vez.
pub struct JobListing {
    pub result_set_size: u64,
    pub jobs: JobSummaryStream,
}

impl Client {
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let config = Arc::new(ClientConfig::from_options(options)?);
        let executor = HttpExecutor::new(config.clone())?;

        Ok(Self {
            account: Arc::from(config.account_name()),
            executor: Arc::new(executor),
        })
    }

    /// Cliente sobre un ejecutor propio (otro transporte, tests).
    pub fn with_executor(account: impl Into<String>, executor: Arc<dyn RequestExecutor>) -> Self {
        let account: String = account.into();
        Self {
            account: Arc::from(account),
            executor,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Crea un job nuevo. No es idempotente: dos llamadas crean dos jobs.
    pub async fn create_job(&self, input: &CreateJobInput) -> Result<CreateJobOutput, ClientError> {
        const OP: &str = "CreateJob";
        let path = format!("/{}/jobs", self.account);
        let body = serde_json::to_value(input)
            .map_err(|source| ClientError::Encode { operation: OP, source })?;

        debug!(operation = OP, %path, phases = input.phases.len(), "creando job");

        let response = self
            .executor
            .execute(ApiRequest::new(Method::POST, path), Some(body))
            .await
            .map_err(ClientError::request(OP))?;

        let job_id = job_id_from_headers(&response.headers)?;
        debug!(operation = OP, %job_id, "job creado");

        Ok(CreateJobOutput { job_id })
    }

    /// Agrega objetos como inputs de un job con el input todavía abierto.
    pub async fn add_job_inputs(&self, input: &AddJobInputsInput) -> Result<(), ClientError> {
        const OP: &str = "AddJobInputs";
        let path = format!("/{}/jobs/{}/live/in", self.account, input.job_id);
        let request = ApiRequest::new(Method::POST, path)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let body = Bytes::from(encode_object_paths(&input.object_paths));

        debug!(operation = OP, job_id = %input.job_id, inputs = input.object_paths.len(), "agregando inputs");

        let _response = self
            .executor
            .execute_raw(request, Some(body))
            .await
            .map_err(ClientError::request(OP))?;

        Ok(())
    }

    /// Cierra el input del job. Va una sola vez por job.
    pub async fn end_job_input(&self, input: &EndJobInputInput) -> Result<(), ClientError> {
        const OP: &str = "EndJobInput";
        let path = format!("/{}/jobs/{}/live/in/end", self.account, input.job_id);

        debug!(operation = OP, job_id = %input.job_id, "cerrando input");

        let _response = self
            .executor
            .execute_raw(ApiRequest::new(Method::POST, path), None)
            .await
            .map_err(ClientError::request(OP))?;

        Ok(())
    }

    /// Pide cancelar el job.
    ///
    /// La cancelación es asíncrona y "best effort": que esta llamada termine
    /// bien solo dice que el pedido llegó. Un job corto con el input ya
    /// cerrado probablemente termine igual. Sirve sobre todo con el input
    /// abierto o con jobs largos.
    pub async fn cancel_job(&self, input: &CancelJobInput) -> Result<(), ClientError> {
        const OP: &str = "CancelJob";
        let path = format!("/{}/jobs/{}/live/cancel", self.account, input.job_id);

        debug!(operation = OP, job_id = %input.job_id, "cancelando job");

        let _response = self
            .executor
            .execute_raw(ApiRequest::new(Method::POST, path), None)
            .await
            .map_err(ClientError::request(OP))?;

        Ok(())
    }

    /// Una página del listado de jobs, ya decodificada.
    /// Si cualquier objeto del cuerpo falla, falla la llamada completa.
    pub async fn list_jobs(&self, input: &ListJobsInput) -> Result<ListJobsOutput, ClientError> {
        let listing = self.list_jobs_stream(input).await?;
        let result_set_size = listing.result_set_size;
        let jobs: Vec<JobSummary> = listing.jobs.collect_all().await?;

        debug!(operation = "ListJobs", jobs = jobs.len(), result_set_size, "página leída");

        Ok(ListJobsOutput {
            jobs,
            result_set_size,
        })
    }

    /// Igual que `list_jobs` pero devuelve los jobs de a uno, sin juntarlos
    /// en memoria. Pensado para cuentas con listados muy largos.
    pub async fn list_jobs_stream(&self, input: &ListJobsInput) -> Result<JobListing, ClientError> {
        const OP: &str = "ListJobs";
        let path = format!("/{}/jobs", self.account);
        let request = ApiRequest::new(Method::GET, path).with_query(input.query_params());

        debug!(operation = OP, query = ?request.query, "listando jobs");

        let response = self
            .executor
            .execute(request, None)
            .await
            .map_err(ClientError::request(OP))?;

        Ok(JobListing {
            result_set_size: result_set_size(&response.headers),
            jobs: JobSummaryStream::new(response.body, OP),
        })
    }
}

/// Cuerpo de AddJobInputs: un path por línea, sin newline final.
pub fn encode_object_paths(paths: &[String]) -> String {
    paths.join("\n")
}

fn job_id_from_headers(headers: &HeaderMap) -> Result<JobId, ClientError> {
    let value = headers.get(LOCATION).ok_or(ClientError::MissingLocation)?;
    let location = value
        .to_str()
        .map_err(|_| ClientError::MalformedLocation(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;
    parse_job_id(location)
}

/// Saca el id del job del header Location (".../jobs/<id>").
///
/// Se trabaja sobre el path crudo: se descartan query y fragmento, y el
/// slash final no afecta. El penúltimo segmento tiene que ser la colección
/// "jobs". No se resuelven segmentos "." / ".." ni se re-codifica nada: si el
/// id no viene tal cual, es error.
pub fn parse_job_id(location: &str) -> Result<JobId, ClientError> {
    let malformed = || ClientError::MalformedLocation(location.to_string());

    let raw = location.trim();
    let raw = raw.split_once('#').map_or(raw, |(before, _)| before);
    let raw = raw.split_once('?').map_or(raw, |(before, _)| before);
    let path = match raw.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => raw,
    };

    let mut segments = path.split('/').filter(|s| !s.is_empty()).rev();
    let (Some(id), Some("jobs")) = (segments.next(), segments.next()) else {
        return Err(malformed());
    };

    if is_dot_segment(id) || id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(malformed());
    }

    Ok(id.to_string())
}

/// "." o "..", también escritos con %2e.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

fn result_set_size(headers: &HeaderMap) -> u64 {
    let Some(value) = headers.get(RESULT_SET_SIZE) else {
        return 0;
    };

    match value.to_str().ok().and_then(|s| s.trim().parse::<u64>().ok()) {
        Some(size) => size,
        None => {
            warn!(value = ?value, "header Result-Set-Size ilegible, se usa 0");
            0
        }
    }
}
