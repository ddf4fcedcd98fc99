//! Ejecutor de requests HTTP firmados.
//!
//! Las operaciones de jobs no hablan directo con reqwest: pasan por
//! `RequestExecutor`, que recibe método, path, query, headers y un cuerpo
//! (JSON o bytes crudos) y devuelve headers + stream del cuerpo.

use std::{fmt, io, pin::Pin, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, DATE};
use reqwest::{Method, StatusCode};
use tokio_stream::{Stream, StreamExt};
use tracing::debug;
use url::Url;

use crate::auth;
use crate::config::ClientConfig;
use crate::error::{ClientError, ExecutorError};

pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Cuerpo de una respuesta, leído por chunks.
/// Se libera (y con él la conexión) al hacer drop.
pub struct ResponseBody {
    inner: BodyStream,
}

impl ResponseBody {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    pub fn empty() -> Self {
        Self::new(tokio_stream::empty::<io::Result<Bytes>>())
    }

    /// Siguiente chunk; None cuando el cuerpo se terminó.
    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        self.inner.next().await
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseBody { .. }")
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path absoluto, ej. "/acme/jobs".
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Ejecuta el request codificando `body` como JSON.
    async fn execute(
        &self,
        request: ApiRequest,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ExecutorError>;

    /// Ejecuta el request mandando `body` tal cual.
    async fn execute_raw(
        &self,
        request: ApiRequest,
        body: Option<Bytes>,
    ) -> Result<ApiResponse, ExecutorError>;
}

enum Payload {
    Json(serde_json::Value),
    Raw(Bytes),
}

/// Máximo que leemos del cuerpo de una respuesta de error.
pub const MAX_ERROR_BODY: usize = 64 * 1024;

/// Lee hasta `MAX_ERROR_BODY` bytes del cuerpo de un error; el resto se
/// descarta junto con la respuesta. Si la lectura falla nos quedamos con lo
/// que haya llegado.
async fn read_error_body(mut resp: reqwest::Response) -> String {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_ERROR_BODY - buf.len();
                buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if buf.len() >= MAX_ERROR_BODY {
                    debug!(limit = MAX_ERROR_BODY, "cuerpo de error truncado");
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "no se pudo leer el cuerpo de error");
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Ejecutor real sobre reqwest.
pub struct HttpExecutor {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl HttpExecutor {
    pub fn new(config: Arc<ClientConfig>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Config(format!("no se pudo crear el cliente HTTP: {e}")))?;

        Ok(Self { http, config })
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> Url {
        let mut url = self.config.endpoint().clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", base_path, path.trim_start_matches('/')));
        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    fn sign(&self, headers: &mut HeaderMap) -> Result<(), ExecutorError> {
        let date = auth::http_date(Utc::now());
        if let Some(signer) = self.config.signer() {
            let value = auth::authorization_header(self.config.account_name(), signer, &date)?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| ExecutorError::InvalidHeader(format!("authorization: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        let date = HeaderValue::from_str(&date)
            .map_err(|e| ExecutorError::InvalidHeader(format!("date: {e}")))?;
        headers.insert(DATE, date);
        Ok(())
    }

    async fn send(
        &self,
        request: ApiRequest,
        payload: Option<Payload>,
    ) -> Result<ApiResponse, ExecutorError> {
        let url = self.build_url(&request.path, &request.query);
        let mut headers = request.headers;
        self.sign(&mut headers)?;

        debug!(method = %request.method, %url, "enviando request");

        let mut builder = self.http.request(request.method, url).headers(headers);
        builder = match payload {
            Some(Payload::Json(value)) => builder.json(&value),
            Some(Payload::Raw(bytes)) => builder.body(bytes),
            None => builder,
        };

        let resp = builder.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let text = read_error_body(resp).await;
            debug!(%status, "el servicio respondió con error");
            return Err(ExecutorError::from_body(status, &text));
        }

        let headers = resp.headers().clone();
        let body = ResponseBody::new(resp.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)));

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(
        &self,
        request: ApiRequest,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ExecutorError> {
        self.send(request, body.map(Payload::Json)).await
    }

    async fn execute_raw(
        &self,
        request: ApiRequest,
        body: Option<Bytes>,
    ) -> Result<ApiResponse, ExecutorError> {
        self.send(request, body.map(Payload::Raw)).await
    }
}
