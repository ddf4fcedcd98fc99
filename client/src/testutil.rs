//! Ejecutor falso para tests: guarda los requests y devuelve respuestas
//! armadas de antemano. Los cuerpos cuentan cuántas veces se liberaron.

use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use tokio_stream::Stream;

use crate::error::ExecutorError;
use crate::executor::{ApiRequest, ApiResponse, RequestExecutor, ResponseBody};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub json: Option<serde_json::Value>,
    pub raw: Option<Bytes>,
}

struct CountingBody {
    chunks: VecDeque<io::Result<Bytes>>,
    drops: Arc<AtomicUsize>,
}

impl Stream for CountingBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunks.pop_front())
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

enum Scripted {
    Ok {
        status: StatusCode,
        headers: HeaderMap,
        chunks: Vec<io::Result<Bytes>>,
    },
    Err(ExecutorError),
}

#[derive(Default)]
pub(crate) struct FakeExecutor {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<Scripted>>,
    drops: Arc<AtomicUsize>,
    bodies: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Encola una respuesta exitosa con headers y cuerpo en chunks.
    pub fn respond(&self, status: StatusCode, headers: &[(&str, &str)], chunks: &[&str]) {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        let chunks = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        self.responses.lock().unwrap().push_back(Scripted::Ok {
            status,
            headers: map,
            chunks,
        });
    }

    /// Encola una respuesta cuyo cuerpo falla a mitad de lectura.
    pub fn respond_broken(&self, first_chunk: &str) {
        self.responses.lock().unwrap().push_back(Scripted::Ok {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            chunks: vec![
                Ok(Bytes::copy_from_slice(first_chunk.as_bytes())),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            ],
        });
    }

    pub fn fail(&self, err: ExecutorError) {
        self.responses.lock().unwrap().push_back(Scripted::Err(err));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Cuerpos entregados al cliente.
    pub fn bodies_handed_out(&self) -> usize {
        self.bodies.load(Ordering::SeqCst)
    }

    /// Cuerpos liberados (drop) por el cliente.
    pub fn bodies_released(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<ApiResponse, ExecutorError> {
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Ok {
                status: StatusCode::NO_CONTENT,
                headers: HeaderMap::new(),
                chunks: Vec::new(),
            });

        match scripted {
            Scripted::Err(err) => Err(err),
            Scripted::Ok {
                status,
                headers,
                chunks,
            } => {
                self.bodies.fetch_add(1, Ordering::SeqCst);
                let body = CountingBody {
                    chunks: chunks.into(),
                    drops: self.drops.clone(),
                };
                Ok(ApiResponse {
                    status,
                    headers,
                    body: ResponseBody::new(body),
                })
            }
        }
    }

    fn record(&self, request: ApiRequest, json: Option<serde_json::Value>, raw: Option<Bytes>) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            path: request.path,
            query: request.query,
            headers: request.headers,
            json,
            raw,
        });
    }
}

#[async_trait]
impl RequestExecutor for FakeExecutor {
    async fn execute(
        &self,
        request: ApiRequest,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ExecutorError> {
        self.record(request, body, None);
        self.next_response()
    }

    async fn execute_raw(
        &self,
        request: ApiRequest,
        body: Option<Bytes>,
    ) -> Result<ApiResponse, ExecutorError> {
        self.record(request, None, body);
        self.next_response()
    }
}
