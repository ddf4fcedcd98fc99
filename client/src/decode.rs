//! Decodificación incremental de cuerpos con objetos JSON concatenados.
//!
//! El listado de jobs no es un array: son objetos JSON uno detrás del otro
//! (separados por whitespace / newline). Leemos el cuerpo por chunks y vamos
//! sacando un objeto a la vez, sin cargar el cuerpo completo en memoria.

use std::marker::PhantomData;

use bytes::{Buf, BytesMut};
use common::JobSummary;
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::executor::ResponseBody;

pub type JobSummaryStream = JsonObjectStream<JobSummary>;

enum Step<T> {
    Item(T),
    /// Hace falta leer más bytes. Trae el error de EOF si había un objeto a medias.
    NeedMore(Option<serde_json::Error>),
}

/// Secuencia perezosa de objetos `T` sobre un `ResponseBody`.
///
/// Es finita y no se puede reiniciar. Después del primer error, o cuando el
/// cuerpo se termina, `next` devuelve None y el cuerpo ya está liberado.
pub struct JsonObjectStream<T> {
    body: Option<ResponseBody>,
    buf: BytesMut,
    operation: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonObjectStream<T> {
    pub fn new(body: ResponseBody, operation: &'static str) -> Self {
        Self {
            body: Some(body),
            buf: BytesMut::new(),
            operation,
            _marker: PhantomData,
        }
    }

    pub async fn next(&mut self) -> Option<Result<T, ClientError>> {
        loop {
            if self.body.is_none() {
                return None;
            }

            // 1) intentar sacar un objeto de lo que ya está en el buffer
            let pending = match self.try_decode() {
                Ok(Step::Item(value)) => return Some(Ok(value)),
                Ok(Step::NeedMore(pending)) => pending,
                Err(e) => return Some(Err(self.fail(e))),
            };

            // 2) leer otro chunk del cuerpo
            let chunk = self.body.as_mut()?.next_chunk().await;
            match chunk {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(source)) => {
                    let err = ClientError::Body {
                        operation: self.operation,
                        source,
                    };
                    return Some(Err(self.fail(err)));
                }
                None => {
                    // fin del cuerpo: normal si no quedó nada a medias
                    self.body = None;
                    return match pending {
                        None => None,
                        Some(source) => Some(Err(self.fail(ClientError::Decode {
                            operation: self.operation,
                            source,
                        }))),
                    };
                }
            }
        }
    }

    /// Consume la secuencia completa. Si algún objeto falla se descarta todo.
    pub async fn collect_all(mut self) -> Result<Vec<T>, ClientError> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }

    fn try_decode(&mut self) -> Result<Step<T>, ClientError> {
        let (result, consumed) = {
            let mut iter = serde_json::Deserializer::from_slice(&self.buf).into_iter::<T>();
            let result = iter.next();
            (result, iter.byte_offset())
        };

        match result {
            // solo whitespace
            None => {
                self.buf.clear();
                Ok(Step::NeedMore(None))
            }
            Some(Ok(value)) => {
                self.buf.advance(consumed);
                Ok(Step::Item(value))
            }
            Some(Err(e)) if e.is_eof() => Ok(Step::NeedMore(Some(e))),
            Some(Err(source)) => Err(ClientError::Decode {
                operation: self.operation,
                source,
            }),
        }
    }

    fn fail(&mut self, err: ClientError) -> ClientError {
        self.body = None;
        self.buf.clear();
        err
    }
}
