//! Errores del cliente de jobs.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Cuerpo de error que manda el servicio: {"code": "...", "message": "..."}.
#[derive(Debug, Deserialize)]
struct RemoteError {
    code: String,
    message: String,
}

fn http_detail(code: &Option<String>, message: &str) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

/// Fallos del ejecutor de requests (transporte, HTTP, firma).
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("error de transporte: {0}")]
    Transport(#[from] reqwest::Error),

    /// El servicio respondió con un status no exitoso.
    #[error("HTTP {status}: {}", http_detail(.code, .message))]
    Http {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    #[error("error firmando el request: {0}")]
    Signing(String),

    #[error("header inválido: {0}")]
    InvalidHeader(String),
}

impl ExecutorError {
    /// Arma un `Http` a partir del cuerpo de una respuesta fallida.
    /// Si el cuerpo es el JSON de error del servicio separamos código y mensaje.
    pub fn from_body(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<RemoteError>(body) {
            Ok(remote) => ExecutorError::Http {
                status,
                code: Some(remote.code),
                message: remote.message,
            },
            Err(_) => ExecutorError::Http {
                status,
                code: None,
                message: body.trim().to_string(),
            },
        }
    }
}

/// Error de una operación del cliente. `operation` es el nombre de la
/// operación que falló (CreateJob, ListJobs, ...).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("error ejecutando {operation}: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: ExecutorError,
    },

    #[error("la respuesta de CreateJob no trae header Location")]
    MissingLocation,

    #[error("header Location mal formado: {0:?}")]
    MalformedLocation(String),

    #[error("error codificando el request de {operation}: {source}")]
    Encode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("error decodificando la respuesta de {operation}: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("error leyendo la respuesta de {operation}: {source}")]
    Body {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("configuración inválida: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn request(operation: &'static str) -> impl FnOnce(ExecutorError) -> Self {
        move |source| ClientError::Request { operation, source }
    }

    /// Status HTTP si el fallo vino de una respuesta no exitosa.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Request {
                source: ExecutorError::Http { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }

    /// Código de error del servicio (ej. "ResourceNotFound"), si lo mandó.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            ClientError::Request {
                source: ExecutorError::Http { code, .. },
                ..
            } => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_body_parsea_error_del_servicio() {
        let err = ExecutorError::from_body(
            StatusCode::NOT_FOUND,
            r#"{"code":"ResourceNotFound","message":"job not found"}"#,
        );

        match &err {
            ExecutorError::Http { status, code, message } => {
                assert_eq!(*status, StatusCode::NOT_FOUND);
                assert_eq!(code.as_deref(), Some("ResourceNotFound"));
                assert_eq!(message, "job not found");
            }
            other => panic!("esperaba Http, llegó {other:?}"),
        }
        assert_eq!(err.to_string(), "HTTP 404 Not Found: ResourceNotFound: job not found");
    }

    #[test]
    fn from_body_conserva_texto_plano() {
        let err = ExecutorError::from_body(StatusCode::BAD_GATEWAY, "upstream down\n");

        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway: upstream down");
    }

    #[test]
    fn client_error_nombra_la_operacion() {
        let err = ClientError::request("CancelJob")(ExecutorError::from_body(
            StatusCode::CONFLICT,
            r#"{"code":"InvalidJobState","message":"job is done"}"#,
        ));

        assert!(err.to_string().starts_with("error ejecutando CancelJob: "));
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.remote_code(), Some("InvalidJobState"));
    }
}
