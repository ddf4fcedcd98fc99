//! Firma de requests.
//!
//! El algoritmo de firma lo pone quien usa el cliente (agente SSH, llave en
//! disco, etc). Acá solo armamos los headers `Date` y `Authorization` con el
//! esquema "Signature" sobre el header date.

use chrono::{DateTime, Utc};

use crate::error::ExecutorError;

pub trait Signer: Send + Sync {
    /// Identificador de la llave (fingerprint) tal como lo conoce el servicio.
    fn key_id(&self) -> &str;

    /// Nombre del algoritmo, ej. "rsa-sha256".
    fn algorithm(&self) -> &str;

    /// Firma `data` y devuelve la firma en base64.
    fn sign(&self, data: &[u8]) -> Result<String, ExecutorError>;
}

/// Fecha en formato RFC 1123, como la espera el header `Date`.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Valor del header `Authorization` para `date` firmado con `signer`.
pub fn authorization_header(
    account: &str,
    signer: &dyn Signer,
    date: &str,
) -> Result<String, ExecutorError> {
    let signing_string = format!("date: {}", date);
    let signature = signer.sign(signing_string.as_bytes())?;

    Ok(format!(
        "Signature keyId=\"/{}/keys/{}\",algorithm=\"{}\",headers=\"date\",signature=\"{}\"",
        account,
        signer.key_id(),
        signer.algorithm(),
        signature
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct EchoSigner;

    impl Signer for EchoSigner {
        fn key_id(&self) -> &str {
            "fd:9e:9a"
        }

        fn algorithm(&self) -> &str {
            "rsa-sha256"
        }

        fn sign(&self, data: &[u8]) -> Result<String, ExecutorError> {
            Ok(format!("firma({})", data.len()))
        }
    }

    #[test]
    fn http_date_usa_formato_rfc1123() {
        let now = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(http_date(now), "Thu, 02 Jan 2020 03:04:05 GMT");
    }

    #[test]
    fn authorization_incluye_cuenta_llave_y_firma() {
        let date = "Thu, 02 Jan 2020 03:04:05 GMT";

        let header = authorization_header("acme", &EchoSigner, date).unwrap();

        assert_eq!(
            header,
            format!(
                "Signature keyId=\"/acme/keys/fd:9e:9a\",algorithm=\"rsa-sha256\",headers=\"date\",signature=\"firma({})\"",
                "date: ".len() + date.len()
            )
        );
    }
}
