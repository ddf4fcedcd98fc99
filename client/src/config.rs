use std::{env, fmt, sync::Arc, time::Duration};

use url::Url;

use crate::auth::Signer;
use crate::error::ClientError;

pub const ENV_URL: &str = "MANTA_URL";
pub const ENV_ACCOUNT: &str = "MANTA_USER";
pub const ENV_TIMEOUT_SECS: &str = "MANTA_TIMEOUT_SECS";

pub const DEFAULT_ENDPOINT: &str = "https://us-east.manta.joyent.com";

/// Opciones para construir un `Client`.
#[derive(Clone, Default)]
pub struct ClientOptions {
    pub endpoint: String,
    pub account_name: String,
    pub signers: Vec<Arc<dyn Signer>>,
    pub user_agent: Option<String>,
    pub timeout: Option<Duration>,
}

impl ClientOptions {
    /// Lee endpoint, cuenta y timeout del entorno:
    /// - MANTA_URL (default https://us-east.manta.joyent.com)
    /// - MANTA_USER
    /// - MANTA_TIMEOUT_SECS (opcional)
    ///
    /// No valida nada; eso pasa en `ClientConfig::from_options`.
    pub fn from_env() -> Self {
        let endpoint = env::var(ENV_URL).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let account_name = env::var(ENV_ACCOUNT).unwrap_or_default();
        let timeout = env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        Self {
            endpoint,
            account_name,
            signers: Vec::new(),
            user_agent: None,
            timeout,
        }
    }
}

/// Configuración inmutable del cliente. Se arma una vez y se comparte
/// (`Arc<ClientConfig>`) con cada operación.
pub struct ClientConfig {
    endpoint: Url,
    account_name: String,
    signers: Vec<Arc<dyn Signer>>,
    user_agent: String,
    timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn from_options(options: ClientOptions) -> Result<Self, ClientError> {
        let account_name = options.account_name.trim().to_string();
        if account_name.is_empty() {
            return Err(ClientError::Config("falta el nombre de la cuenta".to_string()));
        }
        if account_name.contains('/') {
            return Err(ClientError::Config(format!(
                "nombre de cuenta inválido: {account_name}"
            )));
        }

        let endpoint = Url::parse(options.endpoint.trim())
            .map_err(|e| ClientError::Config(format!("endpoint inválido {:?}: {e}", options.endpoint)))?;
        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "endpoint inválido {:?}: se espera una URL http(s)",
                options.endpoint
            )));
        }

        let user_agent = options
            .user_agent
            .unwrap_or_else(|| format!("manta-client/{}", env!("CARGO_PKG_VERSION")));

        Ok(Self {
            endpoint,
            account_name,
            signers: options.signers,
            user_agent,
            timeout: options.timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Primer signer configurado; es el que firma los requests.
    pub fn signer(&self) -> Option<&dyn Signer> {
        self.signers.first().map(|s| s.as_ref())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("account_name", &self.account_name)
            .field(
                "signers",
                &self.signers.iter().map(|s| s.key_id()).collect::<Vec<_>>(),
            )
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish()
    }
}
