//! Cliente para el servicio de jobs map/reduce.
//!
//! Flujo típico:
//! 1. `create_job` con el nombre y las fases -> id del job
//! 2. `add_job_inputs` cuantas veces haga falta
//! 3. `end_job_input` una sola vez
//!
//! `cancel_job` y `list_jobs` se pueden llamar en cualquier momento.

pub mod auth;
pub mod config;
pub mod decode;
pub mod error;
pub mod executor;
pub mod jobs;

#[cfg(test)]
mod testutil;

pub use auth::Signer;
pub use config::{ClientConfig, ClientOptions};
pub use decode::{JobSummaryStream, JsonObjectStream};
pub use error::{ClientError, ExecutorError};
pub use executor::{ApiRequest, ApiResponse, HttpExecutor, RequestExecutor, ResponseBody};
pub use jobs::{encode_object_paths, parse_job_id, Client, JobListing};

pub use common::*;
