use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use manta_client::{
    AddJobInputsInput, CancelJobInput, Client, ClientOptions, CreateJobInput, EndJobInputInput,
    JobPhase, ListJobsInput,
};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::warn;

/// Cuántos paths mandamos por request al leer inputs de stdin.
const INPUT_BATCH: usize = 1000;

#[derive(Parser)]
#[command(name = "manta-jobs")]
#[command(about = "CLI simple para manejar jobs map/reduce")]
struct Cli {
    /// URL del servicio (si no, MANTA_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Cuenta (si no, MANTA_USER)
    #[arg(long, global = true)]
    account: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crea un job nuevo
    Create {
        #[arg(value_name = "NOMBRE")]
        name: String,

        /// Fase "map:<exec>" o "reduce:<exec>"; se repite, en orden
        #[arg(long = "phase", value_name = "TIPO:EXEC", value_parser = parse_phase)]
        phases: Vec<JobPhase>,

        /// Archivo JSON con la lista de fases completa (assets, init, memory, ...)
        #[arg(long, value_name = "ARCHIVO", conflicts_with = "phases")]
        phases_file: Option<PathBuf>,

        /// Objeto a agregar como input apenas se crea el job
        #[arg(long = "input", value_name = "PATH")]
        inputs: Vec<String>,

        /// Cierra el input al terminar
        #[arg(long)]
        end_input: bool,
    },

    /// Agrega inputs a un job (si no se pasan paths, se leen de stdin)
    AddInputs {
        #[arg(value_name = "JOB_ID")]
        job_id: String,

        #[arg(value_name = "PATH")]
        paths: Vec<String>,
    },

    /// Cierra el input de un job
    EndInput {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },

    /// Pide cancelar un job (best effort)
    Cancel {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },

    /// Lista jobs (una página)
    List {
        /// Solo jobs corriendo
        #[arg(long)]
        running: bool,

        #[arg(long, default_value_t = 0)]
        limit: u64,

        /// Marker devuelto por la página anterior
        #[arg(long, default_value = "")]
        marker: String,
    },
}

fn parse_phase(s: &str) -> Result<JobPhase, String> {
    let (kind, exec) = s
        .split_once(':')
        .ok_or_else(|| format!("se espera TIPO:EXEC, llegó {s:?}"))?;
    if exec.trim().is_empty() {
        return Err("exec vacío".to_string());
    }
    match kind {
        "map" => Ok(JobPhase::map(exec)),
        "reduce" => Ok(JobPhase::reduce(exec)),
        other => Err(format!("tipo de fase desconocido: {other} (map o reduce)")),
    }
}

async fn read_phases_file(path: &Path) -> Result<Vec<JobPhase>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("leyendo {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parseando fases de {}", path.display()))
}

async fn read_stdin_paths() -> Result<Vec<String>> {
    let mut lines = BufReader::new(stdin()).lines();
    let mut paths = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            paths.push(line.to_string());
        }
    }
    Ok(paths)
}

async fn add_inputs_in_batches(client: &Client, job_id: &str, paths: Vec<String>) -> Result<usize> {
    let total = paths.len();
    for batch in paths.chunks(INPUT_BATCH) {
        client
            .add_job_inputs(&AddJobInputsInput {
                job_id: job_id.to_string(),
                object_paths: batch.to_vec(),
            })
            .await
            .context("AddJobInputs")?;
    }
    Ok(total)
}

fn build_client(url: Option<String>, account: Option<String>) -> Result<Client> {
    let mut options = ClientOptions::from_env();
    if let Some(url) = url {
        options.endpoint = url;
    }
    if let Some(account) = account {
        options.account_name = account;
    }
    Client::new(options).context("configurando el cliente")
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = build_client(cli.url, cli.account)?;

    match cli.command {
        Commands::Create {
            name,
            phases,
            phases_file,
            inputs,
            end_input,
        } => {
            let phases = match phases_file {
                Some(path) => read_phases_file(&path).await?,
                None => phases,
            };
            if phases.is_empty() {
                bail!("el job necesita al menos una fase (--phase o --phases-file)");
            }
            for (i, phase) in phases.iter().enumerate() {
                for w in phase.sizing_warnings() {
                    warn!("fase {}: {}", i, w);
                }
            }

            let job = client
                .create_job(&CreateJobInput { name, phases })
                .await
                .context("CreateJob")?;

            println!("Job creado:");
            println!("  id: {}", job.job_id);

            if !inputs.is_empty() {
                let n = add_inputs_in_batches(&client, &job.job_id, inputs).await?;
                println!("  inputs agregados: {}", n);
            }
            if end_input {
                client
                    .end_job_input(&EndJobInputInput {
                        job_id: job.job_id.clone(),
                    })
                    .await
                    .context("EndJobInput")?;
                println!("  input cerrado");
            }
        }

        Commands::AddInputs { job_id, paths } => {
            let paths = if paths.is_empty() {
                read_stdin_paths().await?
            } else {
                paths
            };
            if paths.is_empty() {
                bail!("no hay inputs para agregar");
            }

            let n = add_inputs_in_batches(&client, &job_id, paths).await?;
            println!("{} inputs agregados al job {}", n, job_id);
        }

        Commands::EndInput { job_id } => {
            client
                .end_job_input(&EndJobInputInput {
                    job_id: job_id.clone(),
                })
                .await
                .context("EndJobInput")?;
            println!("Input cerrado para job {}", job_id);
        }

        Commands::Cancel { job_id } => {
            client
                .cancel_job(&CancelJobInput {
                    job_id: job_id.clone(),
                })
                .await
                .context("CancelJob")?;
            println!("Cancelación pedida para job {} (no garantiza que se detenga)", job_id);
        }

        Commands::List {
            running,
            limit,
            marker,
        } => {
            let out = client
                .list_jobs(&ListJobsInput {
                    running_only: running,
                    limit,
                    marker,
                })
                .await
                .context("ListJobs")?;

            if out.jobs.is_empty() {
                println!("No hay jobs.");
            }
            for job in &out.jobs {
                println!("{}  {}", job.modified_time.to_rfc3339(), job.id);
            }
            println!();
            println!("mostrando {} de {} jobs", out.jobs.len(), out.result_set_size);

            if (out.jobs.len() as u64) < out.result_set_size {
                if let Some(last) = out.jobs.last() {
                    println!("siguiente página: --marker {}", last.path(client.account()));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use manta_client::PhaseType;

    #[test]
    fn parse_phase_acepta_map_y_reduce() {
        let map = parse_phase("map:wc").unwrap();
        assert_eq!(map.phase_type, Some(PhaseType::Map));
        assert_eq!(map.exec, "wc");

        let reduce = parse_phase("reduce:awk '{ print $1 }' | sort").unwrap();
        assert_eq!(reduce.phase_type, Some(PhaseType::Reduce));
        assert_eq!(reduce.exec, "awk '{ print $1 }' | sort");
    }

    #[test]
    fn parse_phase_rechaza_formatos_invalidos() {
        assert!(parse_phase("wc").is_err());
        assert!(parse_phase("map:").is_err());
        assert!(parse_phase("filter:grep x").is_err());
    }

    #[test]
    fn cli_parsea_create_con_fases_en_orden() {
        let cli = Cli::try_parse_from([
            "manta-jobs",
            "--account",
            "acme",
            "create",
            "WordCount",
            "--phase",
            "map:wc",
            "--phase",
            "reduce:cat",
            "--input",
            "/acme/stor/books/dracula.txt",
            "--end-input",
        ])
        .unwrap();

        match cli.command {
            Commands::Create {
                name,
                phases,
                inputs,
                end_input,
                ..
            } => {
                assert_eq!(name, "WordCount");
                assert_eq!(phases.len(), 2);
                assert_eq!(phases[1].exec, "cat");
                assert_eq!(inputs, vec!["/acme/stor/books/dracula.txt"]);
                assert!(end_input);
            }
            _ => panic!("esperaba create"),
        }
        assert_eq!(cli.account.as_deref(), Some("acme"));
    }
}
