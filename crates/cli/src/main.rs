use anyhow::Context;
use api_shared::{HealthService, PatientCreateReq, PatientRes};
use clap::{Parser, Subcommand};
use gateway_core::{
    FhirGateway, FileLedgerStore, GatewayConfig, PatientService, RequestLedger,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use utoipa::OpenApi;

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "EPR gateway operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the gateway is alive
    Health,
    /// Write the OpenAPI document to a file
    CreateOpenapi {
        /// Output path
        output: PathBuf,
    },
    /// Search the FHIR server by MRN
    Search {
        /// MRN or hospital number
        #[arg(long)]
        mrn: String,
    },
    /// List every patient on the FHIR server
    List,
    /// Create a patient on the FHIR server
    Create {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        date_of_birth: String,
        #[arg(long)]
        mrn: String,
    },
}

/// Default log levels; dropped search results are reported by `fhir`.
const LOG_DIRECTIVES: &[&str] = &["gateway=warn", "fhir=warn"];

/// Actor recorded in the ledger for CLI-initiated calls.
const CLI_ACTOR: &str = "gateway-cli";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            LOG_DIRECTIVES
                .iter()
                .try_fold(tracing_subscriber::EnvFilter::from_default_env(), |filter, d| {
                    d.parse::<tracing_subscriber::filter::Directive>()
                        .map(|d| filter.add_directive(d))
                })?,
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => {
            let res = HealthService::check_health();
            println!("{}", res.message);
        }
        Some(Commands::CreateOpenapi { output }) => {
            write_openapi(&output)?;
            println!("Wrote OpenAPI document to {}", output.display());
        }
        Some(Commands::Search { mrn }) => {
            let service = patient_service().await?;
            let patients = service.search(&mrn, CLI_ACTOR).await?;
            print_patients(patients.into_iter().map(PatientRes::from).collect())?;
        }
        Some(Commands::List) => {
            let service = patient_service().await?;
            let patients = service.list_all(CLI_ACTOR).await?;
            print_patients(patients.into_iter().map(PatientRes::from).collect())?;
        }
        Some(Commands::Create {
            first_name,
            last_name,
            date_of_birth,
            mrn,
        }) => {
            let req = PatientCreateReq {
                first_name,
                last_name,
                date_of_birth,
                mrn,
            };
            let service = patient_service().await?;
            let patient = service.create(&req.into(), CLI_ACTOR).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&PatientRes::from(patient))?
            );
        }
        None => {
            println!("Use 'gateway --help' for commands");
        }
    }

    Ok(())
}

fn write_openapi(output: &Path) -> anyhow::Result<()> {
    let doc = api_rest::ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to render OpenAPI document")?;
    std::fs::write(output, doc)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

async fn patient_service() -> anyhow::Result<PatientService> {
    let config = GatewayConfig::load_from_env()?;
    let ledger = match std::env::var("LEDGER_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            RequestLedger::new(Arc::new(FileLedgerStore::open(dir).await?))
        }
        _ => RequestLedger::in_memory(),
    };
    let gateway = FhirGateway::new(&config, ledger)?;
    Ok(PatientService::new(Arc::new(gateway)))
}

fn print_patients(patients: Vec<PatientRes>) -> anyhow::Result<()> {
    if patients.is_empty() {
        println!("No patients found.");
    } else {
        println!("{}", serde_json::to_string_pretty(&patients)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn log_directives_parse_and_cover_fhir() {
        for directive in LOG_DIRECTIVES {
            directive
                .parse::<tracing_subscriber::filter::Directive>()
                .expect("valid directive");
        }
        assert!(LOG_DIRECTIVES.contains(&"fhir=warn"));
    }

    #[test]
    fn parses_search() {
        let cli = Cli::try_parse_from(["gateway", "search", "--mrn", "123456"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::Search { mrn }) if mrn == "123456"));
    }

    #[test]
    fn writes_openapi_document() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let output = temp_dir.path().join("openapi.json");
        write_openapi(&output).expect("written");

        let doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&output).expect("read")).expect("json");
        assert!(doc["paths"]["/v1/patient_search"].is_object());
    }
}
