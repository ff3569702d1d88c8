use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sales_etl::export::export_dashboard;
use sales_etl::load::database;
use sales_etl::logging::init_logging;
use sales_etl::{sales_pipeline, ETLConfig, PipelineReport};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "sales-etl", version, about = "Pipeline ETL de vendas: CSV → star schema em SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Executa extração, transformação e carga
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Arquivo CSV de origem
        #[arg(long)]
        source: Option<PathBuf>,

        /// URL do banco de destino (sqlite://...)
        #[arg(long)]
        database: Option<String>,
    },
    /// Exporta a tabela achatada para o dashboard
    Export {
        #[command(flatten)]
        common: CommonArgs,

        /// Caminho do CSV exportado
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Arquivo de configuração (TOML); sem ele, variáveis ETL_* e padrões
    #[arg(long, short)]
    config: Option<PathBuf>,
}

fn load_config(args: &CommonArgs) -> anyhow::Result<ETLConfig> {
    let config = match &args.config {
        Some(path) => ETLConfig::from_file(path)
            .with_context(|| format!("falha ao carregar {}", path.display()))?,
        None => ETLConfig::from_env()?,
    };
    Ok(config)
}

fn print_report(report: &PipelineReport) {
    println!("Pipeline {} concluído", report.pipeline_id);
    println!(
        "  Extraídas: {} linhas ({} duplicadas)",
        report.extract.total_rows, report.extract.duplicate_rows
    );
    println!("  Transformadas: {} linhas", report.transform.total_rows);
    for (table, rows) in &report.load.table_counts {
        println!("  {:<20} {:>8}", table, rows);
    }
    println!("  Tempo total: {} ms", report.load.execution_time_ms);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run { common, source, database } => {
            let mut config = load_config(&common)?;
            if let Some(source) = source {
                config.source.path = source;
            }
            if let Some(url) = database {
                config.target.database_url = url;
            }

            let _guard = init_logging(&config.observability)?;
            config.preflight()?;

            let report = sales_pipeline(&config).await?.execute().await?;
            print_report(&report);
        }
        Command::Export { common, output } => {
            let config = load_config(&common)?;
            let _guard = init_logging(&config.observability)?;

            let output = output.unwrap_or_else(|| config.pipeline.export_path.clone());
            let pool = database::connect(&config.target.database_url).await?;
            let rows = export_dashboard(&pool, &output).await?;
            pool.close().await;

            println!("{} linhas exportadas para {}", rows, output.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Pipeline falhou");
            eprintln!("Erro: {e:#}");
            ExitCode::FAILURE
        }
    }
}
