use crate::config::ETLConfig;
use crate::error::{ETLError, Result};
use crate::events::LoggingEventEmitter;
use crate::extract::SalesCsvExtractor;
use crate::load::{CsvLoader, StarSchemaLoader};
use crate::summary::{ExtractSummary, TransformSummary};
use crate::traits::{EventEmitter, Extractor, Loader, Transformer};
use crate::transform::{sales_transformer, CompositeTransformer};
use crate::types::{PipelineEvent, PipelineResult, PipelineState};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

pub const RAW_SNAPSHOT: &str = "raw_backup.csv";
pub const TRANSFORMED_SNAPSHOT: &str = "transformed_sales.csv";
pub const REPORT_FILE: &str = "pipeline_report.json";

/// Relatório de uma execução completa
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub pipeline_id: String,
    pub started_at: String,
    pub extract: ExtractSummary,
    pub transform: TransformSummary,
    pub load: PipelineResult,
    /// Duração de cada fase em milissegundos
    pub phase_timings_ms: BTreeMap<String, u64>,
}

/// Pipeline ETL com estado, eventos e snapshots de auditoria
///
/// Cada fase consome o lote inteiro da anterior; a primeira falha fatal
/// interrompe a execução e deixa o pipeline em `Failed`.
pub struct Pipeline<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
    config: ETLConfig,
    state: Arc<Mutex<PipelineState>>,
    event_emitter: Arc<dyn EventEmitter>,
    pipeline_id: String,
}

impl Pipeline<(), (), ()> {
    /// Cria um novo builder de pipeline
    pub fn builder() -> PipelineBuilder<(), (), ()> {
        PipelineBuilder::new()
    }

    /// Cria um builder com configuração personalizada
    pub fn with_config(config: ETLConfig) -> PipelineBuilder<(), (), ()> {
        PipelineBuilder::with_config(config)
    }
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor + Send + Sync,
    T: Transformer + Send + Sync,
    L: Loader + Send + Sync,
{
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn current_state(&self) -> PipelineState {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Altera o estado do pipeline e emite evento
    async fn set_state(&self, new_state: PipelineState) -> Result<()> {
        let old_state = {
            let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *state, new_state.clone())
        };

        self.event_emitter
            .emit(PipelineEvent::StateChanged {
                pipeline_id: self.pipeline_id.clone(),
                old_state,
                new_state,
                timestamp: SystemTime::now(),
            })
            .await
    }

    async fn phase_completed(&self, phase: &str, rows_count: usize, started: Instant) -> Result<u64> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.event_emitter
            .emit(PipelineEvent::PhaseCompleted {
                pipeline_id: self.pipeline_id.clone(),
                phase: phase.to_string(),
                rows_count,
                elapsed_ms,
                timestamp: SystemTime::now(),
            })
            .await?;
        Ok(elapsed_ms)
    }

    /// Marca a execução como falha e devolve o erro original
    async fn fail(&self, phase: &str, error: ETLError) -> ETLError {
        let message = format!("Erro na fase {}: {}", phase, error);
        tracing::error!(phase, code = error.error_code(), error = %error, "Execução abortada");

        let emitted = self.set_state(PipelineState::Failed(message.clone())).await;
        let reported = self
            .event_emitter
            .emit(PipelineEvent::Error {
                pipeline_id: self.pipeline_id.clone(),
                error: message,
                timestamp: SystemTime::now(),
            })
            .await;
        if let Err(emit_error) = emitted.and(reported) {
            tracing::warn!(error = %emit_error, "Falha ao emitir evento de erro");
        }

        error
    }

    fn snapshot(&self, file_name: &str) -> Option<CsvLoader> {
        self.config
            .pipeline
            .write_snapshots
            .then(|| {
                CsvLoader::new(self.config.pipeline.processed_dir.join(file_name))
                    .with_delimiter(self.config.delimiter_byte())
            })
    }

    /// Caminho do relatório JSON, quando os snapshots estão ativos
    pub fn report_path(&self) -> Option<PathBuf> {
        self.config
            .pipeline
            .write_snapshots
            .then(|| self.config.pipeline.processed_dir.join(REPORT_FILE))
    }

    fn write_report(path: &Path, report: &PipelineReport) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(report)?)?;
        Ok(())
    }

    /// Executa extração, transformação e carga
    pub async fn execute(&self) -> Result<PipelineReport> {
        let start_time = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        let mut timings = BTreeMap::new();

        self.event_emitter
            .emit(PipelineEvent::Started {
                pipeline_id: self.pipeline_id.clone(),
                timestamp: SystemTime::now(),
            })
            .await?;
        tracing::info!(pipeline_id = %self.pipeline_id, "Iniciando execução do pipeline");

        match self.loader.health_check().await {
            Ok(true) => {}
            Ok(false) => {
                let error = ETLError::Pipeline("Health check do loader falhou".to_string());
                return Err(self.fail("preparação", error).await);
            }
            Err(e) => return Err(self.fail("preparação", e).await),
        }

        // Extração
        self.set_state(PipelineState::Extracting).await?;
        let phase_start = Instant::now();
        let extracted = match self.extractor.extract().await {
            Ok(data) => data,
            Err(e) => return Err(self.fail("extração", e).await),
        };
        let extract_summary = ExtractSummary::from_rows(&extracted);
        if let Some(snapshot) = self.snapshot(RAW_SNAPSHOT) {
            if let Err(e) = snapshot.write(&extracted) {
                return Err(self.fail("extração", e).await);
            }
        }
        timings.insert("extract".to_string(), self.phase_completed("extract", extracted.len(), phase_start).await?);

        // Transformação
        self.set_state(PipelineState::Transforming).await?;
        let phase_start = Instant::now();
        let transformed = match self.transformer.transform(extracted).await {
            Ok(data) => data,
            Err(e) => return Err(self.fail("transformação", e).await),
        };
        let transform_summary = TransformSummary::from_rows(&transformed).with_stats(self.transformer.stats());
        if let Some(snapshot) = self.snapshot(TRANSFORMED_SNAPSHOT) {
            if let Err(e) = snapshot.write(&transformed) {
                return Err(self.fail("transformação", e).await);
            }
        }
        timings.insert(
            "transform".to_string(),
            self.phase_completed("transform", transformed.len(), phase_start).await?,
        );

        // Carga
        self.set_state(PipelineState::Loading).await?;
        let phase_start = Instant::now();
        let mut load_result = match self.loader.load(transformed).await {
            Ok(result) => result,
            Err(e) => return Err(self.fail("carga", e).await),
        };
        if let Err(e) = self.loader.finalize().await {
            return Err(self.fail("carga", e).await);
        }
        timings.insert(
            "load".to_string(),
            self.phase_completed("load", load_result.rows_successful, phase_start).await?,
        );

        load_result.execution_time_ms = start_time.elapsed().as_millis() as u64;

        let report = PipelineReport {
            pipeline_id: self.pipeline_id.clone(),
            started_at,
            extract: extract_summary,
            transform: transform_summary,
            load: load_result.clone(),
            phase_timings_ms: timings,
        };
        if let Some(path) = self.report_path() {
            if let Err(e) = Self::write_report(&path, &report) {
                return Err(self.fail("relatório", e).await);
            }
            tracing::info!(path = %path.display(), "Relatório da execução gravado");
        }

        self.set_state(PipelineState::Completed).await?;
        self.event_emitter
            .emit(PipelineEvent::Completed {
                pipeline_id: self.pipeline_id.clone(),
                result: load_result,
                timestamp: SystemTime::now(),
            })
            .await?;

        Ok(report)
    }
}

/// Pipeline padrão de vendas: CSV → cadeia de transformação → star schema
pub type SalesPipeline = Pipeline<SalesCsvExtractor, CompositeTransformer, StarSchemaLoader>;

/// Monta o pipeline de vendas a partir da configuração
pub async fn sales_pipeline(config: &ETLConfig) -> Result<SalesPipeline> {
    config.validate()?;

    let extractor = SalesCsvExtractor::new(&config.source.path).with_delimiter(config.delimiter_byte());
    let loader = StarSchemaLoader::connect(config).await?;

    Ok(Pipeline::with_config(config.clone())
        .extract(extractor)
        .transform(sales_transformer(config))
        .load(loader)
        .build())
}

/// Builder para criação de pipelines
pub struct PipelineBuilder<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
    config: ETLConfig,
    event_emitter: Option<Arc<dyn EventEmitter>>,
}

impl PipelineBuilder<(), (), ()> {
    pub fn new() -> Self {
        Self::with_config(ETLConfig::default())
    }

    pub fn with_config(config: ETLConfig) -> Self {
        Self {
            extractor: (),
            transformer: (),
            loader: (),
            config,
            event_emitter: None,
        }
    }
}

impl<E, T, L> PipelineBuilder<E, T, L> {
    /// Define o extrator
    pub fn extract<NewE: Extractor + Send + Sync>(self, extractor: NewE) -> PipelineBuilder<NewE, T, L> {
        PipelineBuilder {
            extractor,
            transformer: self.transformer,
            loader: self.loader,
            config: self.config,
            event_emitter: self.event_emitter,
        }
    }

    /// Define o transformador
    pub fn transform<NewT: Transformer + Send + Sync>(self, transformer: NewT) -> PipelineBuilder<E, NewT, L> {
        PipelineBuilder {
            extractor: self.extractor,
            transformer,
            loader: self.loader,
            config: self.config,
            event_emitter: self.event_emitter,
        }
    }

    /// Define o carregador
    pub fn load<NewL: Loader + Send + Sync>(self, loader: NewL) -> PipelineBuilder<E, T, NewL> {
        PipelineBuilder {
            extractor: self.extractor,
            transformer: self.transformer,
            loader,
            config: self.config,
            event_emitter: self.event_emitter,
        }
    }

    pub fn config(mut self, config: ETLConfig) -> Self {
        self.config = config;
        self
    }

    pub fn event_emitter<EventEmitterType: EventEmitter + 'static>(mut self, emitter: EventEmitterType) -> Self {
        self.event_emitter = Some(Arc::new(emitter));
        self
    }

    /// Diretório dos snapshots e do relatório
    pub fn processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pipeline.processed_dir = dir.into();
        self
    }

    pub fn write_snapshots(mut self, enable: bool) -> Self {
        self.config.pipeline.write_snapshots = enable;
        self
    }
}

impl<E, T, L> PipelineBuilder<E, T, L>
where
    E: Extractor + Send + Sync,
    T: Transformer + Send + Sync,
    L: Loader + Send + Sync,
{
    /// Constrói o pipeline
    pub fn build(self) -> Pipeline<E, T, L> {
        Pipeline {
            extractor: self.extractor,
            transformer: self.transformer,
            loader: self.loader,
            config: self.config,
            state: Arc::new(Mutex::new(PipelineState::default())),
            event_emitter: self
                .event_emitter
                .unwrap_or_else(|| Arc::new(LoggingEventEmitter::default())),
            pipeline_id: format!(
                "pipeline-{}-{}",
                std::process::id(),
                chrono::Utc::now().format("%Y%m%d%H%M%S%3f")
            ),
        }
    }
}

impl Default for PipelineBuilder<(), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventEmitter;
    use crate::load::database::{connect_memory, count_rows};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const HEADER: &str = "Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Discount,Profit";
    const ROWS: &[&str] = &[
        "CA-2019-001,2019-01-03,2019-01-07,Standard Class,CUST-001,John Doe,Consumer,United States,New York,New York,10001,East,PROD-001,Technology,Phones,Phone A,100.0,1,0.0,20.0",
        "CA-2019-002,2019-01-04,2019-01-08,First Class,CUST-002,Jane Smith,Corporate,United States,Los Angeles,California,90001,West,PROD-002,Furniture,Chairs,Chair B,200.0,2,0.1,40.0",
        "CA-2019-003,2019-01-05,2019-01-09,Second Class,CUST-003,Bob Johnson,Home Office,United States,Chicago,Illinois,60601,Central,PROD-003,Office Supplies,Paper,Paper C,50.0,3,0.2,10.0",
        "CA-2019-001,2019-01-03,2019-01-07,Standard Class,CUST-001,John Doe,Consumer,United States,New York,New York,10001,East,PROD-001,Technology,Phones,Phone A,100.0,1,0.0,20.0",
    ];

    fn source_file(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let source = source_file(ROWS);
        let processed = tempdir().unwrap();
        let events = InMemoryEventEmitter::new();
        let loader = StarSchemaLoader::new(connect_memory().await.unwrap());
        let pool = loader.pool().clone();

        let pipeline = Pipeline::builder()
            .extract(SalesCsvExtractor::new(source.path()))
            .transform(sales_transformer(&ETLConfig::default()))
            .load(loader)
            .processed_dir(processed.path())
            .event_emitter(events.clone())
            .build();

        let report = pipeline.execute().await.unwrap();

        assert_eq!(pipeline.current_state(), PipelineState::Completed);
        assert_eq!(report.extract.total_rows, 4);
        assert_eq!(report.extract.duplicate_rows, 1);
        assert_eq!(report.transform.total_rows, 3);
        assert_eq!(report.load.table_counts["fact_sales"], 3);
        assert_eq!(events.completed_phases(), vec!["extract", "transform", "load"]);

        assert!(processed.path().join(RAW_SNAPSHOT).exists());
        assert!(processed.path().join(TRANSFORMED_SNAPSHOT).exists());
        let json = std::fs::read_to_string(processed.path().join(REPORT_FILE)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["load"]["table_counts"]["dim_date"], 6);
        assert!(parsed["transform"]["coercion_failures"].as_object().unwrap().is_empty());
        assert!(parsed["transform"]["null_fills"].is_object());

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(count_rows(&mut conn, "fact_sales").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_quality_gate_aborts_before_load() {
        let bad_discount = ROWS[1].replace(",0.1,", ",1.5,");
        let source = source_file(&[ROWS[0], bad_discount.as_str()]);
        let events = InMemoryEventEmitter::new();
        let loader = StarSchemaLoader::new(connect_memory().await.unwrap());
        let pool = loader.pool().clone();

        let pipeline = Pipeline::builder()
            .extract(SalesCsvExtractor::new(source.path()))
            .transform(sales_transformer(&ETLConfig::default()))
            .load(loader)
            .write_snapshots(false)
            .event_emitter(events.clone())
            .build();

        let err = pipeline.execute().await.unwrap_err();

        assert_eq!(err.error_code(), "QUALITY_GATE");
        assert!(matches!(pipeline.current_state(), PipelineState::Failed(_)));
        assert_eq!(events.completed_phases(), vec!["extract"]);
        assert!(events
            .get_events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::Error { .. })));

        // O schema nem chegou a ser criado
        let tables = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'fact_sales'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 0);
    }

    #[tokio::test]
    async fn test_missing_source_fails_extraction() {
        let pipeline = Pipeline::builder()
            .extract(SalesCsvExtractor::new("nonexistent/sales.csv"))
            .transform(CompositeTransformer::new())
            .load(StarSchemaLoader::new(connect_memory().await.unwrap()))
            .write_snapshots(false)
            .build();

        let err = pipeline.execute().await.unwrap_err();

        assert_eq!(err.error_code(), "INPUT_MISSING");
        assert!(matches!(pipeline.current_state(), PipelineState::Failed(_)));
    }

    #[tokio::test]
    async fn test_snapshots_use_configured_delimiter() {
        let source = NamedTempFile::new().unwrap();
        let semicolon: Vec<String> = std::iter::once(HEADER)
            .chain(ROWS[..2].iter().copied())
            .map(|line| line.replace(',', ";"))
            .collect();
        std::fs::write(source.path(), semicolon.join("\n")).unwrap();

        let processed = tempdir().unwrap();
        let config = ETLConfig::builder()
            .source_path(source.path())
            .delimiter(';')
            .processed_dir(processed.path())
            .log_file(None)
            .build()
            .unwrap();

        let pipeline = Pipeline::with_config(config.clone())
            .extract(SalesCsvExtractor::new(source.path()).with_delimiter(config.delimiter_byte()))
            .transform(sales_transformer(&config))
            .load(StarSchemaLoader::new(connect_memory().await.unwrap()))
            .build();
        pipeline.execute().await.unwrap();

        let raw = std::fs::read_to_string(processed.path().join(RAW_SNAPSHOT)).unwrap();
        let header = raw.lines().next().unwrap();
        assert!(header.starts_with("order_id;"));
        assert!(!header.contains(','));
    }

    #[tokio::test]
    async fn test_report_write_failure_marks_pipeline_failed() {
        let source = source_file(&ROWS[..1]);
        let processed = tempdir().unwrap();
        // Um diretório no lugar do relatório impede a escrita
        std::fs::create_dir(processed.path().join(REPORT_FILE)).unwrap();
        let events = InMemoryEventEmitter::new();

        let pipeline = Pipeline::builder()
            .extract(SalesCsvExtractor::new(source.path()))
            .transform(sales_transformer(&ETLConfig::default()))
            .load(StarSchemaLoader::new(connect_memory().await.unwrap()))
            .processed_dir(processed.path())
            .event_emitter(events.clone())
            .build();

        let err = pipeline.execute().await.unwrap_err();

        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(matches!(pipeline.current_state(), PipelineState::Failed(_)));
        assert!(events
            .get_events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::Error { .. })));
        assert!(!events
            .get_events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn test_sales_pipeline_from_config() {
        let source = source_file(&ROWS[..3]);
        let dir = tempdir().unwrap();
        let config = ETLConfig::builder()
            .source_path(source.path())
            .database_url(format!("sqlite://{}", dir.path().join("sales.db").display()))
            .processed_dir(dir.path().join("processed"))
            .log_file(None)
            .build()
            .unwrap();
        config.preflight().unwrap();

        let report = sales_pipeline(&config).await.unwrap().execute().await.unwrap();

        assert_eq!(report.load.rows_successful, 3);
        assert!(dir.path().join("sales.db").exists());
    }
}
