use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use chrono::NaiveDate;

/// Representa uma linha de dados genérica
pub type DataRow = HashMap<String, DataValue>;

/// Valores de dados suportados
///
/// `Null` é o marcador explícito de valor ausente: campos vazios na origem e
/// falhas de conversão de tipo viram `Null`, nunca um valor sentinela.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    /// Data sem horário (YYYY-MM-DD)
    Date(NaiveDate),
}

impl Eq for DataValue {}

impl DataValue {
    /// Posição do tipo na ordenação entre valores de tipos diferentes
    fn rank(&self) -> u8 {
        match self {
            DataValue::Null => 0,
            DataValue::Boolean(_) => 1,
            DataValue::Integer(_) | DataValue::Float(_) => 2,
            DataValue::String(_) => 3,
            DataValue::Date(_) => 4,
        }
    }
}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            DataValue::String(s) => s.hash(state),
            DataValue::Integer(i) => i.hash(state),
            // f64 não implementa Hash
            DataValue::Float(f) => f.to_bits().hash(state),
            DataValue::Boolean(b) => b.hash(state),
            DataValue::Date(date) => date.hash(state),
            DataValue::Null => {}
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordem total: `Null` < booleanos < números < texto < datas
///
/// Inteiros e floats comparam pelo valor; empate entre `Integer(1)` e
/// `Float(1.0)` coloca o inteiro antes, mantendo a ordem coerente com `Eq`.
impl Ord for DataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.cmp(b),
            (DataValue::Integer(a), DataValue::Integer(b)) => a.cmp(b),
            (DataValue::Float(a), DataValue::Float(b)) => a.total_cmp(b),
            (DataValue::Integer(a), DataValue::Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (DataValue::Float(a), DataValue::Integer(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (DataValue::String(a), DataValue::String(b)) => a.cmp(b),
            (DataValue::Date(a), DataValue::Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

macro_rules! data_value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for DataValue {
                fn from(value: $source) -> Self {
                    DataValue::$variant(value)
                }
            }
        )*
    };
}

data_value_from!(
    String => String,
    i64 => Integer,
    f64 => Float,
    bool => Boolean,
    NaiveDate => Date,
);

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DataValue::Null)
    }
}

impl DataValue {
    /// Converte para string se possível
    pub fn as_string(&self) -> Option<String> {
        match self {
            DataValue::String(s) => Some(s.clone()),
            DataValue::Integer(i) => Some(i.to_string()),
            DataValue::Float(f) => Some(f.to_string()),
            DataValue::Boolean(b) => Some(b.to_string()),
            DataValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            DataValue::Null => None,
        }
    }

    /// Retorna o texto apenas quando o valor já é `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converte para inteiro se possível
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            DataValue::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Converte para float se possível
    pub fn as_float(&self) -> Option<f64> {
        match self {
            DataValue::Float(f) => Some(*f),
            DataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Converte para data (NaiveDate) se possível
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            DataValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Verifica se é nulo
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }
}

/// Resultado de uma operação de pipeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineResult {
    pub rows_processed: usize,
    pub rows_successful: usize,
    pub rows_failed: usize,
    pub execution_time_ms: u64,
    pub errors: Vec<String>,
    /// Contagem de linhas por tabela de destino, quando o loader as conhece
    pub table_counts: BTreeMap<String, u64>,
}

impl PipelineResult {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Estados do pipeline para rastreamento de execução
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Idle,
    Extracting,
    Transforming,
    Loading,
    Completed,
    Failed(String),
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Ocioso"),
            PipelineState::Extracting => write!(f, "Extraindo"),
            PipelineState::Transforming => write!(f, "Transformando"),
            PipelineState::Loading => write!(f, "Carregando"),
            PipelineState::Completed => write!(f, "Concluído"),
            PipelineState::Failed(error) => write!(f, "Falhou: {}", error),
        }
    }
}

/// Eventos do pipeline para monitoramento externo
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Pipeline iniciado
    Started {
        pipeline_id: String,
        timestamp: std::time::SystemTime,
    },
    /// Estado alterado
    StateChanged {
        pipeline_id: String,
        old_state: PipelineState,
        new_state: PipelineState,
        timestamp: std::time::SystemTime,
    },
    /// Fase concluída
    PhaseCompleted {
        pipeline_id: String,
        phase: String,
        rows_count: usize,
        elapsed_ms: u64,
        timestamp: std::time::SystemTime,
    },
    /// Erro ocorreu
    Error {
        pipeline_id: String,
        error: String,
        timestamp: std::time::SystemTime,
    },
    /// Pipeline concluído
    Completed {
        pipeline_id: String,
        result: PipelineResult,
        timestamp: std::time::SystemTime,
    },
}
