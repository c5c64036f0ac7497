//! Tipos de erro do Visage.

use thiserror::Error;

/// Tipo de resultado padrão do Visage.
pub type VisageResult<T> = Result<T, VisageError>;

/// Erros possíveis no Visage.
#[derive(Error, Debug)]
pub enum VisageError {
    #[error("Erro de configuração: {0}")]
    Config(String),

    #[error("Erro de IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro ao parsear TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Erro ao serializar TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Erro de JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Requisição malformada - fatal para a requisição, nunca cacheado.
    #[error("Falha ao derivar chave exata: {0}")]
    KeyDerivation(String),

    /// Não-fatal: o caminho exato continua válido sem a chave perceptual.
    #[error("Chave perceptual indisponível: {0}")]
    PerceptualHashUnavailable(String),

    #[cfg(feature = "sqlite")]
    #[error("Erro no banco SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store indisponível: {0}")]
    StoreUnavailable(String),

    #[error("Processor falhou ({kind}): {message}")]
    Processor { kind: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl VisageError {
    /// Cria um erro genérico.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Cria um erro de configuração.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Cria um erro de Processor com tipo e mensagem.
    pub fn processor<K: Into<String>, M: Into<String>>(kind: K, message: M) -> Self {
        Self::Processor {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
