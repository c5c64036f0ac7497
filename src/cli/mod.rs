//! Interface de linha de comando do Visage.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Visage - cache de reutilização de resultados para processamento facial.
#[derive(Parser, Debug)]
#[command(name = "visage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arquivo de configuração.
    #[arg(short, long, default_value = "visage.toml")]
    pub config: PathBuf,

    /// Modo verbose.
    #[arg(short, long)]
    pub verbose: bool,

    /// Modo silencioso.
    #[arg(short, long)]
    pub quiet: bool,

    /// Comando a executar.
    #[command(subcommand)]
    pub command: Commands,
}

/// Comandos disponíveis.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inicializa configuração no diretório atual.
    Init {
        /// Diretório de destino (padrão: diretório atual).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Mostra estatísticas do cache.
    Stats,

    /// Remove entradas expiradas e recolhíveis.
    Cleanup,

    /// Lista as entradas mais recentes do cache.
    Recent {
        /// Número máximo de entradas.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Resolve uma requisição de um arquivo JSON pelo cache.
    Resolve {
        /// Arquivo JSON com a requisição (ArtifactRequest).
        input: PathBuf,
    },

    /// Diagnostica problemas de configuração.
    Doctor,

    /// Mostra versão.
    Version,
}
