//! # Visage
//!
//! Cache de reutilização de resultados para processamento facial.
//!
//! Visage evita recomputar uma transformação cara e determinística de
//! imagem+metadados quando (a) a mesma requisição se repete, (b) uma
//! requisição visualmente quase idêntica se repete, ou (c) muitos
//! chamadores submetem a mesma requisição ao mesmo tempo.
//!
//! ## Módulos
//!
//! - [`cli`] - Interface de linha de comando
//! - [`fingerprint`] - Derivação das chaves exata e perceptual
//! - [`store`] - Armazenamento durável de resultados (SQLite)
//! - [`flight`] - Coordenação single-flight por chave
//! - [`resolver`] - Protocolo de lookup (exato → perceptual → computar)
//! - [`processor`] - Interface do gerador de artefatos e implementação
//!   de referência (SVG de regiões faciais)
//! - [`types`] - Tipos compartilhados

#[cfg(feature = "cli")]
pub mod cli;
pub mod fingerprint;
pub mod flight;
pub mod processor;
pub mod resolver;
pub mod store;
pub mod types;

pub use types::config::Config;
pub use types::errors::{VisageError, VisageResult};
