//! Implementação dos comandos CLI do Visage.

use std::path::PathBuf;
use std::sync::Arc;

use crate::processor::RegionSvgProcessor;
use crate::resolver::Resolver;
use crate::store::{ResultStore, RetentionPolicy, SqliteStore};
use crate::types::config::Config;
use crate::types::requests::ArtifactRequest;
use crate::VisageResult;

/// Initializes configuration in the specified directory.
pub async fn init(path: Option<PathBuf>) -> VisageResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    // Create directory if it doesn't exist
    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join("visage.toml");

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    // Create .visage/ directory for the database
    let visage_dir = target_dir.join(".visage");
    if !visage_dir.exists() {
        std::fs::create_dir_all(&visage_dir)?;
        tracing::info!(".visage/ directory created");
    }

    // Update .gitignore to ignore .visage/
    update_gitignore(&target_dir)?;

    // Create default configuration
    let config = Config::default_config();
    config.save(&config_path)?;

    println!("Visage initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!("Data directory: .visage/");
    println!();
    println!("Next steps:");
    println!("  1. Adjust TTLs and similarity threshold in visage.toml");
    println!("  2. Resolve a request: visage resolve request.json");
    println!("  3. Watch the cache: visage stats");

    Ok(())
}

/// Updates or creates .gitignore to include .visage/
fn update_gitignore(target_dir: &PathBuf) -> VisageResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let visage_entry = ".visage/";
    let visage_comment = "# Visage - local result cache";

    if gitignore_path.exists() {
        // Read existing content
        let content = std::fs::read_to_string(&gitignore_path)?;

        // Check if it already contains .visage/
        if content
            .lines()
            .any(|line| line.trim() == visage_entry || line.trim() == ".visage")
        {
            tracing::debug!(".gitignore already contains .visage/");
            return Ok(());
        }

        // Append to end of file
        let mut new_content = content.trim_end().to_string();
        if !new_content.is_empty() {
            new_content.push_str("\n\n");
        }
        new_content.push_str(visage_comment);
        new_content.push('\n');
        new_content.push_str(visage_entry);
        new_content.push('\n');

        std::fs::write(&gitignore_path, new_content)?;
        println!(".gitignore updated with .visage/");
    } else {
        // Create new .gitignore
        let content = format!("{}\n{}\n", visage_comment, visage_entry);
        std::fs::write(&gitignore_path, content)?;
        println!(".gitignore created with .visage/");
    }

    Ok(())
}

/// Abre o store SQLite configurado, criando o diretório se preciso.
fn open_store(config: &Config) -> VisageResult<SqliteStore> {
    if let Some(parent) = config.cache.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStore::new(
        &config.cache.db_path,
        RetentionPolicy::from_config(&config.cache),
    )
}

/// Mostra estatísticas do cache.
pub async fn stats(config: &Config) -> VisageResult<()> {
    let store = open_store(config)?;
    let stats = store.stats().await?;

    println!("Estatísticas do cache ({})\n", config.cache.db_path.display());
    println!("  Entradas:          {}", stats.total_entries);
    println!("    sucesso:         {}", stats.success_entries);
    println!("    falha:           {}", stats.failure_entries);
    println!("  Reutilizações:     {}", stats.total_hits);
    println!("  Computação média:  {:.1} ms", stats.avg_processing_ms);

    Ok(())
}

/// Remove entradas expiradas e recolhíveis.
pub async fn cleanup(config: &Config) -> VisageResult<()> {
    let store = open_store(config)?;
    let removed = store.sweep_expired(chrono::Utc::now()).await?;

    if removed > 0 {
        println!("{} entradas removidas.", removed);
    } else {
        println!("Nada a remover.");
    }

    Ok(())
}

/// Lista as entradas mais recentes.
pub async fn recent(limit: usize, config: &Config) -> VisageResult<()> {
    let store = open_store(config)?;
    let entries = store.recent(limit).await?;

    if entries.is_empty() {
        println!("Cache vazio.");
        return Ok(());
    }

    println!(
        "{:<14} {:<8} {:<22} {:>6} {:>12}",
        "chave", "status", "criada em", "hits", "duração (ms)"
    );
    for entry in entries {
        println!(
            "{:<14} {:<8} {:<22} {:>6} {:>12.1}",
            &entry.exact_key[..entry.exact_key.len().min(12)],
            entry.status.to_string(),
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.hit_count,
            entry.processing_duration_ms
        );
    }

    Ok(())
}

/// Resolve uma requisição de um arquivo JSON.
pub async fn resolve(input: &PathBuf, config: &Config) -> VisageResult<()> {
    let content = std::fs::read_to_string(input)?;

    // Requisições sem `params` explícitos herdam os padrões do
    // Processor configurados no visage.toml
    let mut raw: serde_json::Value = serde_json::from_str(&content)?;
    if raw.is_object() && raw.get("params").is_none() {
        raw["params"] =
            serde_json::to_value(crate::types::requests::GenerationParams::from_config(
                &config.processor,
            ))?;
    }
    let request: ArtifactRequest = serde_json::from_value(raw)?;

    let store: Arc<dyn ResultStore> = Arc::new(open_store(config)?);
    let processor = Arc::new(RegionSvgProcessor::new());
    let resolver = Resolver::new(config, store, processor);

    let resolution = resolver.resolve(&request).await?;

    println!("{}", serde_json::to_string_pretty(&resolution)?);

    Ok(())
}

/// Diagnostica problemas de configuração.
pub async fn doctor(config: &Config) -> VisageResult<()> {
    println!("Diagnosticando configuração do Visage...\n");

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    println!("✓ Configuração carregada");

    // Banco de dados
    match open_store(config) {
        Ok(store) => match store.stats().await {
            Ok(stats) => {
                println!(
                    "✓ Banco acessível em {} ({} entradas)",
                    config.cache.db_path.display(),
                    stats.total_entries
                );
            }
            Err(e) => issues.push(format!("Banco abriu mas a consulta falhou: {}", e)),
        },
        Err(e) => issues.push(format!(
            "Não foi possível abrir o banco em {}: {}",
            config.cache.db_path.display(),
            e
        )),
    }

    // Sanidade da configuração perceptual
    let hasher =
        crate::fingerprint::PerceptualHasher::new(&config.perceptual);
    let key_len = hasher.key_len() as u32;
    if config.perceptual.similarity_threshold >= key_len {
        warnings.push(format!(
            "similarity_threshold ({}) >= largura da chave ({} bits): tudo vira match",
            config.perceptual.similarity_threshold, key_len
        ));
    }
    if !config.perceptual.enabled {
        warnings.push("Caminho perceptual desabilitado; apenas hits exatos".to_string());
    }
    if config.perceptual.grid_size % 4 != 0 {
        warnings.push(format!(
            "grid_size ({}) não é múltiplo de 4; o bloco DCT será arredondado",
            config.perceptual.grid_size
        ));
    }

    // TTLs
    if config.cache.ttl_failure_secs > config.cache.ttl_success_secs {
        warnings.push(
            "TTL de falha maior que o de sucesso; falhas viverão mais que resultados".to_string(),
        );
    }

    // Resumo
    println!();
    if issues.is_empty() && warnings.is_empty() {
        println!("✓ Tudo OK! Visage está pronto para uso.");
    } else {
        if !warnings.is_empty() {
            println!("Avisos:");
            for warning in warnings {
                println!("  ⚠ {}", warning);
            }
        }
        if !issues.is_empty() {
            println!("Problemas:");
            for issue in issues {
                println!("  ✗ {}", issue);
            }
        }
    }

    Ok(())
}

/// Mostra versão.
pub fn version() {
    println!("visage {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Cache de reutilização de resultados para processamento facial");
    println!("https://github.com/SamoraDC/visage");
}
