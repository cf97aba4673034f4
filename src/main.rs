use anyhow::{bail, Result};
use entity_translations::{TranslationConfig, TranslationService};
use serde_json::json;
use tracing::info;

fn main() -> Result<()> {
    // Load .env file (ignored when variables come from the environment)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("entity_translations=info".parse()?),
        )
        .init();

    let entity_types: Vec<String> = std::env::args().skip(1).collect();
    if entity_types.is_empty() {
        bail!("Usage: translation-stats <entity_type> [entity_type ...]");
    }

    let config = TranslationConfig::from_env()?;
    info!(
        database = %config.database_path,
        table = %config.table_name,
        "Opening translation store"
    );
    let service = TranslationService::open(config)?;

    let mut per_type = serde_json::Map::new();
    for entity_type in &entity_types {
        let counts = service.count_by_locale(entity_type, None)?;
        per_type.insert(entity_type.clone(), serde_json::to_value(counts)?);
    }

    let report = json!({
        "default_locale": service.registry().default_locale(),
        "supported_locales": service.registry().supported(),
        "counts": per_type,
        "metrics": service.cache().metrics().report(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
