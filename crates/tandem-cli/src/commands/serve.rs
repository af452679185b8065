//! Server command implementation

use std::path::Path;

use anyhow::Result;
use tandem_core::InsightSettings;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Tandem web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let mut config = tandem_server::ServerConfig::from_env();
    config.require_auth = !no_auth;

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if config.api_keys.is_empty() {
        println!("   🔒 Authentication: API key (none configured, set TANDEM_API_KEYS)");
    } else {
        println!(
            "   🔑 API keys: {} configured (TANDEM_API_KEYS)",
            config.api_keys.len()
        );
    }

    let settings = InsightSettings::from_env();
    println!(
        "   🤖 AI insights: {} (cache TTL {}s, {} entries)",
        if settings.ai_enabled { "enabled" } else { "disabled" },
        settings.cache_ttl.as_secs(),
        settings.cache_capacity
    );
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    tandem_server::serve(db, host, port, config).await?;

    Ok(())
}
