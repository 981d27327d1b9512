//! Admin plane commands.

use super::CommandResult;
use dbal_sync_engine::{AdminClient, SyncError};
use dbal_sync_protocol::{AdapterConfig, AdapterInfo, HealthStatus, SeedRequest, SeedSummary};

fn user_facing(err: SyncError) -> Box<dyn std::error::Error> {
    err.user_message().into()
}

/// Runs the health command.
pub async fn health(admin: &AdminClient) -> CommandResult<HealthStatus> {
    let health = admin.health().await.map_err(user_facing)?;
    if health.is_healthy() {
        println!("✓ {} is {}", health.service, health.status);
    } else {
        println!("✗ {} reports {}", health.service, health.status);
    }
    Ok(health)
}

/// Runs the adapters command.
pub async fn adapters(admin: &AdminClient, format: &str) -> CommandResult<Vec<AdapterInfo>> {
    let adapters = admin.adapters().await.map_err(user_facing)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&adapters)?),
        _ => {
            println!("{:<12} {:<10} {:<7} DESCRIPTION", "ADAPTER", "SUPPORTED", "ACTIVE");
            for adapter in &adapters {
                println!(
                    "{:<12} {:<10} {:<7} {}",
                    adapter.name,
                    if adapter.supported { "yes" } else { "no" },
                    if adapter.active { "*" } else { "" },
                    adapter.description
                );
            }
        }
    }
    Ok(adapters)
}

/// Runs the config command.
pub async fn config(admin: &AdminClient) -> CommandResult<AdapterConfig> {
    let config = admin.config().await.map_err(user_facing)?;
    println!("Adapter:      {}", config.adapter);
    println!("Database URL: {}", config.database_url);
    println!("Status:       {}", config.status);
    Ok(config)
}

/// Runs the switch-adapter command.
pub async fn switch_adapter(
    admin: &AdminClient,
    adapter: &str,
    database_url: &str,
) -> CommandResult<String> {
    let message = admin
        .switch_adapter(adapter, database_url)
        .await
        .map_err(user_facing)?;
    println!("✓ {message}");
    Ok(message)
}

/// Runs the test-connection command. A failed test is an error.
pub async fn test_connection(
    admin: &AdminClient,
    adapter: &str,
    database_url: &str,
) -> CommandResult<()> {
    let test = admin
        .test_connection(adapter, database_url)
        .await
        .map_err(user_facing)?;
    if test.success {
        println!("✓ connection ok");
        Ok(())
    } else {
        Err(format!("connection failed: {}", test.message).into())
    }
}

/// Runs the seed command.
pub async fn seed(
    admin: &AdminClient,
    force: bool,
    seed_dir: Option<String>,
) -> CommandResult<SeedSummary> {
    let summary = admin
        .seed(&SeedRequest { force, seed_dir })
        .await
        .map_err(user_facing)?;

    for result in &summary.results {
        println!(
            "  {:<14} inserted {:>4}  skipped {:>4}  failed {:>4}",
            result.entity, result.inserted, result.skipped, result.failed
        );
    }
    println!(
        "Seed complete: {} inserted, {} skipped, {} failed",
        summary.total_inserted, summary.total_skipped, summary.total_failed
    );
    for error in &summary.errors {
        println!("  ! {error}");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbal_sync_engine::{MemoryRemote, SyncConfig};
    use dbal_sync_protocol::EntityRecord;
    use std::sync::Arc;

    fn admin(remote: MemoryRemote) -> AdminClient {
        AdminClient::new(
            SyncConfig::new("http://dbal.test", "t1").with_admin_token("tok"),
            Arc::new(remote.with_admin_token("tok")),
        )
    }

    #[tokio::test]
    async fn health_and_config() {
        let admin = admin(MemoryRemote::new());
        assert!(health(&admin).await.unwrap().is_healthy());
        assert_eq!(config(&admin).await.unwrap().adapter, "sqlite");
    }

    #[tokio::test]
    async fn adapters_json_and_text() {
        let admin = admin(MemoryRemote::new());
        assert_eq!(adapters(&admin, "json").await.unwrap().len(), 13);
        assert_eq!(adapters(&admin, "text").await.unwrap().len(), 13);
    }

    #[tokio::test]
    async fn failed_connection_test_is_an_error() {
        let admin = admin(MemoryRemote::new().with_unreachable_database("mysql://down/app"));
        assert!(test_connection(&admin, "mysql", "mysql://up/app").await.is_ok());

        let err = test_connection(&admin, "mysql", "mysql://down/app")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("connection failed"));
    }

    #[tokio::test]
    async fn switch_then_seed() {
        let remote = MemoryRemote::new().with_seed(
            "t1",
            "core",
            "Setting",
            vec![EntityRecord::new().with("id", "s1")],
        );
        let admin = admin(remote);

        let message = switch_adapter(&admin, "postgres", "postgres://u:p@db/app")
            .await
            .unwrap();
        assert!(message.contains("postgres"));

        let summary = seed(&admin, false, None).await.unwrap();
        assert_eq!(summary.total_inserted, 1);
    }

    #[tokio::test]
    async fn offline_uses_user_message() {
        let remote = MemoryRemote::new();
        remote.set_offline(true);
        let err = health(&admin(remote)).await.unwrap_err();
        assert_eq!(err.to_string(), "service unreachable, working offline");
    }
}
