//! Subcommand handlers
//!
//! State is loaded once at start-up and written back after every command
//! that changes it.

use crate::{Cli, Commands, UpdateArgs};
use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{debug, info};
use wishlist::model::LOCAL_FILE_SOURCE;
use wishlist::{
    ConsoleNotifier, IntoSyncCallback, JsonFilePersistence, KnownSource, NullNotifier,
    StatePersistence, SyncCallback, SyncConfig, SyncCoordinator, SyncError, SyncReport, SyncState,
    WishListStore, check_source, content_security_policy_connect_src, to_wish_list_text,
};

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut config = SyncConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = cli.state {
        config.state_path = path;
    }

    match cli.command {
        // Commands that never touch saved state
        Commands::Check { url } => return check(&url),
        Commands::Csp => {
            println!("{}", content_security_policy_connect_src());
            return Ok(());
        }
        command => {
            let persistence = JsonFilePersistence::new(&config.state_path);
            let state = persistence
                .load()
                .await
                .with_context(|| format!("Could not read saved state from {}", persistence.path().display()))?
                .unwrap_or_default();
            let store = Arc::new(WishListStore::with_state(state));
            let notifier: SyncCallback = if cli.quiet {
                NullNotifier.into_callback()
            } else {
                ConsoleNotifier::new(cli.verbose).into_callback()
            };
            let coordinator = SyncCoordinator::from_config(store.clone(), &config)?.with_callback(notifier);

            let mutated = match command {
                Commands::Update(args) => {
                    update(&coordinator, &config, args).await?;
                    true
                }
                Commands::Import { file, label } => {
                    import(&coordinator, &file, label).await?;
                    true
                }
                Commands::Clear => {
                    coordinator.clear();
                    true
                }
                Commands::Status => {
                    status(&store.snapshot());
                    false
                }
                Commands::Export { file } => {
                    export(&store.snapshot(), file.as_deref()).await?;
                    false
                }
                Commands::Check { .. } | Commands::Csp => false,
            };

            if mutated {
                persistence.save(&store.snapshot()).await?;
                debug!("State saved to {}", persistence.path().display());
            }
        }
    }

    Ok(())
}

/// What `update` should sync from
#[derive(Debug, Clone, PartialEq)]
enum UpdatePlan {
    /// An explicit URL or curated list
    Source(String),
    /// The saved source, or the configured default
    Configured,
    /// The configured source, only once the saved list is older than this
    IfStale(Duration),
}

fn plan_update(config: &SyncConfig, args: &UpdateArgs) -> UpdatePlan {
    if let Some(url) = &args.url {
        UpdatePlan::Source(url.clone())
    } else if args.voltron {
        UpdatePlan::Source(KnownSource::Voltron.url().to_string())
    } else if args.choosy_voltron {
        UpdatePlan::Source(KnownSource::ChoosyVoltron.url().to_string())
    } else if args.if_stale {
        let max_age = args
            .max_age
            .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
            .unwrap_or(config.max_age);
        UpdatePlan::IfStale(max_age)
    } else {
        UpdatePlan::Configured
    }
}

async fn sync_once(coordinator: &SyncCoordinator, plan: &UpdatePlan) -> Result<Option<SyncReport>, SyncError> {
    match plan {
        UpdatePlan::Source(source) => coordinator.sync_from_url(source).await.map(Some),
        UpdatePlan::Configured => coordinator.sync_configured().await.map(Some),
        UpdatePlan::IfStale(max_age) => coordinator.refresh_if_stale(*max_age).await,
    }
}

async fn update(coordinator: &SyncCoordinator, config: &SyncConfig, args: UpdateArgs) -> Result<()> {
    let plan = plan_update(config, &args);
    let retries = args.retries.unwrap_or(config.max_retries);
    let delays = (0..retries).map(|attempt| config.get_retry_delay(attempt));
    debug!("Update plan: {:?}", plan);

    let mut attempt = 0;
    let report = RetryIf::spawn(
        delays,
        || {
            attempt += 1;
            if attempt > 1 {
                info!("Retrying wish list update (attempt {}/{})", attempt, retries + 1);
            }
            sync_once(coordinator, &plan)
        },
        |error: &SyncError| error.is_recoverable(),
    )
    .await
    .map_err(describe)?;

    match report {
        Some(report) => {
            if let Some(title) = &report.title {
                println!("📋 {}", title);
            }
        }
        None => println!("⏭️ Wish list is up to date, nothing fetched"),
    }
    Ok(())
}

async fn import(coordinator: &SyncCoordinator, file: &Path, label: Option<String>) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Could not read {}", file.display()))?;
    let label = label.unwrap_or_else(|| LOCAL_FILE_SOURCE.to_string());

    let report = coordinator.sync_from_text(&raw, &label).await.map_err(describe)?;
    if let Some(title) = &report.title {
        println!("📋 {}", title);
    }
    Ok(())
}

fn check(url: &str) -> Result<()> {
    match check_source(url.trim()) {
        Ok(parsed) => {
            println!("✅ {} is an allowed wish list source", parsed);
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

fn status(state: &SyncState) {
    let source = if state.source.is_empty() {
        "(none)".to_string()
    } else {
        match KnownSource::from_source(&state.source) {
            Some(known) => format!("{} ({})", known.label(), state.source),
            None => state.source.clone(),
        }
    };
    println!("Source:       {}", source);

    let Some(updated) = state.last_updated else {
        println!("No wish list loaded");
        return;
    };

    let list = &state.current;
    println!("Last updated: {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(age) = state.age(chrono::Utc::now()) {
        println!("Age:          {}", format_age(age));
    }
    println!(
        "Rolls:        {} ({} wish, {} trash)",
        list.len(),
        list.wish_count(),
        list.trash_count()
    );
    if let Some(title) = &list.title {
        println!("Title:        {}", title);
    }
    if let Some(description) = &list.description {
        println!("Description:  {}", description);
    }
}

fn format_age(age: chrono::Duration) -> String {
    if age.num_days() > 0 {
        format!("{} days", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{} hours", age.num_hours())
    } else {
        format!("{} minutes", age.num_minutes().max(0))
    }
}

async fn export(state: &SyncState, file: Option<&Path>) -> Result<()> {
    let text = to_wish_list_text(&state.current);
    match file {
        Some(path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("Could not write {}", path.display()))?;
            println!("💾 Wrote {} rolls to {}", state.current.len(), path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

/// Flatten a sync error into the one-line message plus any suggestion
fn describe(error: SyncError) -> anyhow::Error {
    match error.suggestion() {
        Some(suggestion) => anyhow::anyhow!("{}\n💡 {}", error.user_message(), suggestion),
        None => anyhow::anyhow!(error.user_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: Option<&str>, voltron: bool, choosy_voltron: bool) -> UpdateArgs {
        UpdateArgs {
            url: url.map(str::to_string),
            voltron,
            choosy_voltron,
            retries: None,
            if_stale: false,
            max_age: None,
        }
    }

    #[test]
    fn test_plan_update_precedence() {
        let config = SyncConfig::default();

        let explicit = "https://gist.githubusercontent.com/me/1/raw/list.txt";
        assert_eq!(
            plan_update(&config, &args(Some(explicit), false, false)),
            UpdatePlan::Source(explicit.to_string())
        );
        assert_eq!(
            plan_update(&config, &args(None, false, true)),
            UpdatePlan::Source(KnownSource::ChoosyVoltron.url().to_string())
        );
        assert_eq!(plan_update(&config, &args(None, false, false)), UpdatePlan::Configured);
    }

    #[test]
    fn test_plan_update_if_stale_uses_max_age() {
        let config = SyncConfig::default();
        let mut stale = args(None, false, false);
        stale.if_stale = true;
        assert_eq!(plan_update(&config, &stale), UpdatePlan::IfStale(config.max_age));

        stale.max_age = Some(2);
        assert_eq!(plan_update(&config, &stale), UpdatePlan::IfStale(Duration::from_secs(7200)));
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(chrono::Duration::minutes(5)), "5 minutes");
        assert_eq!(format_age(chrono::Duration::hours(3)), "3 hours");
        assert_eq!(format_age(chrono::Duration::days(2)), "2 days");
    }
}
