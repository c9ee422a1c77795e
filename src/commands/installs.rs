use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::config::Config;
use crate::launcher::resolver::InstallManager;
use crate::models::{GameInstall, LoaderSpec, ModFile, ShaderPack};
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct AddInstallOptions {
    pub name: String,
    /// Version id, or `latest` / `latest-snapshot`
    pub version: String,
    /// `Some(None)` selects the newest stable loader
    pub loader: Option<Option<String>>,
    pub mods: Vec<String>,
    pub shaderpacks: Vec<String>,
    pub extra_arguments: Vec<String>,
    pub wrap_main_class: bool,
}

pub fn list_installs(store: &Store, json: bool) -> Result<()> {
    let installs = store.game_installs();
    if json {
        println!("{}", serde_json::to_string_pretty(&installs)?);
        return Ok(());
    }
    if installs.is_empty() {
        println!("{}", "No installs configured".yellow());
        return Ok(());
    }
    for install in &installs {
        let version = install
            .version_manifest
            .as_ref()
            .map(|m| m.id.as_str())
            .unwrap_or("?");
        let loader = match &install.loader {
            Some(LoaderSpec { version: Some(v) }) => format!(" + loader {v}"),
            Some(LoaderSpec { version: None }) => " + loader (latest)".to_string(),
            None => String::new(),
        };
        println!(
            "{}  {}{}  {}",
            install.name.bright_white().bold(),
            version.cyan(),
            loader,
            install.uuid.as_deref().unwrap_or("").dimmed()
        );
        if !install.mods.is_empty() {
            println!("    {} mods, {} shader packs", install.mods.len(), install.shaderpacks.len());
        }
    }
    Ok(())
}

/// Create an install for a version from the remote index and persist it.
pub async fn add_install(config: &Config, store: &mut Store, options: AddInstallOptions) -> Result<()> {
    if store.find_install(&options.name).is_some() {
        bail!("An install named '{}' already exists", options.name);
    }

    let manager = InstallManager::new(config);
    let index = manager.fetch_version_index().await?;
    let entry = index
        .find(&options.version)
        .cloned()
        .with_context(|| format!("Unknown game version: {}", options.version))?;

    let mut install = GameInstall {
        name: options.name,
        version_manifest: Some(entry),
        loader: options.loader.map(|version| LoaderSpec { version }),
        mods: options
            .mods
            .into_iter()
            .map(|url| ModFile {
                url,
                extra_files: Default::default(),
            })
            .collect(),
        shaderpacks: options.shaderpacks.into_iter().map(|url| ShaderPack { url }).collect(),
        extra_arguments: options.extra_arguments,
        wrap_main_class: options.wrap_main_class,
        ..Default::default()
    };

    let path = manager.setup_install(&mut install).await?;
    store.upsert_install(&install)?;

    println!(
        "{} {} at {}",
        "✓ Created install".green(),
        install.name.bright_white().bold(),
        path.display()
    );
    Ok(())
}

/// Resolve and download everything an install needs without launching it.
pub async fn resolve_install(config: &Config, store: &mut Store, name: &str, json: bool) -> Result<()> {
    let mut install = store
        .find_install(name)
        .with_context(|| format!("No install named '{name}'"))?;

    let manager = InstallManager::new(config);
    let resolved = manager.update_install(&mut install).await?;
    store.upsert_install(&install)?;

    if json {
        let output = serde_json::json!({
            "install": install,
            "mainClass": resolved.details.main_class,
            "libraries": resolved.details.libraries.len(),
            "downloaded": resolved.report.downloaded,
            "skipped": resolved.report.skipped,
            "failures": resolved
                .report
                .failures
                .iter()
                .map(|f| serde_json::json!({"url": f.url, "error": f.error}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} {}", "Resolved".bold(), install.name.bright_white().bold());
    println!("  main class   {}", resolved.details.main_class.cyan());
    println!("  libraries    {}", resolved.details.libraries.len());
    println!(
        "  downloads    {} fetched, {} up to date",
        resolved.report.downloaded.to_string().green(),
        resolved.report.skipped
    );
    for failure in &resolved.report.failures {
        println!("  {} {}: {}", "✗".red(), failure.url, failure.error);
    }
    Ok(())
}
