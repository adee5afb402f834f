use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use env_logger::Builder;
use log::{LevelFilter, info};

use odb_core::differ::{Diff, diff_all, mark_replacements};
use odb_core::provider::{Provider, ProviderError};
use odb_core::resource::{Resource, ResourceId, State, Value};
use odb_provider_aws::{OdbProvider, Phase, ResourceKind};

mod config;
mod state;

use config::{ConfigFile, DEFAULT_CONFIG_FILE, has_unresolved_refs, resolve_resource};
use state::{LocalState, StateFile};

#[derive(Parser)]
#[command(name = "odb")]
#[command(about = "Provision Oracle Database@AWS infrastructure", long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long = "log-level", default_value = "warn", global = true)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show execution plan without applying changes
    Plan {
        /// Path to the configuration file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },
    /// Create and update resources to match the configuration
    Apply {
        /// Path to the configuration file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },
    /// Destroy all resources defined in the configuration file
    Destroy {
        /// Path to the configuration file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Adopt an existing remote resource into the state file
    Import {
        /// Resource type (e.g., odb.cloud_vm_cluster)
        resource_type: String,
        /// Name of the resource in the configuration
        name: String,
        /// Remote identifier
        identifier: String,

        /// Path to the configuration file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Show the current state of one remote resource
    Read {
        /// Resource type (e.g., odb.network)
        resource_type: String,
        /// Remote identifier
        identifier: String,

        /// Path to the configuration file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Block until a resource settles after an operation started elsewhere
    Wait {
        /// Resource type (e.g., odb.cloud_vm_cluster)
        resource_type: String,
        /// Remote identifier
        identifier: String,

        /// Lifecycle phase to wait for
        #[arg(long = "for", value_enum)]
        phase: WaitFor,

        /// Path to the configuration file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WaitFor {
    Created,
    Updated,
    Deleted,
}

impl From<WaitFor> for Phase {
    fn from(value: WaitFor) -> Self {
        match value {
            WaitFor::Created => Phase::Created,
            WaitFor::Updated => Phase::Updated,
            WaitFor::Deleted => Phase::Deleted,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.log_level);

    let result = match cli.command {
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file } => run_apply(&file).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::Import {
            resource_type,
            name,
            identifier,
            config,
        } => run_import(&config, &resource_type, &name, &identifier).await,
        Commands::Read {
            resource_type,
            identifier,
            config,
        } => run_read(&config, &resource_type, &identifier).await,
        Commands::Wait {
            resource_type,
            identifier,
            phase,
            config,
        } => run_wait(&config, &resource_type, &identifier, phase.into()).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => Builder::from_default_env().init(),
        None => Builder::new()
            .filter(Some("odb"), level)
            .filter(Some("odb_core"), level)
            .filter(Some("odb_provider_aws"), level)
            .init(),
    }
}

/// Everything a plan, apply or destroy works from
struct Workspace {
    resources: Vec<Resource>,
    provider: OdbProvider,
    backend: LocalState,
    state: StateFile,
}

impl Workspace {
    async fn load(file: &Path) -> Result<Self> {
        let config = ConfigFile::load(file)?;
        let resources = config.resources()?;
        let provider = OdbProvider::new(&config.provider.region, config.provider.wait).await;
        let backend = LocalState::beside(file);
        let state = backend.read()?;
        Ok(Self {
            resources,
            provider,
            backend,
            state,
        })
    }

    /// Read the current state of every declared resource, in declaration
    /// order so that data sources can refer to earlier resources
    async fn refresh(&self) -> Result<Refreshed> {
        let mut refreshed = Refreshed::default();

        for resource in &self.resources {
            let resolved = self
                .provider
                .normalize(&resolve_resource(resource, &refreshed.bindings));
            let current = if !resource.is_data_source() {
                let identifier = self.state.identifier(&resource.id);
                self.provider
                    .read(&resource.id, identifier)
                    .await
                    .with_context(|| format!("Failed to read {}", resource.id))?
            } else if has_unresolved_refs(&resolved) {
                State::not_found(resource.id.clone())
            } else {
                self.provider
                    .read_data_source(&resolved)
                    .await
                    .with_context(|| format!("Failed to read {}", resource.id))?
            };

            refreshed.record(&resolved, &current);
            refreshed.current.insert(resource.id.clone(), current);
            refreshed.resolved.push(resolved);
        }

        Ok(refreshed)
    }

    /// Changes needed to make the remote side match the configuration
    fn plan(&self, refreshed: &Refreshed) -> Vec<Diff> {
        mark_replacements(
            diff_all(&refreshed.resolved, &refreshed.current),
            |id, attribute| self.provider.requires_replacement(id, attribute),
        )
    }
}

/// Current states plus the attributes references resolve against
#[derive(Default)]
struct Refreshed {
    resolved: Vec<Resource>,
    current: HashMap<ResourceId, State>,
    bindings: HashMap<String, HashMap<String, Value>>,
}

impl Refreshed {
    /// Make `resource`'s attributes available to references, filling in
    /// what only the remote state knows (such as `id`)
    fn record(&mut self, resource: &Resource, state: &State) {
        let mut attrs = resource.attributes.clone();
        if state.exists {
            for (k, v) in &state.attributes {
                attrs.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        self.bindings.insert(resource.id.to_string(), attrs);
    }
}

async fn run_plan(file: &Path) -> Result<()> {
    let workspace = Workspace::load(file).await?;
    let refreshed = workspace.refresh().await?;
    let diffs = workspace.plan(&refreshed);
    print_plan(&diffs);
    Ok(())
}

async fn run_apply(file: &Path) -> Result<()> {
    let mut workspace = Workspace::load(file).await?;
    let mut refreshed = workspace.refresh().await?;
    let diffs = workspace.plan(&refreshed);

    if !diffs.iter().any(Diff::is_change) {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&diffs);
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let mut success_count = 0;
    let mut failure_count = 0;

    for diff in &diffs {
        let result = apply_diff(&workspace.provider, diff, &refreshed.bindings).await;
        match result {
            Ok(None) => {}
            Ok(Some((resolved, state))) => {
                println!("  {} {}", "✓".green(), format_diff(diff));
                success_count += 1;

                if let Some(identifier) = &state.identifier {
                    workspace.state.upsert(&state.id, identifier.clone());
                    workspace.backend.write(&mut workspace.state)?;
                }
                refreshed.record(&resolved, &state);
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_diff(diff), failure_message(&e));
                failure_count += 1;
            }
        }
    }

    println!();
    if failure_count > 0 {
        bail!(
            "Apply failed. {} succeeded, {} failed.",
            success_count,
            failure_count
        );
    }
    println!(
        "{}",
        format!("Apply complete! {} changes applied.", success_count)
            .green()
            .bold()
    );
    Ok(())
}

/// Carry out one planned change. Returns the resolved resource and its
/// new state, or `None` when there was nothing to do.
async fn apply_diff(
    provider: &dyn Provider,
    diff: &Diff,
    bindings: &HashMap<String, HashMap<String, Value>>,
) -> Result<Option<(Resource, State)>> {
    // Re-resolve so that identifiers of resources created earlier are used
    let resolve = |resource: &Resource| -> Result<Resource> {
        let resolved = provider.normalize(&resolve_resource(resource, bindings));
        if has_unresolved_refs(&resolved) {
            bail!("unresolved reference");
        }
        Ok(resolved)
    };

    match diff {
        Diff::Create(resource) => {
            let resolved = resolve(resource)?;
            let state = provider.create(&resolved).await?;
            Ok(Some((resolved, state)))
        }
        Diff::Update { id, from, to, .. } => {
            let resolved = resolve(to)?;
            let identifier = from.identifier.as_deref().context("no identifier recorded")?;
            let state = provider.update(id, identifier, from, &resolved).await?;
            Ok(Some((resolved, state)))
        }
        Diff::Replace { id, from, to, .. } => {
            let resolved = resolve(to)?;
            let identifier = from.identifier.as_deref().context("no identifier recorded")?;
            info!("Replacing {} ({})", id, identifier);
            provider.delete(id, identifier).await?;
            let state = provider.create(&resolved).await?;
            Ok(Some((resolved, state)))
        }
        Diff::NoChange(_) => Ok(None),
    }
}

/// Error text for a failed change. A timeout leaves the resource still
/// settling, so point at `odb wait`.
fn failure_message(e: &anyhow::Error) -> String {
    match e.downcast_ref::<ProviderError>() {
        Some(err) if err.is_timeout() => format!(
            "{:#} (the operation may still complete; check with `odb wait`)",
            e
        ),
        _ => format!("{:#}", e),
    }
}

/// Managed resources that exist, dependents first
fn destroy_order<'a>(
    resources: &'a [Resource],
    current: &HashMap<ResourceId, State>,
) -> Vec<(&'a Resource, String)> {
    resources
        .iter()
        .rev()
        .filter(|r| !r.is_data_source())
        .filter_map(|r| {
            let state = current.get(&r.id).filter(|s| s.exists)?;
            Some((r, state.identifier.clone()?))
        })
        .collect()
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<()> {
    let mut workspace = Workspace::load(file).await?;
    let refreshed = workspace.refresh().await?;

    let resources_to_destroy = destroy_order(&workspace.resources, &refreshed.current);
    if resources_to_destroy.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for (resource, identifier) in &resources_to_destroy {
        println!("  {} {} ({})", "-".red().bold(), resource.id, identifier);
    }
    println!();
    println!(
        "Plan: {} to destroy.",
        resources_to_destroy.len().to_string().red()
    );
    println!();

    if !auto_approve && !confirm("Do you really want to destroy all resources?")? {
        println!();
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let mut success_count = 0;
    let mut failure_count = 0;

    for (resource, identifier) in resources_to_destroy {
        match workspace.provider.delete(&resource.id, &identifier).await {
            Ok(()) => {
                println!("  {} Delete {}", "✓".green(), resource.id);
                success_count += 1;
                workspace.state.remove(&resource.id);
                workspace.backend.write(&mut workspace.state)?;
            }
            Err(e) => {
                println!("  {} Delete {} - {}", "✗".red(), resource.id, e);
                failure_count += 1;
            }
        }
    }

    println!();
    if failure_count > 0 {
        bail!(
            "Destroy failed. {} succeeded, {} failed.",
            success_count,
            failure_count
        );
    }
    println!(
        "{}",
        format!("Destroy complete! {} resources destroyed.", success_count)
            .green()
            .bold()
    );
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    println!("{}", question.yellow().bold());
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout())?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "yes")
}

async fn run_import(
    config_path: &Path,
    resource_type: &str,
    name: &str,
    identifier: &str,
) -> Result<()> {
    let kind = ResourceKind::from_resource_type(resource_type)
        .with_context(|| format!("Unknown resource type: {}", resource_type))?;
    if kind.is_data_source() {
        bail!("{} is a data source and can't be imported", resource_type);
    }

    let config = ConfigFile::load(config_path)?;
    let id = ResourceId::new(resource_type, name);
    if !config.resources()?.iter().any(|r| r.id == id) {
        bail!("{} is not declared in {}", id, config_path.display());
    }

    let provider = OdbProvider::new(&config.provider.region, config.provider.wait).await;
    let backend = LocalState::beside(config_path);
    let mut state = backend.read()?;

    let remote = import_resource(&provider, &mut state, &id, identifier).await?;
    backend.write(&mut state)?;

    println!("{} Imported {} ({})", "✓".green(), id, identifier);
    print_state(&remote);
    Ok(())
}

/// Record `identifier` for `id` once the remote resource is confirmed to
/// exist
async fn import_resource(
    provider: &dyn Provider,
    state: &mut StateFile,
    id: &ResourceId,
    identifier: &str,
) -> Result<State> {
    if let Some(existing) = state.identifier(id)
        && existing != identifier
    {
        bail!("{} is already managed as {}", id, existing);
    }

    let remote = provider
        .read(id, Some(identifier))
        .await
        .with_context(|| format!("Failed to read {}", id))?;
    if !remote.exists {
        bail!("{} {} not found", id.resource_type, identifier);
    }

    state.upsert(id, remote.identifier.as_deref().unwrap_or(identifier));
    Ok(remote)
}

/// Provider and resource id for an ad-hoc command on one remote resource
async fn single_resource(
    config: &Path,
    resource_type: &str,
    identifier: &str,
) -> Result<(OdbProvider, ResourceId)> {
    if ResourceKind::from_resource_type(resource_type).is_none() {
        bail!("Unknown resource type: {}", resource_type);
    }
    let config = ConfigFile::load(config)?;
    let provider = OdbProvider::new(&config.provider.region, config.provider.wait).await;
    Ok((provider, ResourceId::new(resource_type, identifier)))
}

async fn run_read(config: &Path, resource_type: &str, identifier: &str) -> Result<()> {
    let (provider, id) = single_resource(config, resource_type, identifier).await?;
    let state = provider.read(&id, Some(identifier)).await?;

    if !state.exists {
        println!("{} {} not found", resource_type, identifier.yellow());
        return Ok(());
    }
    print_state(&state);
    Ok(())
}

async fn run_wait(
    config: &Path,
    resource_type: &str,
    identifier: &str,
    phase: Phase,
) -> Result<()> {
    let (provider, id) = single_resource(config, resource_type, identifier).await?;
    info!("Waiting for {} to be {}", id, phase);
    let state = provider.wait_for(&id, identifier, phase).await?;

    println!(
        "{} {} {} is {}",
        "✓".green(),
        resource_type,
        identifier,
        phase
    );
    if state.exists {
        print_state(&state);
    }
    Ok(())
}

fn print_state(state: &State) {
    let mut keys: Vec<_> = state.attributes.keys().collect();
    keys.sort();
    for key in keys {
        println!("  {}: {}", key, format_value(&state.attributes[key]));
    }
}

fn print_plan(diffs: &[Diff]) {
    let changes: Vec<&Diff> = diffs.iter().filter(|d| d.is_change()).collect();
    if changes.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    let mut create_count = 0;
    let mut update_count = 0;
    let mut replace_count = 0;

    for diff in &changes {
        match diff {
            Diff::Create(r) => {
                create_count += 1;
                println!("  {} {}", "+".green().bold(), r.id.to_string().cyan().bold());
                let mut keys: Vec<_> = r
                    .attributes
                    .keys()
                    .filter(|k| !k.starts_with('_'))
                    .collect();
                keys.sort();
                for key in keys {
                    println!(
                        "      {}: {}",
                        key,
                        format_value(&r.attributes[key]).green()
                    );
                }
            }
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                update_count += 1;
                println!("  {} {}", "~".yellow().bold(), id.to_string().cyan().bold());
                for key in changed_attributes {
                    let old = from
                        .attributes
                        .get(key)
                        .map(format_value)
                        .unwrap_or_else(|| "(none)".to_string());
                    let new = to.attributes.get(key).map(format_value).unwrap_or_default();
                    println!(
                        "      {}: {} → {}",
                        key,
                        old.red(),
                        new.green()
                    );
                }
            }
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
                forced_by,
            } => {
                replace_count += 1;
                println!("  {} {}", "-/+".red().bold(), id.to_string().cyan().bold());
                for key in changed_attributes {
                    let old = from
                        .attributes
                        .get(key)
                        .map(format_value)
                        .unwrap_or_else(|| "(none)".to_string());
                    let new = to.attributes.get(key).map(format_value).unwrap_or_default();
                    let note = if forced_by.contains(key) {
                        " (forces replacement)".red().to_string()
                    } else {
                        String::new()
                    };
                    println!(
                        "      {}: {} → {}{}",
                        key,
                        old.red(),
                        new.green(),
                        note
                    );
                }
            }
            Diff::NoChange(_) => {}
        }
    }

    println!();
    println!(
        "Plan: {} to create, {} to update, {} to replace.",
        create_count.to_string().green(),
        update_count.to_string().yellow(),
        replace_count.to_string().red()
    );
}

fn format_diff(diff: &Diff) -> String {
    match diff {
        Diff::Create(r) => format!("Create {}", r.id),
        Diff::Update { id, .. } => format!("Update {}", id),
        Diff::Replace { id, .. } => format!("Replace {}", id),
        Diff::NoChange(id) => format!("Keep {}", id),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let strs: Vec<_> = entries
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
    }
}
