use serde::Serialize;

use crate::cli::Runtime;
use crate::error::{CliError, Result};
use crate::store::{EnclaveConfig, Scope, ScopeStore};

/// One stored scope as shown to the user; the token itself never leaves the store
#[derive(Debug, Serialize, PartialEq, Eq)]
struct ScopeSummary {
    scope: Scope,
    token: String,
    api_host: String,
    dashboard_host: String,
    verify_tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    enclave: Option<EnclaveConfig>,
}

fn summarize(store: &ScopeStore) -> Vec<ScopeSummary> {
    store
        .all()
        .map(|(scope, record)| ScopeSummary {
            scope: scope.clone(),
            token: record.fingerprint(),
            api_host: record.api_host.clone(),
            dashboard_host: record.dashboard_host.clone(),
            verify_tls: record.verify_tls,
            enclave: store.enclave(scope).cloned(),
        })
        .collect()
}

pub fn list(runtime: &Runtime, json: bool) -> Result<()> {
    let ctx = runtime.context()?;
    let summaries = summarize(ctx.store());

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No scopes configured. Run `keyscope login` to add one.");
        return Ok(());
    }

    println!("Configured scopes ({}):\n", ctx.path().display());
    for summary in summaries {
        println!("  {}", summary.scope);
        println!("    token: {} ({})", summary.token, summary.api_host);
        if !summary.verify_tls {
            println!("    tls verification: disabled");
        }
        if let Some(enclave) = summary.enclave {
            println!(
                "    enclave: project={} config={}",
                enclave.project.as_deref().unwrap_or("-"),
                enclave.config.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}

/// Merge the given fields into the scope's binding, keeping fields not given
fn apply_enclave(
    store: &mut ScopeStore,
    scope: Scope,
    project: Option<String>,
    config: Option<String>,
) -> Result<EnclaveConfig> {
    if project.is_none() && config.is_none() {
        return Err(CliError::MissingValue("project or config"));
    }

    let mut binding = store.enclave(&scope).cloned().unwrap_or_default();
    if project.is_some() {
        binding.project = project;
    }
    if config.is_some() {
        binding.config = config;
    }
    store.set_enclave(scope, binding.clone());
    Ok(binding)
}

pub fn enclave(
    runtime: &Runtime,
    project: Option<String>,
    config: Option<String>,
    scope: &str,
) -> Result<()> {
    let mut ctx = runtime.context()?;
    let scope = runtime.scope(scope)?;

    let binding = apply_enclave(ctx.store_mut(), scope.clone(), project, config)?;
    ctx.persist()?;

    println!("✓ Enclave config saved for {}", scope);
    if let Some(project) = &binding.project {
        println!("  project: {}", project);
    }
    if let Some(config) = &binding.config {
        println!("  config: {}", config);
    }

    Ok(())
}
