//! # registryctl
//!
//! Read-only command-line view of the `DockerRegistry` resources the
//! operator manages.
//!
//! ```bash
//! # List all DockerRegistry resources with their state and served flag
//! registryctl list
//!
//! # Show one resource, or the served instance if it does not exist
//! registryctl status default --namespace kyma-system
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;
use registry_operator::{
    crd::Condition,
    state::resolve_registry_or_served,
    store::{KubeRegistryStore, ObjectKey, RegistryStore},
    DockerRegistry,
};

/// Registry Operator CLI
#[derive(Parser)]
#[command(name = "registryctl")]
#[command(about = "Inspect DockerRegistry resources managed by the registry operator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List DockerRegistry resources
    List,
    /// Show status and conditions of a DockerRegistry resource
    Status {
        /// Name of the DockerRegistry resource
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider was already installed");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "registryctl=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;
    let store = KubeRegistryStore::new(client);

    match cli.command {
        Commands::List => list_command(&store, cli.namespace.as_deref()).await,
        Commands::Status { name } => status_command(&store, name, cli.namespace).await,
    }
}

async fn list_command(store: &KubeRegistryStore, namespace: Option<&str>) -> Result<()> {
    let registries: Vec<DockerRegistry> = store
        .list()
        .await
        .context("Failed to list DockerRegistry resources")?
        .into_iter()
        .filter(|r| namespace.is_none() || r.metadata.namespace.as_deref() == namespace)
        .collect();

    if registries.is_empty() {
        println!("No DockerRegistry resources found.");
        return Ok(());
    }

    println!("{:<30} {:<20} {:<12} {:<8}", "NAME", "NAMESPACE", "STATE", "SERVED");
    println!("{}", "-".repeat(73));

    for registry in registries {
        let name = registry.metadata.name.as_deref().unwrap_or("<unknown>");
        let ns = registry.metadata.namespace.as_deref().unwrap_or("<unknown>");
        let state = match registry.state().as_str() {
            "" => "-",
            s => s,
        };
        let served = registry
            .served()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!("{name:<30} {ns:<20} {state:<12} {served:<8}");
    }

    Ok(())
}

async fn status_command(
    store: &KubeRegistryStore,
    name: String,
    namespace: Option<String>,
) -> Result<()> {
    let ns = namespace.unwrap_or_else(|| "default".to_string());
    let key = ObjectKey::new(ns, name);

    let Some(registry) = resolve_registry_or_served(store, &key)
        .await
        .with_context(|| format!("Failed to get DockerRegistry '{key}'"))?
    else {
        println!("DockerRegistry '{key}' not found and no served instance exists.");
        return Ok(());
    };

    let resolved = ObjectKey::from_object(&registry);
    if resolved != key {
        println!("DockerRegistry '{key}' not found, showing served instance '{resolved}'.");
        println!();
    }

    println!("Name:      {}", resolved.name);
    println!("Namespace: {}", resolved.namespace);
    println!("State:     {}", registry.state());
    println!(
        "Served:    {}",
        registry
            .served()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "<unset>".to_string())
    );
    if registry.metadata.deletion_timestamp.is_some() {
        println!("Deleting:  true");
    }

    let conditions = registry
        .status
        .as_ref()
        .map(|s| s.conditions.as_slice())
        .unwrap_or_default();
    if conditions.is_empty() {
        return Ok(());
    }

    println!();
    println!("Conditions:");
    for condition in conditions {
        print_condition(condition);
    }

    Ok(())
}

fn print_condition(condition: &Condition) {
    println!(
        "  - {} = {:?} ({})",
        condition.r#type, condition.status, condition.reason
    );
    if !condition.message.is_empty() {
        println!("    Message: {}", condition.message);
    }
    if let Some(time) = &condition.last_transition_time {
        println!("    Last Transition: {time}");
    }
}
