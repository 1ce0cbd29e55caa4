//! # CRD Generator
//!
//! Prints the `DockerRegistry` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/dockerregistry.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use registry_operator::DockerRegistry;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&DockerRegistry::crd())?);
    Ok(())
}
