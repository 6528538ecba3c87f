//! Docker commands for building and running deployments

use std::path::Path;

use crate::deploy::command::CommandSpec;
use crate::models::deployment::DeploymentName;

/// Force-remove a container, used as best-effort cleanup
pub fn remove_container(name: &DeploymentName) -> CommandSpec {
    CommandSpec::new("docker").args(["rm", "-f", name.as_str()])
}

/// Force-remove an image, used as best-effort cleanup
pub fn remove_image(name: &DeploymentName) -> CommandSpec {
    CommandSpec::new("docker").args(["rmi", "-f", name.as_str()])
}

/// Build the repository in `context` and tag the image with the deployment name
pub fn build(name: &DeploymentName, dockerfile: &str, context: &Path) -> CommandSpec {
    CommandSpec::new("docker")
        .args(["build", "-f", dockerfile, "-t", name.as_str(), "."])
        .current_dir(context)
}

/// Print the image's exposed ports as JSON, e.g. `{"3000/tcp":{}}`
pub fn inspect_exposed_ports(name: &DeploymentName) -> CommandSpec {
    CommandSpec::new("docker").args([
        "inspect",
        "--format",
        "{{json .Config.ExposedPorts}}",
        name.as_str(),
    ])
}

/// Start a detached container publishing every port on the same host port
pub fn run(name: &DeploymentName, ports: &[String]) -> CommandSpec {
    let mut spec = CommandSpec::new("docker").args(["run", "-d", "--name", name.as_str()]);
    for port in ports {
        spec = spec.arg("-p").arg(format!("{}:{}", port, port));
    }
    spec.arg(name.as_str())
}

/// Collect every run of ASCII digits in the inspect output, in order.
///
/// This is a text heuristic rather than a parse: the inspect template above
/// only prints port keys, but any other number in the output would be picked
/// up as a port too.
pub fn detect_ports(raw: &str) -> Vec<String> {
    let mut ports = Vec::new();
    let mut current = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            ports.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        ports.push(current);
    }
    ports
}
