use std::path::Path;
use std::process::Command;

/// Returns `true` if a Docker daemon looks reachable.
///
/// Container fixtures check this before starting anything so that a
/// missing daemon surfaces as a clear setup error.
pub fn docker_available() -> bool {
    docker_available_with_host(std::env::var("DOCKER_HOST").ok())
}

fn docker_available_with_host(host: Option<String>) -> bool {
    if let Some(host) = host {
        if let Some(path) = host.strip_prefix("unix://") {
            return Path::new(path).exists();
        }
        return true;
    }

    Path::new("/var/run/docker.sock").exists()
        || Command::new("docker")
            .arg("info")
            .output()
            .is_ok_and(|output| output.status.success())
}
