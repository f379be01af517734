use crate::error::{BdtiError, Result};
use crate::services::channel::CommandChannel;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub host_network: bool,
    pub mounts: Vec<VolumeMount>,
}

impl RunSpec {
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if self.host_network {
            args.push("--network=host".to_string());
        }
        args.push("-d".to_string());
        for m in &self.mounts {
            args.push("-v".to_string());
            let mut volume = format!("{}:{}", m.host_path, m.container_path);
            if m.read_only {
                volume.push_str(":ro");
            }
            args.push(volume);
        }
        args.push("--name".to_string());
        args.push(self.name.clone());
        args.push(self.image.clone());
        args
    }
}

pub trait ContainerRuntime {
    /// Image ids for `reference`, most recent first.
    fn list_images(&self, reference: &str) -> Result<Vec<String>>;
    fn list_containers(&self) -> Result<Vec<ContainerInfo>>;
    fn stop_container(&self, id: &str) -> Result<()>;
    fn run_container(&self, spec: &RunSpec) -> Result<String>;
}

pub struct DockerCli {
    channel: Rc<dyn CommandChannel>,
    sudo: bool,
}

impl DockerCli {
    pub fn new(channel: Rc<dyn CommandChannel>) -> Self {
        Self {
            channel,
            sudo: true,
        }
    }

    pub fn without_sudo(mut self) -> Self {
        self.sudo = false;
        self
    }

    fn docker(&self, args: &[&str]) -> Result<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if self.sudo {
            argv.push("sudo".to_string());
        }
        argv.push("docker".to_string());
        argv.extend(args.iter().map(|a| a.to_string()));

        let out = self.channel.execute(&argv)?;
        if !out.success() {
            return Err(BdtiError::CommandFailed {
                command: argv.join(" "),
                status: out.status,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout)
    }
}

pub fn parse_image_ids(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|l| l.trim().trim_matches('"'))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_containers(stdout: &str) -> Vec<ContainerInfo> {
    stdout
        .lines()
        .map(|l| l.trim().trim_matches('"'))
        .filter_map(|l| l.split_once('|'))
        .map(|(id, image)| ContainerInfo {
            id: id.trim().to_string(),
            image: image.trim().to_string(),
        })
        .filter(|c| !c.id.is_empty())
        .collect()
}

/// Containers created from `image_id` or from any tag of `image_name`.
pub fn agent_containers<'a>(
    containers: &'a [ContainerInfo],
    image_id: &str,
    image_name: &str,
) -> Vec<&'a ContainerInfo> {
    containers
        .iter()
        .filter(|c| c.image == image_id || c.image.contains(image_name))
        .collect()
}

impl ContainerRuntime for DockerCli {
    fn list_images(&self, reference: &str) -> Result<Vec<String>> {
        let out = self.docker(&["images", reference, "--format", "{{.ID}}"])?;
        Ok(parse_image_ids(&out))
    }

    fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let out = self.docker(&["ps", "--all", "--format", "{{.ID}}|{{.Image}}"])?;
        Ok(parse_containers(&out))
    }

    fn stop_container(&self, id: &str) -> Result<()> {
        self.docker(&["rm", "-f", id])?;
        tracing::info!(container = id, "container removed");
        Ok(())
    }

    fn run_container(&self, spec: &RunSpec) -> Result<String> {
        let args = spec.docker_args();
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.docker(&refs)?;
        let id = out.trim().to_string();
        tracing::info!(container = %id, image = %spec.image, name = %spec.name, "container started");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::channel::CommandOutput;
    use std::cell::RefCell;
    use std::path::Path;

    struct Scripted {
        calls: RefCell<Vec<Vec<String>>>,
        stdout: String,
    }

    impl CommandChannel for Scripted {
        fn execute(&self, argv: &[String]) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(argv.to_vec());
            Ok(CommandOutput {
                stdout: self.stdout.clone(),
                ..Default::default()
            })
        }
        fn upload(&self, _: &Path, _: &Path) -> Result<()> {
            Ok(())
        }
        fn verify(&self) -> Result<()> {
            Ok(())
        }
        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    #[test]
    fn container_listing_matches_id_or_image_name() {
        let listed = parse_containers(
            "\"a1|fiware/cygnus-ngsi:1.18.0\"\nb2|postgres:15\nc3|5f1e2d\n\n",
        );
        assert_eq!(listed.len(), 3);
        let hits = agent_containers(&listed, "5f1e2d", "fiware/cygnus-ngsi");
        let ids: Vec<_> = hits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "c3"]);
    }

    #[test]
    fn run_args_mount_artifacts() {
        let spec = RunSpec {
            name: "cygnus".into(),
            image: "5f1e2d".into(),
            host_network: true,
            mounts: vec![
                VolumeMount {
                    host_path: "/var/tmp/agent.conf".into(),
                    container_path: "/opt/apache-flume/conf/agent.conf".into(),
                    read_only: true,
                },
                VolumeMount {
                    host_path: "/var/tmp/grouping_rules.conf".into(),
                    container_path: "/opt/apache-flume/conf/grouping_rules.conf".into(),
                    read_only: false,
                },
            ],
        };
        assert_eq!(
            spec.docker_args().join(" "),
            "run --network=host -d \
             -v /var/tmp/agent.conf:/opt/apache-flume/conf/agent.conf:ro \
             -v /var/tmp/grouping_rules.conf:/opt/apache-flume/conf/grouping_rules.conf \
             --name cygnus 5f1e2d"
        );
    }

    #[test]
    fn docker_calls_go_through_sudo() {
        let channel = Rc::new(Scripted {
            calls: RefCell::new(Vec::new()),
            stdout: "5f1e2d\n".into(),
        });
        let docker = DockerCli::new(channel.clone());
        assert_eq!(docker.list_images("fiware/cygnus-ngsi").unwrap(), vec!["5f1e2d"]);
        let calls = channel.calls.borrow();
        assert_eq!(calls[0][0..3], ["sudo", "docker", "images"]);
    }
}
