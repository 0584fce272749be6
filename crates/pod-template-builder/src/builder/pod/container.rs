use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Probe, ResourceRequirements, SecurityContext, VolumeMount,
};

/// A single edit to a [`Container`], usable as the inner editor of the
/// by-name and by-index pod modifications.
///
/// Container edits are total, none of them can fail.
pub type ContainerModification = Box<dyn Fn(&mut Container)>;

/// Folds a list of editors into a single one, applied in the order given.
pub fn apply(container_fns: impl IntoIterator<Item = ContainerModification>) -> ContainerModification {
    let container_fns: Vec<ContainerModification> = container_fns.into_iter().collect();
    Box::new(move |container| {
        for container_fn in &container_fns {
            container_fn(container);
        }
    })
}

/// An editor that leaves the container untouched.
pub fn noop() -> ContainerModification {
    Box::new(|_| {})
}

pub fn with_name(name: impl Into<String>) -> ContainerModification {
    let name = name.into();
    Box::new(move |container| container.name = name.clone())
}

pub fn with_image(image: impl Into<String>) -> ContainerModification {
    let image = image.into();
    Box::new(move |container| container.image = Some(image.clone()))
}

pub fn with_image_pull_policy(image_pull_policy: impl Into<String>) -> ContainerModification {
    let image_pull_policy = image_pull_policy.into();
    Box::new(move |container| container.image_pull_policy = Some(image_pull_policy.clone()))
}

pub fn with_command(command: Vec<String>) -> ContainerModification {
    Box::new(move |container| container.command = Some(command.clone()))
}

pub fn with_args(args: Vec<String>) -> ContainerModification {
    Box::new(move |container| container.args = Some(args.clone()))
}

/// Appends one name/value environment variable.
pub fn with_env_var(name: impl Into<String>, value: impl Into<String>) -> ContainerModification {
    let env_var = EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..EnvVar::default()
    };
    Box::new(move |container| {
        container
            .env
            .get_or_insert_with(Vec::new)
            .push(env_var.clone());
    })
}

pub fn with_envs(env_vars: Vec<EnvVar>) -> ContainerModification {
    Box::new(move |container| {
        container
            .env
            .get_or_insert_with(Vec::new)
            .extend(env_vars.iter().cloned());
    })
}

pub fn with_ports(ports: Vec<ContainerPort>) -> ContainerModification {
    Box::new(move |container| {
        container
            .ports
            .get_or_insert_with(Vec::new)
            .extend(ports.iter().cloned());
    })
}

pub fn with_volume_mounts(volume_mounts: Vec<VolumeMount>) -> ContainerModification {
    Box::new(move |container| {
        container
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .extend(volume_mounts.iter().cloned());
    })
}

pub fn with_resources(resources: ResourceRequirements) -> ContainerModification {
    Box::new(move |container| container.resources = Some(resources.clone()))
}

pub fn with_security_context(security_context: SecurityContext) -> ContainerModification {
    Box::new(move |container| container.security_context = Some(security_context.clone()))
}

pub fn with_readiness_probe(probe: Probe) -> ContainerModification {
    Box::new(move |container| container.readiness_probe = Some(probe.clone()))
}

pub fn with_liveness_probe(probe: Probe) -> ContainerModification {
    Box::new(move |container| container.liveness_probe = Some(probe.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(container_fn: ContainerModification) -> Container {
        let mut container = Container::default();
        container_fn(&mut container);
        container
    }

    #[test]
    fn apply_runs_every_editor_in_order() {
        let container = edit(apply([
            with_name("mongod"),
            with_image("mongo:6.0"),
            with_image("mongo:7.0"),
        ]));

        assert_eq!(container.name, "mongod");
        assert_eq!(container.image.as_deref(), Some("mongo:7.0"));
    }

    #[test]
    fn noop_leaves_the_container_untouched() {
        assert_eq!(edit(noop()), Container::default());
    }

    #[test]
    fn env_vars_accumulate() {
        let container = edit(apply([
            with_env_var("MONGO_PORT", "27017"),
            with_envs(vec![EnvVar {
                name: "MONGO_HOST".to_string(),
                value: Some("localhost".to_string()),
                ..EnvVar::default()
            }]),
        ]));

        let env = container.env.unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env[0].name, "MONGO_PORT");
        assert_eq!(env[1].name, "MONGO_HOST");
    }

    #[test]
    fn volume_mounts_extend_existing_mounts() {
        let mount = |name: &str| VolumeMount {
            name: name.to_string(),
            mount_path: format!("/{name}"),
            ..VolumeMount::default()
        };

        let container = edit(apply([
            with_volume_mounts(vec![mount("data")]),
            with_volume_mounts(vec![mount("logs")]),
        ]));

        assert_eq!(
            container.volume_mounts,
            Some(vec![mount("data"), mount("logs")])
        );
    }

    #[test]
    fn editors_are_reusable() {
        let set_image = with_image("mongo:6.0");

        let mut first = Container::default();
        set_image(&mut first);
        let mut second = Container::default();
        set_image(&mut second);

        assert_eq!(first, second);
        assert_eq!(first.image.as_deref(), Some("mongo:6.0"));
    }
}
