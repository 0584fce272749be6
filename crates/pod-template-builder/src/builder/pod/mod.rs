use std::{collections::BTreeMap, num::TryFromIntError, time::Duration};

use k8s_openapi::{
    api::core::v1::{
        Affinity, Container, LocalObjectReference, NodeAffinity, PodAffinity, PodAffinityTerm,
        PodAntiAffinity, PodSecurityContext, PodSpec, PodTemplateSpec, Toleration, Volume,
        WeightedPodAffinityTerm,
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

pub mod container;

use self::container::ContainerModification;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display(
        "container index {index} is out of bounds for {len} containers, only the next free index may be addressed"
    ))]
    ContainerIndexOutOfBounds { index: usize, len: usize },

    #[snafu(display(
        "no preferred anti-affinity term at index {index}, the anti-affinity needs to be set first"
    ))]
    MissingAntiAffinityTerm { index: usize },

    #[snafu(display(
        "termination grace period is too long (got {duration:?}, maximum allowed is {max} seconds)",
        max = i64::MAX
    ))]
    TerminationGracePeriodTooLong {
        source: TryFromIntError,
        duration: Duration,
    },
}

/// A single edit to a [`PodTemplateSpec`].
///
/// Modifications close over their parameters and can be applied any number of
/// times. Parameters are cloned into the template on each application, so the
/// built template never aliases caller-held collections.
pub type Modification = Box<dyn Fn(&mut PodTemplateSpec) -> Result<()>>;

/// Applies each modification, in the order given, to a default
/// [`PodTemplateSpec`] and returns the result.
///
/// The first failing modification aborts the build and its error is returned.
pub fn new(modifications: impl IntoIterator<Item = Modification>) -> Result<PodTemplateSpec> {
    let mut template = PodTemplateSpec::default();
    for modification in modifications {
        modification(&mut template)?;
    }
    Ok(template)
}

/// Folds a list of modifications into a single one, applied in the order
/// given. `new([apply([a, b])])` builds the same template as `new([a, b])`.
pub fn apply(modifications: impl IntoIterator<Item = Modification>) -> Modification {
    let modifications: Vec<Modification> = modifications.into_iter().collect();
    Box::new(move |template| {
        for modification in &modifications {
            modification(template)?;
        }
        Ok(())
    })
}

/// A modification that leaves the template untouched. Useful as the fallback
/// branch when a modification is only applied conditionally.
pub fn noop() -> Modification {
    Box::new(|_| Ok(()))
}

/// Upserts the container with the given name: the editor runs against the
/// first container carrying the name, or against a freshly appended default
/// container if there is none.
///
/// The lookup name is not copied onto an appended container, editors assign
/// the name themselves (usually via [`container::with_name`]).
pub fn with_container(
    name: impl Into<String>,
    container_fn: ContainerModification,
) -> Modification {
    let name = name.into();
    Box::new(move |template| {
        upsert_by_name(&mut pod_spec(template).containers, &name, &container_fn);
        Ok(())
    })
}

/// [`with_container`], applied to the init container list.
pub fn with_init_container(
    name: impl Into<String>,
    container_fn: ContainerModification,
) -> Modification {
    let name = name.into();
    Box::new(move |template| {
        let init_containers = pod_spec(template).init_containers.get_or_insert_with(Vec::new);
        upsert_by_name(init_containers, &name, &container_fn);
        Ok(())
    })
}

/// Runs the editors against the container at `index`. An index equal to the
/// list length appends one default container first, anything past that is
/// [`Error::ContainerIndexOutOfBounds`].
pub fn with_container_by_index(
    index: usize,
    container_fns: Vec<ContainerModification>,
) -> Modification {
    Box::new(move |template| {
        edit_by_index(&mut pod_spec(template).containers, index, &container_fns)
    })
}

/// [`with_container_by_index`], applied to the init container list.
pub fn with_init_container_by_index(
    index: usize,
    container_fns: Vec<ContainerModification>,
) -> Modification {
    Box::new(move |template| {
        let init_containers = pod_spec(template).init_containers.get_or_insert_with(Vec::new);
        edit_by_index(init_containers, index, &container_fns)
    })
}

/// Replaces the whole label map. `None` is normalized to an empty map, the
/// labels are never left unset once this modification ran.
pub fn with_pod_labels(labels: Option<BTreeMap<String, String>>) -> Modification {
    let labels = labels.unwrap_or_default();
    Box::new(move |template| {
        metadata(template).labels = Some(labels.clone());
        Ok(())
    })
}

/// Replaces the whole annotation map, with the same `None` normalization as
/// [`with_pod_labels`].
pub fn with_annotations(annotations: Option<BTreeMap<String, String>>) -> Modification {
    let annotations = annotations.unwrap_or_default();
    Box::new(move |template| {
        metadata(template).annotations = Some(annotations.clone());
        Ok(())
    })
}

pub fn with_service_account(name: impl Into<String>) -> Modification {
    let name = name.into();
    Box::new(move |template| {
        pod_spec(template).service_account_name = Some(name.clone());
        Ok(())
    })
}

/// Appends the volume unless one with the same name is already present. A
/// duplicate name keeps the existing volume (first write wins) and is only
/// traced, not reported.
pub fn with_volume(volume: Volume) -> Modification {
    Box::new(move |template| {
        let volumes = pod_spec(template).volumes.get_or_insert_with(Vec::new);
        if volumes.iter().any(|existing| existing.name == volume.name) {
            tracing::debug!(
                volume_name = %volume.name,
                "volume with this name already present, keeping the existing one"
            );
            return Ok(());
        }
        volumes.push(volume.clone());
        Ok(())
    })
}

pub fn with_termination_grace_period(termination_grace_period: Duration) -> Modification {
    Box::new(move |template| {
        let seconds = i64::try_from(termination_grace_period.as_secs()).context(
            TerminationGracePeriodTooLongSnafu {
                duration: termination_grace_period,
            },
        )?;
        pod_spec(template).termination_grace_period_seconds = Some(seconds);
        Ok(())
    })
}

/// Replaces the whole pod security context with one that only carries the
/// given `fsGroup`. Any previously set security context fields are discarded.
pub fn with_fs_group(fs_group: i64) -> Modification {
    Box::new(move |template| {
        pod_spec(template).security_context = Some(PodSecurityContext {
            fs_group: Some(fs_group),
            ..PodSecurityContext::default()
        });
        Ok(())
    })
}

/// Appends one image pull secret reference. Duplicates are not filtered.
pub fn with_image_pull_secrets(name: impl Into<String>) -> Modification {
    let name = name.into();
    Box::new(move |template| {
        pod_spec(template)
            .image_pull_secrets
            .get_or_insert_with(Vec::new)
            .push(LocalObjectReference { name: name.clone() });
        Ok(())
    })
}

/// Sets the topology key of the preferred anti-affinity term at `index`,
/// leaving the term's weight and label selector untouched. The term has to
/// exist, normally by running [`with_affinity`] first.
pub fn with_topology_key(topology_key: impl Into<String>, index: usize) -> Modification {
    let topology_key = topology_key.into();
    Box::new(move |template| {
        let term = pod_spec(template)
            .affinity
            .as_mut()
            .and_then(|affinity| affinity.pod_anti_affinity.as_mut())
            .and_then(|anti_affinity| {
                anti_affinity
                    .preferred_during_scheduling_ignored_during_execution
                    .as_mut()
            })
            .and_then(|terms| terms.get_mut(index))
            .context(MissingAntiAffinityTermSnafu { index })?;
        term.pod_affinity_term.topology_key = topology_key.clone();
        Ok(())
    })
}

/// Replaces the whole affinity object with a single preferred anti-affinity
/// term of the given weight, matching pods labeled `{label_key: name}`. Any
/// previously configured affinity is dropped.
pub fn with_affinity(
    name: impl Into<String>,
    label_key: impl Into<String>,
    weight: i32,
) -> Modification {
    let name = name.into();
    let label_key = label_key.into();
    Box::new(move |template| {
        pod_spec(template).affinity = Some(Affinity {
            pod_anti_affinity: Some(PodAntiAffinity {
                preferred_during_scheduling_ignored_during_execution: Some(vec![
                    WeightedPodAffinityTerm {
                        weight,
                        pod_affinity_term: PodAffinityTerm {
                            label_selector: Some(LabelSelector {
                                match_labels: Some(BTreeMap::from([(
                                    label_key.clone(),
                                    name.clone(),
                                )])),
                                ..LabelSelector::default()
                            }),
                            ..PodAffinityTerm::default()
                        },
                    },
                ]),
                ..PodAntiAffinity::default()
            }),
            ..Affinity::default()
        });
        Ok(())
    })
}

/// Sets the node affinity, allocating the surrounding affinity object if it
/// is not there yet. Other affinity fields stay as they are.
pub fn with_node_affinity(node_affinity: NodeAffinity) -> Modification {
    Box::new(move |template| {
        pod_spec(template)
            .affinity
            .get_or_insert_with(Affinity::default)
            .node_affinity = Some(node_affinity.clone());
        Ok(())
    })
}

/// Sets the pod affinity, with the same allocation behavior as
/// [`with_node_affinity`].
pub fn with_pod_affinity(pod_affinity: PodAffinity) -> Modification {
    Box::new(move |template| {
        pod_spec(template)
            .affinity
            .get_or_insert_with(Affinity::default)
            .pod_affinity = Some(pod_affinity.clone());
        Ok(())
    })
}

/// Replaces the whole toleration list.
pub fn with_tolerations(tolerations: Vec<Toleration>) -> Modification {
    Box::new(move |template| {
        pod_spec(template).tolerations = Some(tolerations.clone());
        Ok(())
    })
}

fn pod_spec(template: &mut PodTemplateSpec) -> &mut PodSpec {
    template.spec.get_or_insert_with(PodSpec::default)
}

fn metadata(template: &mut PodTemplateSpec) -> &mut ObjectMeta {
    template.metadata.get_or_insert_with(ObjectMeta::default)
}

fn upsert_by_name(
    containers: &mut Vec<Container>,
    name: &str,
    container_fn: &ContainerModification,
) {
    let index = match containers.iter().position(|c| c.name == name) {
        Some(index) => index,
        None => {
            containers.push(Container::default());
            containers.len() - 1
        }
    };
    container_fn(&mut containers[index]);
}

fn edit_by_index(
    containers: &mut Vec<Container>,
    index: usize,
    container_fns: &[ContainerModification],
) -> Result<()> {
    ensure!(
        index <= containers.len(),
        ContainerIndexOutOfBoundsSnafu {
            index,
            len: containers.len(),
        }
    );
    if index == containers.len() {
        containers.push(Container::default());
    }

    let container = &mut containers[index];
    for container_fn in container_fns {
        container_fn(container);
    }
    Ok(())
}
