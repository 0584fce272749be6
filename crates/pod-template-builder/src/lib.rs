//! Composable modifications for assembling Kubernetes pod templates.
//!
//! A [`builder::pod::Modification`] edits one field of a
//! [`PodTemplateSpec`](k8s_openapi::api::core::v1::PodTemplateSpec).
//! [`builder::pod::new`] applies an ordered list of them to a default
//! template and returns the result:
//!
//! ```
//! use pod_template_builder::builder::pod::{self, container};
//!
//! let template = pod::new([
//!     pod::with_service_account("backup-agent"),
//!     pod::with_container(
//!         "agent",
//!         container::apply([
//!             container::with_name("agent"),
//!             container::with_image("registry.example.com/agent:1.4"),
//!         ]),
//!     ),
//! ])?;
//!
//! assert_eq!(
//!     template.spec.and_then(|spec| spec.service_account_name),
//!     Some("backup-agent".to_string()),
//! );
//! # Ok::<(), pod_template_builder::builder::pod::Error>(())
//! ```

pub mod builder;

// External re-exports
pub use k8s_openapi;
