//! This module provides modification functions for (Kubernetes) objects.
//!
//! They are not _pure_ setters but carry the merge semantics a pod template
//! needs, e.g. upserting containers by name or skipping duplicate volumes.

pub mod pod;
