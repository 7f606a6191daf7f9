//! Static instance-metadata catalog: cpu/memory/gpu totals for the AWS instance classes this
//! system provisions, keyed by `nodeType`. The original tool resolves this by calling EC2's
//! `describe_instance_types` live (cached per process); this crate has no AWS credentials or
//! network access at config-resolution time, and cluster bring-up (where such a call would live)
//! is out of scope per spec.md §1, so the catalog is a fixed table covering the instance classes
//! this system's own fixtures and scenarios name. An unknown `nodeType` falls back to a
//! conservative generic profile rather than failing validation outright.
use crate::group::ResourceRequest;

/// A node pool's total capacity, before the node-agent reservation is subtracted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceProfile {
    pub cpu_millis: u32,
    pub memory_mi: u32,
    pub gpu_count: u32,
}

const CATALOG: &[(&str, InstanceProfile)] = &[
    (
        "g5.xlarge",
        InstanceProfile {
            cpu_millis: 4_000,
            memory_mi: 16_384,
            gpu_count: 1,
        },
    ),
    (
        "g5.2xlarge",
        InstanceProfile {
            cpu_millis: 8_000,
            memory_mi: 32_768,
            gpu_count: 1,
        },
    ),
    (
        "g4dn.xlarge",
        InstanceProfile {
            cpu_millis: 4_000,
            memory_mi: 16_384,
            gpu_count: 1,
        },
    ),
    (
        "p4d.24xlarge",
        InstanceProfile {
            cpu_millis: 96_000,
            memory_mi: 1_179_648,
            gpu_count: 8,
        },
    ),
    (
        "c7a.xlarge",
        InstanceProfile {
            cpu_millis: 4_000,
            memory_mi: 8_192,
            gpu_count: 0,
        },
    ),
    (
        "m5.xlarge",
        InstanceProfile {
            cpu_millis: 4_000,
            memory_mi: 16_384,
            gpu_count: 0,
        },
    ),
    (
        "t2.medium",
        InstanceProfile {
            cpu_millis: 2_000,
            memory_mi: 4_096,
            gpu_count: 0,
        },
    ),
    (
        "t2.micro",
        InstanceProfile {
            cpu_millis: 1_000,
            memory_mi: 1_024,
            gpu_count: 0,
        },
    ),
];

/// Millicores the node agent (kubelet, CNI, CSI sidecars) reserves on every node.
const RESERVED_CPU_MILLIS: u32 = 400;
/// Memory, in mebibytes, the node agent reserves on every node.
const RESERVED_MEMORY_MI: u32 = 2_048;

/// Generic fallback for a `nodeType` not in [`CATALOG`]: conservative enough to schedule, not
/// meant to be accurate for any specific cloud instance class.
const UNKNOWN_PROFILE: InstanceProfile = InstanceProfile {
    cpu_millis: 2_000,
    memory_mi: 4_096,
    gpu_count: 0,
};

pub fn lookup(node_type: &str) -> InstanceProfile {
    CATALOG
        .iter()
        .find(|(name, _)| *name == node_type)
        .map(|(_, profile)| *profile)
        .unwrap_or(UNKNOWN_PROFILE)
}

/// A group's resolved cpu/memory/gpu request: explicit `resourceRequest` fields win field by
/// field, anything left unset falls back to the instance catalog's total minus the node-agent
/// reservation (cpu/memory only; gpu is never reserved against).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedResources {
    pub cpu_millis: u32,
    pub memory_mi: u32,
    pub gpu_count: u32,
}

pub fn resolve_resources(node_type: &str, explicit: ResourceRequest) -> ResolvedResources {
    let profile = lookup(node_type);
    ResolvedResources {
        cpu_millis: explicit
            .cpu
            .unwrap_or_else(|| profile.cpu_millis.saturating_sub(RESERVED_CPU_MILLIS)),
        memory_mi: explicit
            .memory
            .unwrap_or_else(|| profile.memory_mi.saturating_sub(RESERVED_MEMORY_MI)),
        gpu_count: explicit.gpu.unwrap_or(profile.gpu_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_instance_resolves_catalog_minus_reservation() {
        let resolved = resolve_resources("g5.xlarge", ResourceRequest::default());
        assert_eq!(resolved.cpu_millis, 3_600);
        assert_eq!(resolved.memory_mi, 14_336);
        assert_eq!(resolved.gpu_count, 1);
    }

    #[test]
    fn explicit_fields_override_catalog() {
        let explicit = ResourceRequest {
            cpu: Some(500),
            memory: None,
            gpu: Some(2),
        };
        let resolved = resolve_resources("g5.xlarge", explicit);
        assert_eq!(resolved.cpu_millis, 500);
        assert_eq!(resolved.memory_mi, 14_336);
        assert_eq!(resolved.gpu_count, 2);
    }

    #[test]
    fn unknown_instance_falls_back_to_generic_profile() {
        let resolved = resolve_resources("made-up.9xlarge", ResourceRequest::default());
        assert_eq!(resolved.cpu_millis, UNKNOWN_PROFILE.cpu_millis - RESERVED_CPU_MILLIS);
        assert_eq!(resolved.gpu_count, 0);
    }
}
