//! Well-known resource-identity labels.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Kind of resource a metric set describes.
pub const LABEL_METRIC_SET_TYPE: &str = "type";
/// Node name.
pub const LABEL_NODENAME: &str = "nodename";
/// Host name.
pub const LABEL_HOSTNAME: &str = "hostname";
/// Host identifier assigned by the infrastructure provider.
pub const LABEL_HOST_ID: &str = "host_id";
/// Namespace name.
pub const LABEL_NAMESPACE_NAME: &str = "namespace_name";
/// Pod name.
pub const LABEL_POD_NAME: &str = "pod_name";
/// Pod UID.
pub const LABEL_POD_ID: &str = "pod_id";
/// Container name.
pub const LABEL_CONTAINER_NAME: &str = "container_name";
/// Identifier of the sub-resource a labeled metric refers to, such as a filesystem device.
pub const LABEL_RESOURCE_ID: &str = "resource_id";

/// The kind of resource a metric set was collected for.
///
/// Carried in the [`LABEL_METRIC_SET_TYPE`] label. Parsing is case-insensitive, so `Node` and `node` name the same
/// kind.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A cluster node.
    Node,

    /// A pod.
    Pod,

    /// A container running inside a pod.
    PodContainer,

    /// A system container running directly on a node.
    SysContainer,

    /// A namespace.
    Namespace,

    /// The whole cluster.
    Cluster,
}

impl ResourceType {
    /// Returns the canonical label value for this resource type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Pod => "pod",
            Self::PodContainer => "pod_container",
            Self::SysContainer => "sys_container",
            Self::Namespace => "ns",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label value does not name a known resource type.
#[derive(Debug, Eq, PartialEq, Snafu)]
#[snafu(display("unknown resource type '{}'", value))]
pub struct UnknownResourceType {
    value: String,
}

impl UnknownResourceType {
    /// Returns the label value that failed to parse.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Ok(Self::Node),
            "pod" => Ok(Self::Pod),
            "pod_container" => Ok(Self::PodContainer),
            "sys_container" => Ok(Self::SysContainer),
            "ns" | "namespace" => Ok(Self::Namespace),
            "cluster" => Ok(Self::Cluster),
            _ => Err(UnknownResourceType { value: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Node".parse::<ResourceType>(), Ok(ResourceType::Node));
        assert_eq!("POD".parse::<ResourceType>(), Ok(ResourceType::Pod));
        assert_eq!("ns".parse::<ResourceType>(), Ok(ResourceType::Namespace));
    }

    #[test]
    fn unknown_type_names_value() {
        let err = "volume".parse::<ResourceType>().unwrap_err();
        assert_eq!(err.value(), "volume");
        assert_eq!(err.to_string(), "unknown resource type 'volume'");
    }
}
