//! Endpoint manifest: the ordered list of heads to acquire from.
//!
//! The platform configuration document is parsed exactly once, here, into
//! typed `EndpointDescriptor`s. Nothing past this boundary looks at JSON.
//!
//! Expected document shape (other keys are ignored):
//!
//! ```json
//! { "ports": { "port0": { "data": { "pcicTCPPort": 50010 },
//!                         "info": { "features": { "type": "3D" } } } } }
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::device::DeviceInterface;
use crate::error::{AcquisitionError, CoordinatorResult};

/// One data-producing head, as described by the manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Stable identifier, e.g. the port name.
    pub id: String,
    /// Connection parameter used to open a session (PCIC TCP port).
    pub address: u16,
    /// Descriptive sensor tag, e.g. "3D" or "2D".
    pub kind: String,
}

impl EndpointDescriptor {
    pub fn new(id: impl Into<String>, address: u16, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address,
            kind: kind.into(),
        }
    }
}

/// Ordered set of endpoint descriptors. Immutable once read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    endpoints: Vec<EndpointDescriptor>,
}

impl Manifest {
    /// Build a manifest from already-typed descriptors.
    ///
    /// Fails if two endpoints share an id or an address, since each head
    /// must map to exactly one session.
    pub fn from_endpoints(endpoints: Vec<EndpointDescriptor>) -> CoordinatorResult<Self> {
        let mut ids: HashSet<&str> = HashSet::new();
        let mut addresses: HashMap<u16, &str> = HashMap::new();
        for ep in &endpoints {
            if !ids.insert(ep.id.as_str()) {
                return Err(AcquisitionError::manifest(format!(
                    "duplicate endpoint id '{}'",
                    ep.id
                )));
            }
            if let Some(other) = addresses.insert(ep.address, ep.id.as_str()) {
                return Err(AcquisitionError::manifest(format!(
                    "endpoints '{}' and '{}' share address {}",
                    other, ep.id, ep.address
                )));
            }
        }
        Ok(Self { endpoints })
    }

    /// Parse the `ports` tree of a platform configuration document.
    pub fn from_platform_config(doc: &Value) -> CoordinatorResult<Self> {
        let ports = doc
            .get("ports")
            .ok_or_else(|| AcquisitionError::manifest("configuration has no 'ports' section"))?
            .as_object()
            .ok_or_else(|| AcquisitionError::manifest("'ports' section is not an object"))?;

        let mut endpoints = Vec::with_capacity(ports.len());
        for (id, entry) in ports {
            let port = PortEntry::deserialize(entry).map_err(|e| {
                AcquisitionError::manifest(format!("port '{}' is malformed: {}", id, e))
            })?;
            endpoints.push(EndpointDescriptor {
                id: id.clone(),
                address: port.data.pcic_tcp_port,
                kind: port.info.features.kind,
            });
        }
        Self::from_endpoints(endpoints)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EndpointDescriptor> {
        self.endpoints.iter()
    }

    pub fn get(&self, id: &str) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|ep| ep.id == id)
    }
}

impl IntoIterator for Manifest {
    type Item = EndpointDescriptor;
    type IntoIter = std::vec::IntoIter<EndpointDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.into_iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a EndpointDescriptor;
    type IntoIter = std::slice::Iter<'a, EndpointDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

// Typed view of one `ports.<id>` entry.

#[derive(Debug, Deserialize)]
struct PortEntry {
    data: PortData,
    info: PortInfo,
}

#[derive(Debug, Deserialize)]
struct PortData {
    #[serde(rename = "pcicTCPPort")]
    pcic_tcp_port: u16,
}

#[derive(Debug, Deserialize)]
struct PortInfo {
    features: PortFeatures,
}

#[derive(Debug, Deserialize)]
struct PortFeatures {
    #[serde(rename = "type")]
    kind: String,
}

// ----------------------------------------------------------------------------
// Readers
// ----------------------------------------------------------------------------

/// Source of the endpoint manifest. Single pass: reading consumes the reader.
pub trait ManifestReader {
    fn list_endpoints(self) -> CoordinatorResult<Manifest>;
}

/// Manifest read from a JSON configuration document held in memory or on disk.
pub struct JsonManifest {
    raw: String,
    origin: String,
}

impl JsonManifest {
    pub fn from_json(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            origin: "<inline>".to_string(),
        }
    }

    pub fn from_path(path: &Path) -> CoordinatorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AcquisitionError::manifest(format!(
                "failed to read manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self {
            raw,
            origin: path.display().to_string(),
        })
    }
}

impl ManifestReader for JsonManifest {
    fn list_endpoints(self) -> CoordinatorResult<Manifest> {
        let doc: Value = serde_json::from_str(&self.raw).map_err(|e| {
            AcquisitionError::manifest(format!("invalid manifest {}: {}", self.origin, e))
        })?;
        Manifest::from_platform_config(&doc)
    }
}

/// Manifest retrieved from the device's own configuration document.
pub struct DeviceManifest<'d, D: DeviceInterface + ?Sized> {
    device: &'d D,
}

impl<'d, D: DeviceInterface + ?Sized> DeviceManifest<'d, D> {
    pub fn new(device: &'d D) -> Self {
        Self { device }
    }
}

impl<D: DeviceInterface + ?Sized> ManifestReader for DeviceManifest<'_, D> {
    fn list_endpoints(self) -> CoordinatorResult<Manifest> {
        let doc = self.device.config().map_err(|e| {
            AcquisitionError::manifest(format!("failed to retrieve device configuration: {e:#}"))
        })?;
        Manifest::from_platform_config(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_port_doc() -> Value {
        json!({
            "device": { "info": { "name": "vpu" } },
            "ports": {
                "port2": {
                    "data": { "pcicTCPPort": 50012 },
                    "info": { "features": { "type": "2D" } }
                },
                "port0": {
                    "data": { "pcicTCPPort": 50010 },
                    "info": { "features": { "type": "3D" } }
                }
            }
        })
    }

    #[test]
    fn parses_ports_in_document_order() -> anyhow::Result<()> {
        let manifest = Manifest::from_platform_config(&two_port_doc())?;
        let ids: Vec<_> = manifest.iter().map(|ep| ep.id.as_str()).collect();
        assert_eq!(ids, vec!["port2", "port0"]);
        assert_eq!(
            manifest.get("port0"),
            Some(&EndpointDescriptor::new("port0", 50010, "3D"))
        );
        Ok(())
    }

    #[test]
    fn empty_ports_yield_empty_manifest() -> anyhow::Result<()> {
        let manifest = Manifest::from_platform_config(&json!({ "ports": {} }))?;
        assert!(manifest.is_empty());
        assert_eq!(manifest.len(), 0);
        Ok(())
    }

    #[test]
    fn missing_ports_section_is_manifest_error() {
        let err = Manifest::from_platform_config(&json!({ "device": {} })).unwrap_err();
        assert!(matches!(err, AcquisitionError::Manifest(_)));
    }

    #[test]
    fn missing_field_names_the_port() {
        let doc = json!({
            "ports": {
                "port1": { "data": {}, "info": { "features": { "type": "2D" } } }
            }
        });
        let err = Manifest::from_platform_config(&doc).unwrap_err();
        match err {
            AcquisitionError::Manifest(msg) => {
                assert!(msg.contains("port1"), "{msg}");
                assert!(msg.contains("pcicTCPPort"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn out_of_range_address_is_rejected() {
        let doc = json!({
            "ports": {
                "port0": { "data": { "pcicTCPPort": 70000 },
                           "info": { "features": { "type": "3D" } } }
            }
        });
        assert!(Manifest::from_platform_config(&doc).is_err());
    }

    #[test]
    fn duplicate_addresses_are_rejected() {
        let eps = vec![
            EndpointDescriptor::new("port0", 50010, "3D"),
            EndpointDescriptor::new("port1", 50010, "2D"),
        ];
        let err = Manifest::from_endpoints(eps).unwrap_err();
        assert!(err.to_string().contains("share address 50010"));
    }

    #[test]
    fn json_manifest_reports_parse_errors() {
        let err = JsonManifest::from_json("{ not json").list_endpoints().unwrap_err();
        assert!(matches!(err, AcquisitionError::Manifest(_)));
    }

    #[test]
    fn json_manifest_reads_from_disk() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut file, two_port_doc().to_string().as_bytes())?;
        let manifest = JsonManifest::from_path(file.path())?.list_endpoints()?;
        assert_eq!(manifest.len(), 2);
        Ok(())
    }
}
