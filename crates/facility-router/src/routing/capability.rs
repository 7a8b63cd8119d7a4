use super::domain::{non_blank, CapabilityMap};

/// One request category and the facility capabilities that satisfy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityAlias {
    pub category: &'static str,
    pub capabilities: &'static [&'static str],
}

/// Versioned alias data consulted when a facility does not list the requested key directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityAliasTable {
    pub version: &'static str,
    entries: &'static [CapabilityAlias],
}

impl CapabilityAliasTable {
    pub const V1: CapabilityAliasTable = CapabilityAliasTable {
        version: "2024-01",
        entries: &[
            CapabilityAlias {
                category: "IMAGING",
                capabilities: &["MRI", "CT", "XRAY", "ULTRASOUND"],
            },
            CapabilityAlias {
                category: "LAB",
                capabilities: &["LAB", "BLOOD"],
            },
            CapabilityAlias {
                category: "CARDIOLOGY",
                capabilities: &["CARDIOLOGY"],
            },
        ],
    };

    pub fn entries(&self) -> &'static [CapabilityAlias] {
        self.entries
    }

    /// Capabilities aliased to `category`; empty when the category is unknown.
    pub fn aliases(&self, category: &str) -> &'static [&'static str] {
        self.entries
            .iter()
            .find(|entry| entry.category == category)
            .map(|entry| entry.capabilities)
            .unwrap_or(&[])
    }
}

impl Default for CapabilityAliasTable {
    fn default() -> Self {
        Self::V1
    }
}

/// Uppercased lookup key: request type first, then department. `None` means unconstrained.
pub fn capability_key(request_type: Option<&str>, department: Option<&str>) -> Option<String> {
    non_blank(request_type)
        .or_else(|| non_blank(department))
        .map(str::to_uppercase)
}

/// Whether a facility with `capabilities` can serve `key`.
pub fn resolve_capability(
    capabilities: &CapabilityMap,
    key: Option<&str>,
    table: &CapabilityAliasTable,
) -> bool {
    let Some(key) = key else {
        return true;
    };

    if let Some(available) = capabilities.get(key) {
        return available;
    }

    table
        .aliases(key)
        .iter()
        .any(|capability| capabilities.supports(capability))
}
