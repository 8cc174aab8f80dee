use serde::{Deserialize, Serialize};

use tracechain_core::Address;
use tracechain_products::Custodian;

/// One registered party, as served by `GET /api/roles` and `rolesData(address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDirectoryEntry {
    pub address_registered: Address,
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, rename = "contractNumber", skip_serializing_if = "Option::is_none")]
    pub contract_number: Option<String>,
    #[serde(default, rename = "countryOfOrigin", skip_serializing_if = "Option::is_none")]
    pub country_of_origin: Option<String>,
    #[serde(default, rename = "vatRegNumber", skip_serializing_if = "Option::is_none")]
    pub vat_reg_number: Option<String>,
    #[serde(default, rename = "ipfsDocHash", skip_serializing_if = "Option::is_none")]
    pub doc_hash: Option<String>,
}

impl RoleDirectoryEntry {
    pub fn new(address: Address, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            address_registered: address,
            name: name.into(),
            role: role.into(),
            location: None,
            contract_number: None,
            country_of_origin: None,
            vat_reg_number: None,
            doc_hash: None,
        }
    }

    /// Supply-chain stage for this role, if it is one (admins are not).
    pub fn custodian(&self) -> Option<Custodian> {
        Custodian::from_role_name(&self.role)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.trim().eq_ignore_ascii_case(role.trim())
    }

    pub fn label(&self) -> DisplayLabel {
        DisplayLabel(format!("{} ({})", self.name, self.role))
    }
}

/// Human-readable label for an address: `"Name (ROLE)"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayLabel(String);

impl DisplayLabel {
    pub const UNKNOWN: &'static str = "Unknown Role";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl core::fmt::Display for DisplayLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_directory_json() {
        let json = serde_json::json!({
            "address_registered": "0x00000000000000000000000000000000000000AA",
            "name": "Acme Imports",
            "role": "IMPORTER",
            "countryOfOrigin": "NL",
            "vatRegNumber": "NL123"
        });
        let entry: RoleDirectoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.custodian(), Some(Custodian::Importer));
        assert_eq!(entry.country_of_origin.as_deref(), Some("NL"));
        assert_eq!(entry.location, None);
        assert_eq!(entry.label().as_str(), "Acme Imports (IMPORTER)");
    }

    #[test]
    fn admin_is_not_a_custodian() {
        let entry = RoleDirectoryEntry::new(Address::burn(), "Root", "ADMIN");
        assert_eq!(entry.custodian(), None);
        assert!(entry.has_role("admin"));
    }
}
