use serde::{Deserialize, Serialize};

/// A stage of the supply chain that can hold custody of a product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Custodian {
    Customs,
    Importer,
    Distributor,
    Retailer,
}

impl Custodian {
    pub const ALL: [Custodian; 4] = [
        Custodian::Customs,
        Custodian::Importer,
        Custodian::Distributor,
        Custodian::Retailer,
    ];

    /// The stage that receives a dispatch from this one. Retailers only sell.
    pub fn next(self) -> Option<Custodian> {
        match self {
            Custodian::Customs => Some(Custodian::Importer),
            Custodian::Importer => Some(Custodian::Distributor),
            Custodian::Distributor => Some(Custodian::Retailer),
            Custodian::Retailer => None,
        }
    }

    /// The stage that dispatches to this one.
    pub fn previous(self) -> Option<Custodian> {
        match self {
            Custodian::Customs => None,
            Custodian::Importer => Some(Custodian::Customs),
            Custodian::Distributor => Some(Custodian::Importer),
            Custodian::Retailer => Some(Custodian::Distributor),
        }
    }

    /// Role name as registered in the roles directory.
    pub fn role_name(self) -> &'static str {
        match self {
            Custodian::Customs => "CUSTOMS",
            Custodian::Importer => "IMPORTER",
            Custodian::Distributor => "DISTRIBUTOR",
            Custodian::Retailer => "RETAILER",
        }
    }

    pub fn from_role_name(role: &str) -> Option<Custodian> {
        Custodian::ALL
            .into_iter()
            .find(|c| c.role_name().eq_ignore_ascii_case(role.trim()))
    }
}

impl core::fmt::Display for Custodian {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.role_name())
    }
}

impl core::str::FromStr for Custodian {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Custodian::from_role_name(s).ok_or_else(|| format!("unknown role `{s}`"))
    }
}

/// Custody status of one product.
///
/// Ordered along the chain; a product's status only ever moves forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "custodian", rename_all = "snake_case")]
pub enum ProductStatus {
    /// Held by the custodian (after minting or after accepting a delivery).
    InHouse(Custodian),
    /// Dispatched by the custodian, awaiting acceptance by the next stage.
    Dispatched(Custodian),
    /// Dispatched to the burn address. Terminal.
    Sold,
}

impl ProductStatus {
    /// Ledger status code. Also the position on the status ladder.
    pub fn code(self) -> u8 {
        match self {
            ProductStatus::InHouse(Custodian::Customs) => 0,
            ProductStatus::Dispatched(Custodian::Customs) => 1,
            ProductStatus::InHouse(Custodian::Importer) => 2,
            ProductStatus::Dispatched(Custodian::Importer) => 3,
            ProductStatus::InHouse(Custodian::Distributor) => 4,
            ProductStatus::Dispatched(Custodian::Distributor) => 5,
            ProductStatus::InHouse(Custodian::Retailer) => 6,
            // Retailers never dispatch onward; they sell.
            ProductStatus::Dispatched(Custodian::Retailer) => 7,
            ProductStatus::Sold => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<ProductStatus> {
        Some(match code {
            0 => ProductStatus::InHouse(Custodian::Customs),
            1 => ProductStatus::Dispatched(Custodian::Customs),
            2 => ProductStatus::InHouse(Custodian::Importer),
            3 => ProductStatus::Dispatched(Custodian::Importer),
            4 => ProductStatus::InHouse(Custodian::Distributor),
            5 => ProductStatus::Dispatched(Custodian::Distributor),
            6 => ProductStatus::InHouse(Custodian::Retailer),
            7 => ProductStatus::Dispatched(Custodian::Retailer),
            8 => ProductStatus::Sold,
            _ => return None,
        })
    }

    /// Whether `next` is a legal direct successor of `self`.
    pub fn can_advance_to(self, next: ProductStatus) -> bool {
        match (self, next) {
            (ProductStatus::InHouse(_), ProductStatus::Sold) => true,
            (ProductStatus::InHouse(a), ProductStatus::Dispatched(b)) => a == b && a.next().is_some(),
            (ProductStatus::Dispatched(a), ProductStatus::InHouse(b)) => a.next() == Some(b),
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ProductStatus::Sold
    }

    pub fn holder(self) -> Option<Custodian> {
        match self {
            ProductStatus::InHouse(c) | ProductStatus::Dispatched(c) => Some(c),
            ProductStatus::Sold => None,
        }
    }
}

impl PartialOrd for ProductStatus {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProductStatus {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.code().cmp(&other.code())
    }
}

impl core::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProductStatus::InHouse(Custodian::Importer) => f.write_str("AcceptedByImporter"),
            ProductStatus::InHouse(Custodian::Distributor) => f.write_str("AcceptedByDistributor"),
            ProductStatus::InHouse(Custodian::Retailer) => f.write_str("AcceptedByRetailer"),
            ProductStatus::InHouse(Custodian::Customs) => f.write_str("InCustoms"),
            ProductStatus::Dispatched(c) => write!(f, "DispatchedBy{}", title_case(c.role_name())),
            ProductStatus::Sold => f.write_str("Sold"),
        }
    }
}

fn title_case(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_and_order_the_ladder() {
        let mut previous: Option<ProductStatus> = None;
        for code in 0..=8u8 {
            let status = ProductStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
            if let Some(p) = previous {
                assert!(p < status);
            }
            previous = Some(status);
        }
        assert_eq!(ProductStatus::from_code(9), None);
    }

    #[test]
    fn every_in_house_stage_may_sell() {
        for c in Custodian::ALL {
            assert!(ProductStatus::InHouse(c).can_advance_to(ProductStatus::Sold));
        }
        assert!(!ProductStatus::Dispatched(Custodian::Importer).can_advance_to(ProductStatus::Sold));
    }

    #[test]
    fn retailer_cannot_dispatch_onward() {
        assert!(!ProductStatus::InHouse(Custodian::Retailer)
            .can_advance_to(ProductStatus::Dispatched(Custodian::Retailer)));
    }

    #[test]
    fn acceptance_moves_to_the_next_stage_only() {
        let d = ProductStatus::Dispatched(Custodian::Customs);
        assert!(d.can_advance_to(ProductStatus::InHouse(Custodian::Importer)));
        assert!(!d.can_advance_to(ProductStatus::InHouse(Custodian::Distributor)));
        assert!(!d.can_advance_to(ProductStatus::InHouse(Custodian::Customs)));
    }

    #[test]
    fn role_names_parse_case_insensitively() {
        assert_eq!("importer".parse::<Custodian>(), Ok(Custodian::Importer));
        assert_eq!(Custodian::from_role_name(" RETAILER "), Some(Custodian::Retailer));
        assert!("ADMIN".parse::<Custodian>().is_err());
    }

    #[test]
    fn display_uses_ledger_names() {
        assert_eq!(ProductStatus::InHouse(Custodian::Importer).to_string(), "AcceptedByImporter");
        assert_eq!(
            ProductStatus::Dispatched(Custodian::Distributor).to_string(),
            "DispatchedByDistributor"
        );
    }
}
