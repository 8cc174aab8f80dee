//! Product life-cycle aggregate.
//!
//! Tracks custody of one product: who owns it, where it sits on the status
//! ladder, which onward dispatch each stage issued, and which dispatch is
//! currently awaiting acceptance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracechain_core::{Address, Aggregate, AggregateRoot, DispatchId, DomainError, ProductId};
use tracechain_events::Event;

use crate::status::{Custodian, ProductStatus};

/// Onward dispatch issued by each stage, `None` while that stage has not yet
/// dispatched the product further.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnwardPointers {
    pub customs: Option<DispatchId>,
    pub importer: Option<DispatchId>,
    pub distributor: Option<DispatchId>,
    pub retailer: Option<DispatchId>,
}

impl OnwardPointers {
    pub fn get(&self, stage: Custodian) -> Option<DispatchId> {
        match stage {
            Custodian::Customs => self.customs,
            Custodian::Importer => self.importer,
            Custodian::Distributor => self.distributor,
            Custodian::Retailer => self.retailer,
        }
    }

    fn set(&mut self, stage: Custodian, dispatch_id: DispatchId) {
        let slot = match stage {
            Custodian::Customs => &mut self.customs,
            Custodian::Importer => &mut self.importer,
            Custodian::Distributor => &mut self.distributor,
            Custodian::Retailer => &mut self.retailer,
        };
        *slot = Some(dispatch_id);
    }

    fn contains(&self, dispatch_id: DispatchId) -> bool {
        Custodian::ALL.into_iter().any(|c| self.get(c) == Some(dispatch_id))
    }
}

/// The dispatch currently awaiting acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InTransit {
    pub dispatch_id: DispatchId,
    pub to: Address,
}

/// Aggregate root: ProductLifeCycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductLifeCycle {
    product_id: ProductId,
    owner: Address,
    status: ProductStatus,
    onward: OnwardPointers,
    in_transit: Option<InTransit>,
    version: u64,
    minted: bool,
}

impl ProductLifeCycle {
    /// Create an empty, not-yet-minted aggregate instance for rehydration.
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            owner: Address::burn(),
            status: ProductStatus::InHouse(Custodian::Customs),
            onward: OnwardPointers::default(),
            in_transit: None,
            version: 0,
            minted: false,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn onward(&self) -> &OnwardPointers {
        &self.onward
    }

    pub fn in_transit(&self) -> Option<&InTransit> {
        self.in_transit.as_ref()
    }
}

impl AggregateRoot for ProductLifeCycle {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: MintProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintProduct {
    pub product_id: ProductId,
    pub customs: Address,
    pub at: DateTime<Utc>,
}

/// Command: DispatchProduct. A dispatch to the burn address is a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchProduct {
    pub product_id: ProductId,
    pub dispatch_id: DispatchId,
    pub from: Address,
    pub to: Address,
    pub at: DateTime<Utc>,
}

/// Command: AcceptDelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptDelivery {
    pub product_id: ProductId,
    pub dispatch_id: DispatchId,
    pub by: Address,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeCycleCommand {
    Mint(MintProduct),
    Dispatch(DispatchProduct),
    Accept(AcceptDelivery),
}

/// Event: ProductMinted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMinted {
    pub product_id: ProductId,
    pub customs: Address,
    pub at: DateTime<Utc>,
}

/// Event: ProductDispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDispatched {
    pub product_id: ProductId,
    pub dispatch_id: DispatchId,
    pub holder: Custodian,
    pub from: Address,
    pub to: Address,
    pub at: DateTime<Utc>,
}

/// Event: DeliveryAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAccepted {
    pub product_id: ProductId,
    pub dispatch_id: DispatchId,
    pub by: Address,
    pub stage: Custodian,
    pub at: DateTime<Utc>,
}

/// Event: ProductSold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSold {
    pub product_id: ProductId,
    pub dispatch_id: DispatchId,
    pub seller: Address,
    pub holder: Custodian,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeCycleEvent {
    Minted(ProductMinted),
    Dispatched(ProductDispatched),
    Accepted(DeliveryAccepted),
    Sold(ProductSold),
}

impl Event for LifeCycleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LifeCycleEvent::Minted(_) => "products.life_cycle.minted",
            LifeCycleEvent::Dispatched(_) => "products.life_cycle.dispatched",
            LifeCycleEvent::Accepted(_) => "products.life_cycle.accepted",
            LifeCycleEvent::Sold(_) => "products.life_cycle.sold",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LifeCycleEvent::Minted(e) => e.at,
            LifeCycleEvent::Dispatched(e) => e.at,
            LifeCycleEvent::Accepted(e) => e.at,
            LifeCycleEvent::Sold(e) => e.at,
        }
    }
}

impl Aggregate for ProductLifeCycle {
    type Command = LifeCycleCommand;
    type Event = LifeCycleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LifeCycleEvent::Minted(e) => {
                self.product_id = e.product_id;
                self.owner = e.customs.clone();
                self.status = ProductStatus::InHouse(Custodian::Customs);
                self.minted = true;
            }
            LifeCycleEvent::Dispatched(e) => {
                self.status = ProductStatus::Dispatched(e.holder);
                self.onward.set(e.holder, e.dispatch_id);
                self.in_transit = Some(InTransit {
                    dispatch_id: e.dispatch_id,
                    to: e.to.clone(),
                });
            }
            LifeCycleEvent::Accepted(e) => {
                self.owner = e.by.clone();
                self.status = ProductStatus::InHouse(e.stage);
                self.in_transit = None;
            }
            LifeCycleEvent::Sold(e) => {
                self.owner = Address::burn();
                self.status = ProductStatus::Sold;
                self.onward.set(e.holder, e.dispatch_id);
                self.in_transit = None;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LifeCycleCommand::Mint(cmd) => self.handle_mint(cmd),
            LifeCycleCommand::Dispatch(cmd) => self.handle_dispatch(cmd),
            LifeCycleCommand::Accept(cmd) => self.handle_accept(cmd),
        }
    }
}

impl ProductLifeCycle {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.product_id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_minted(&self) -> Result<(), DomainError> {
        if !self.minted {
            return Err(DomainError::not_found(format!("product {}", self.product_id)));
        }
        Ok(())
    }

    fn handle_mint(&self, cmd: &MintProduct) -> Result<Vec<LifeCycleEvent>, DomainError> {
        if self.minted {
            return Err(DomainError::conflict("product already minted"));
        }
        if cmd.customs.is_burn() {
            return Err(DomainError::validation("customs cannot be the burn address"));
        }

        Ok(vec![LifeCycleEvent::Minted(ProductMinted {
            product_id: cmd.product_id,
            customs: cmd.customs.clone(),
            at: cmd.at,
        })])
    }

    fn handle_dispatch(&self, cmd: &DispatchProduct) -> Result<Vec<LifeCycleEvent>, DomainError> {
        self.ensure_minted()?;
        self.ensure_product_id(cmd.product_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invariant("sold products cannot be dispatched"));
        }
        if cmd.from != self.owner {
            return Err(DomainError::unauthorized(format!(
                "{} does not own product {}",
                cmd.from, self.product_id
            )));
        }

        let ProductStatus::InHouse(holder) = self.status else {
            return Err(DomainError::conflict(format!(
                "product {} is already in transit",
                self.product_id
            )));
        };

        if cmd.to.is_burn() {
            return Ok(vec![LifeCycleEvent::Sold(ProductSold {
                product_id: cmd.product_id,
                dispatch_id: cmd.dispatch_id,
                seller: cmd.from.clone(),
                holder,
                at: cmd.at,
            })]);
        }

        if holder.next().is_none() {
            return Err(DomainError::invariant("retailers can only sell"));
        }
        if cmd.to == self.owner {
            return Err(DomainError::validation("cannot dispatch a product to its owner"));
        }

        Ok(vec![LifeCycleEvent::Dispatched(ProductDispatched {
            product_id: cmd.product_id,
            dispatch_id: cmd.dispatch_id,
            holder,
            from: cmd.from.clone(),
            to: cmd.to.clone(),
            at: cmd.at,
        })])
    }

    fn handle_accept(&self, cmd: &AcceptDelivery) -> Result<Vec<LifeCycleEvent>, DomainError> {
        self.ensure_minted()?;
        self.ensure_product_id(cmd.product_id)?;

        let Some(in_transit) = &self.in_transit else {
            if self.onward.contains(cmd.dispatch_id) {
                return Err(DomainError::conflict(format!(
                    "dispatch {} already accepted",
                    cmd.dispatch_id
                )));
            }
            return Err(DomainError::not_found(format!(
                "dispatch {} for product {}",
                cmd.dispatch_id, self.product_id
            )));
        };

        if in_transit.dispatch_id != cmd.dispatch_id {
            return Err(DomainError::conflict(format!(
                "product {} is in transit under dispatch {}, not {}",
                self.product_id, in_transit.dispatch_id, cmd.dispatch_id
            )));
        }
        if in_transit.to != cmd.by {
            return Err(DomainError::unauthorized(format!(
                "{} is not the receiver of dispatch {}",
                cmd.by, cmd.dispatch_id
            )));
        }

        let stage = match self.status {
            ProductStatus::Dispatched(holder) => holder.next(),
            _ => None,
        }
        .ok_or_else(|| DomainError::invariant("in-transit pointer without a dispatched status"))?;

        Ok(vec![LifeCycleEvent::Accepted(DeliveryAccepted {
            product_id: cmd.product_id,
            dispatch_id: cmd.dispatch_id,
            by: cmd.by.clone(),
            stage,
            at: cmd.at,
        })])
    }
}
