//! # Mandate Chain Builder
//!
//! Constructs and validates mandate records, enforcing the linkage and
//! role-completeness invariants before any mandate reaches a signer:
//!
//! - Cart totals are recomputed server-side from the authoritative
//!   catalog. Client-declared prices never enter a cart.
//! - A cart referencing an intent requires that intent to be fully
//!   authorized, unexpired, within its ceiling, and compatible with its
//!   merchant/category allow-lists.
//! - A payment requires its cart to be fully authorized.
//! - Signatures attach in the kind's signing order, at most once per
//!   role, and only while every parent link is fully authorized.
//!
//! The chain doubles as the mandate store: records keyed by id, with a
//! digest index and a parent-digest child index for audit walks.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use amp_core::{
    Amount, MandateDigest, MandateId, MerchantId, Timestamp, UserId, ValidationError,
};

use crate::catalog::{Catalog, CatalogError};
use crate::contents::{
    CartContents, IntentConstraints, IntentContents, LineItem, PaymentContents, PaymentMethod,
};
use crate::error::ChainError;
use crate::model::{Mandate, MandateContents, Signature};

/// A client's cart selection: which SKU and how many. Prices are looked
/// up from the catalog, never taken from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSelection {
    /// Catalog SKU.
    pub sku: String,
    /// Units requested.
    pub quantity: u32,
}

#[derive(Debug, Default)]
struct ChainStore {
    mandates: HashMap<MandateId, Mandate>,
    by_digest: HashMap<MandateDigest, MandateId>,
    children: HashMap<MandateDigest, Vec<MandateId>>,
}

/// The mandate chain: builder plus store.
#[derive(Debug, Default)]
pub struct MandateChain {
    inner: RwLock<ChainStore>,
}

impl MandateChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and store an Intent mandate.
    pub fn build_intent(
        &self,
        user_id: UserId,
        max_amount: Amount,
        constraints: IntentConstraints,
    ) -> Result<Mandate, ChainError> {
        let mandate = Mandate::new(MandateContents::Intent(IntentContents {
            user_id,
            max_amount,
            constraints,
        }));
        self.insert(mandate)
    }

    /// Build and store a Cart mandate, pricing every line from the catalog.
    ///
    /// `tax` and `shipping` are merchant-side fees supplied by the caller;
    /// the subtotal and total are recomputed here. When `intent_id` is
    /// given, the referenced intent must be fully authorized, unexpired,
    /// and its constraints must admit this cart.
    #[allow(clippy::too_many_arguments)]
    pub fn build_cart(
        &self,
        catalog: &dyn Catalog,
        merchant_id: MerchantId,
        selections: &[CartSelection],
        tax: Amount,
        shipping: Amount,
        shipping_address: Option<String>,
        intent_id: Option<&MandateId>,
    ) -> Result<Mandate, ChainError> {
        let intent = match intent_id {
            Some(id) => Some(self.require_authorized_intent(id)?),
            None => None,
        };

        if let Some((_, contents)) = &intent {
            if contents.is_expired(&Timestamp::now()) {
                return Err(ValidationError::IntentExpired {
                    expiry: contents
                        .constraints
                        .expiry
                        .map(|e| e.to_string())
                        .unwrap_or_default(),
                }
                .into());
            }
            if let Some(allowed) = &contents.constraints.allowed_merchants {
                if !allowed.contains(&merchant_id) {
                    return Err(ValidationError::MerchantNotAllowed {
                        merchant_id: merchant_id.to_string(),
                    }
                    .into());
                }
            }
        }

        let mut line_items = Vec::with_capacity(selections.len());
        let mut subtotal = Amount::zero(tax.currency().clone());
        for selection in selections {
            let priced = catalog.price_and_stock(&selection.sku)?;
            if selection.quantity > priced.available_quantity {
                return Err(CatalogError::OutOfStock {
                    sku: selection.sku.clone(),
                    requested: selection.quantity,
                    available: priced.available_quantity,
                }
                .into());
            }
            if let Some((_, contents)) = &intent {
                if let Some(allowed) = &contents.constraints.allowed_categories {
                    let category = priced.category.clone().unwrap_or_default();
                    if !allowed.contains(&category) {
                        return Err(ValidationError::CategoryNotAllowed { category }.into());
                    }
                }
            }
            let total_price = priced.unit_price.checked_mul(selection.quantity)?;
            subtotal = subtotal.checked_add(&total_price)?;
            line_items.push(LineItem {
                sku: selection.sku.clone(),
                description: priced.description,
                quantity: selection.quantity,
                unit_price: priced.unit_price,
                total_price,
                category: priced.category,
            });
        }

        let total = subtotal.checked_add(&tax)?.checked_add(&shipping)?;

        if let Some((_, contents)) = &intent {
            if total.exceeds(&contents.max_amount)? {
                return Err(ValidationError::ExceedsMaxAmount {
                    amount: total.value(),
                    max_amount: contents.max_amount.value(),
                }
                .into());
            }
        }

        let cart = CartContents {
            merchant_id,
            line_items,
            subtotal,
            tax,
            shipping,
            total,
            shipping_address,
            intent_hash: intent.as_ref().map(|(digest, _)| *digest),
        };
        cart.check_reconciliation()?;
        self.insert(Mandate::new(MandateContents::Cart(cart)))
    }

    /// Build and store a Payment mandate over a fully authorized cart.
    pub fn build_payment(
        &self,
        cart_id: &MandateId,
        payment_method: PaymentMethod,
        payer_id: UserId,
        risk_score: Option<u32>,
    ) -> Result<Mandate, ChainError> {
        let cart = self.get(cart_id).ok_or_else(|| {
            ChainError::UnknownMandate(cart_id.to_string())
        })?;
        let contents = cart.as_cart().ok_or_else(|| {
            ValidationError::Malformed(format!("{cart_id} is not a cart mandate"))
        })?;
        if !cart.is_fully_authorized() {
            return Err(ChainError::PriorLinkIncomplete {
                reference: cart_id.to_string(),
            });
        }
        let payment = PaymentContents {
            cart_hash: cart.digest()?,
            intent_hash: contents.intent_hash,
            payment_method,
            amount: contents.total.clone(),
            payer_id,
            payee_id: contents.merchant_id.clone(),
            risk_score,
        };
        self.insert(Mandate::new(MandateContents::Payment(payment)))
    }

    /// Attach a verified signature to a mandate.
    ///
    /// The cryptographic check happens before this call (session layer);
    /// this enforces the structural invariants: the role must be required
    /// for the kind and next in signing order (`InvalidSignerRole`), not
    /// yet present (`AlreadySigned`), every parent link fully authorized
    /// (`PriorLinkIncomplete`), and cart contents must still reconcile —
    /// no signature is ever accepted over a non-reconciling cart.
    pub fn attach_signature(
        &self,
        mandate_id: &MandateId,
        signature: Signature,
    ) -> Result<Mandate, ChainError> {
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mandate = store
            .mandates
            .get(mandate_id)
            .ok_or_else(|| ChainError::UnknownMandate(mandate_id.to_string()))?;

        let kind = mandate.kind();
        if !kind.required_roles().contains(&signature.role) {
            return Err(ChainError::InvalidSignerRole {
                role: signature.role,
                kind,
            });
        }
        if mandate.has_signed(signature.role) {
            return Err(ChainError::AlreadySigned {
                role: signature.role,
                mandate_id: mandate_id.to_string(),
            });
        }
        if mandate.next_expected_role() != Some(signature.role) {
            // Required but out of order: a payer cannot accept a cart the
            // merchant has not priced yet.
            return Err(ChainError::InvalidSignerRole {
                role: signature.role,
                kind,
            });
        }

        if let Some(cart) = mandate.as_cart() {
            cart.check_reconciliation()?;
        }

        for parent in parent_digests(mandate) {
            let authorized = store
                .by_digest
                .get(&parent)
                .and_then(|id| store.mandates.get(id))
                .is_some_and(|m| m.is_fully_authorized());
            if !authorized {
                return Err(ChainError::PriorLinkIncomplete {
                    reference: parent.to_string(),
                });
            }
        }

        let mandate = store
            .mandates
            .get_mut(mandate_id)
            .ok_or_else(|| ChainError::UnknownMandate(mandate_id.to_string()))?;
        debug!(
            mandate = %mandate_id,
            kind = %kind,
            role = %signature.role,
            "signature attached"
        );
        mandate.signatures.push(signature);
        Ok(mandate.clone())
    }

    /// Whether a mandate is fully authorized.
    pub fn is_fully_authorized(&self, mandate_id: &MandateId) -> Result<bool, ChainError> {
        self.get(mandate_id)
            .map(|m| m.is_fully_authorized())
            .ok_or_else(|| ChainError::UnknownMandate(mandate_id.to_string()))
    }

    /// Fetch a mandate by id.
    pub fn get(&self, mandate_id: &MandateId) -> Option<Mandate> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .mandates
            .get(mandate_id)
            .cloned()
    }

    /// Fetch a mandate by its contents digest.
    pub fn get_by_digest(&self, digest: &MandateDigest) -> Option<Mandate> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store
            .by_digest
            .get(digest)
            .and_then(|id| store.mandates.get(id))
            .cloned()
    }

    /// Mandates that reference the given digest as a parent.
    pub fn children_of(&self, digest: &MandateDigest) -> Vec<Mandate> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store
            .children
            .get(digest)
            .into_iter()
            .flatten()
            .filter_map(|id| store.mandates.get(id))
            .cloned()
            .collect()
    }

    fn insert(&self, mandate: Mandate) -> Result<Mandate, ChainError> {
        let digest = mandate.digest()?;
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        store.by_digest.insert(digest, mandate.id.clone());
        for parent in parent_digests(&mandate) {
            store
                .children
                .entry(parent)
                .or_default()
                .push(mandate.id.clone());
        }
        debug!(mandate = %mandate.id, kind = %mandate.kind(), digest = %digest, "mandate stored");
        store.mandates.insert(mandate.id.clone(), mandate.clone());
        Ok(mandate)
    }

    /// Resolve an intent reference to its digest and contents, requiring
    /// full authorization.
    fn require_authorized_intent(
        &self,
        intent_id: &MandateId,
    ) -> Result<(MandateDigest, IntentContents), ChainError> {
        let mandate = self
            .get(intent_id)
            .ok_or_else(|| ChainError::UnknownMandate(intent_id.to_string()))?;
        let contents = mandate
            .as_intent()
            .ok_or_else(|| ValidationError::Malformed(format!("{intent_id} is not an intent mandate")))?
            .clone();
        if !mandate.is_fully_authorized() {
            return Err(ChainError::PriorLinkIncomplete {
                reference: intent_id.to_string(),
            });
        }
        Ok((mandate.digest()?, contents))
    }
}

/// Parent digests a mandate links against.
fn parent_digests(mandate: &Mandate) -> Vec<MandateDigest> {
    match &mandate.contents {
        MandateContents::Intent(_) => Vec::new(),
        MandateContents::Cart(c) => c.intent_hash.into_iter().collect(),
        MandateContents::Payment(p) => {
            let mut parents = vec![p.cart_hash];
            parents.extend(p.intent_hash);
            parents
        }
    }
}
