//! # Mandate Contents — Intent, Cart, Payment Payloads
//!
//! The type-specific payloads of the three mandate kinds. Contents are
//! what gets canonicalized and digested; signatures never are. Parent
//! links (`intent_hash`, `cart_hash`) live inside the contents so the
//! lineage is covered by every signature over the child.

use serde::{Deserialize, Serialize};

use amp_core::{
    Amount, MandateDigest, MerchantId, PaymentMethodId, Timestamp, UserId, ValidationError,
};

/// Optional constraints the shopper places on their spending intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentConstraints {
    /// Merchants the intent may be spent at; `None` means any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_merchants: Option<Vec<MerchantId>>,
    /// Categories the intent may be spent on; `None` means any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_categories: Option<Vec<String>>,
    /// The intent is void after this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,
}

/// Contents of an Intent mandate: the shopper's spending authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentContents {
    /// The shopper granting the authority.
    pub user_id: UserId,
    /// Ceiling for any cart authorized under this intent.
    pub max_amount: Amount,
    /// Constraints on where and on what the intent may be spent.
    #[serde(default)]
    pub constraints: IntentConstraints,
}

impl IntentContents {
    /// Whether the intent has expired as of `now`.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        matches!(&self.constraints.expiry, Some(expiry) if now > expiry)
    }
}

/// One priced line of a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog SKU.
    pub sku: String,
    /// Human-readable description from the catalog.
    pub description: String,
    /// Units purchased.
    pub quantity: u32,
    /// Authoritative unit price.
    pub unit_price: Amount,
    /// `unit_price × quantity`, stated explicitly so the reconciliation
    /// check covers it.
    pub total_price: Amount,
    /// Merchandising category, used against intent constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Contents of a Cart mandate: a priced basket from one merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartContents {
    /// The merchant whose registered key must sign this cart.
    pub merchant_id: MerchantId,
    /// Priced lines, in presentation order.
    pub line_items: Vec<LineItem>,
    /// Sum of line totals.
    pub subtotal: Amount,
    /// Tax on the subtotal.
    pub tax: Amount,
    /// Shipping cost.
    pub shipping: Amount,
    /// `subtotal + tax + shipping` — must reconcile exactly.
    pub total: Amount,
    /// Destination address, when the cart ships.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    /// Digest of the Intent mandate this cart spends against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_hash: Option<MandateDigest>,
}

impl CartContents {
    /// Verify that the stated amounts reconcile exactly.
    ///
    /// Checks, in minor units with zero tolerance:
    /// - each line's `total_price == unit_price × quantity`,
    /// - `sum(line totals) == subtotal`,
    /// - `subtotal + tax + shipping == total`,
    /// - a single currency throughout.
    ///
    /// Mismatches are rejected, never rounded or corrected.
    pub fn check_reconciliation(&self) -> Result<(), ValidationError> {
        if self.line_items.is_empty() {
            return Err(ValidationError::Malformed("cart has no line items".into()));
        }
        let currency = self.total.currency().clone();
        let mut computed_subtotal = Amount::zero(currency.clone());
        for item in &self.line_items {
            let expected = item
                .unit_price
                .checked_mul(item.quantity)
                .map_err(money_to_validation)?;
            if expected != item.total_price {
                return Err(ValidationError::Reconciliation {
                    field: "line_item.total_price",
                    expected: expected.value(),
                    actual: item.total_price.value(),
                });
            }
            computed_subtotal = computed_subtotal
                .checked_add(&item.total_price)
                .map_err(money_to_validation)?;
        }
        if computed_subtotal != self.subtotal {
            return Err(ValidationError::Reconciliation {
                field: "subtotal",
                expected: computed_subtotal.value(),
                actual: self.subtotal.value(),
            });
        }
        let computed_total = self
            .subtotal
            .checked_add(&self.tax)
            .and_then(|t| t.checked_add(&self.shipping))
            .map_err(money_to_validation)?;
        if computed_total != self.total {
            return Err(ValidationError::Reconciliation {
                field: "total",
                expected: computed_total.value(),
                actual: self.total.value(),
            });
        }
        Ok(())
    }
}

fn money_to_validation(e: amp_core::MoneyError) -> ValidationError {
    match e {
        amp_core::MoneyError::CurrencyMismatch { left, right } => {
            ValidationError::CurrencyMismatch { left, right }
        }
        other => ValidationError::Malformed(other.to_string()),
    }
}

/// A stored payment method reference.
///
/// `requires_step_up` is a static policy attribute of the instrument
/// (e.g., an issuer that mandates 3-D-Secure-style verification), not a
/// dynamic risk decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Opaque reference to the stored instrument.
    pub id: PaymentMethodId,
    /// Display label (e.g., "Visa ···4242").
    pub display: String,
    /// Whether this instrument requires an out-of-band step-up challenge
    /// before authorization.
    pub requires_step_up: bool,
}

/// Contents of a Payment mandate: the charge instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentContents {
    /// Digest of the fully authorized Cart mandate being paid.
    pub cart_hash: MandateDigest,
    /// Digest of the Intent mandate, carried through for auditability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_hash: Option<MandateDigest>,
    /// The instrument to charge.
    pub payment_method: PaymentMethod,
    /// Amount to charge; equals the cart total.
    pub amount: Amount,
    /// The paying shopper.
    pub payer_id: UserId,
    /// The merchant being paid.
    pub payee_id: MerchantId,
    /// Risk score attached by an upstream scorer, if any. Opaque here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_core::CurrencyCode;

    fn jpy(v: &str) -> Amount {
        Amount::new(v, CurrencyCode::new("JPY").unwrap()).unwrap()
    }

    fn sample_cart() -> CartContents {
        CartContents {
            merchant_id: MerchantId::new("merchant-1"),
            line_items: vec![
                LineItem {
                    sku: "sku-1".into(),
                    description: "Ceramic mug".into(),
                    quantity: 2,
                    unit_price: jpy("1500"),
                    total_price: jpy("3000"),
                    category: Some("kitchen".into()),
                },
                LineItem {
                    sku: "sku-2".into(),
                    description: "Tea sampler".into(),
                    quantity: 1,
                    unit_price: jpy("1500"),
                    total_price: jpy("1500"),
                    category: Some("pantry".into()),
                },
            ],
            subtotal: jpy("4500"),
            tax: jpy("450"),
            shipping: jpy("0"),
            total: jpy("4950"),
            shipping_address: Some("Chiyoda-ku, Tokyo".into()),
            intent_hash: None,
        }
    }

    #[test]
    fn reconciled_cart_passes() {
        sample_cart().check_reconciliation().unwrap();
    }

    #[test]
    fn line_total_mismatch_rejected() {
        let mut cart = sample_cart();
        cart.line_items[0].total_price = jpy("2999");
        let err = cart.check_reconciliation().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Reconciliation { field: "line_item.total_price", .. }
        ));
    }

    #[test]
    fn subtotal_mismatch_rejected() {
        let mut cart = sample_cart();
        cart.subtotal = jpy("4501");
        // Line totals still reconcile individually; the subtotal does not.
        cart.total = jpy("4951");
        let err = cart.check_reconciliation().unwrap_err();
        assert!(matches!(err, ValidationError::Reconciliation { field: "subtotal", .. }));
    }

    #[test]
    fn total_off_by_one_minor_unit_rejected() {
        let mut cart = sample_cart();
        cart.total = jpy("4951");
        let err = cart.check_reconciliation().unwrap_err();
        assert!(matches!(err, ValidationError::Reconciliation { field: "total", .. }));
    }

    #[test]
    fn empty_cart_rejected() {
        let mut cart = sample_cart();
        cart.line_items.clear();
        assert!(matches!(
            cart.check_reconciliation(),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn mixed_currencies_rejected() {
        let mut cart = sample_cart();
        cart.tax = Amount::new("4.50", CurrencyCode::new("USD").unwrap()).unwrap();
        assert!(matches!(
            cart.check_reconciliation(),
            Err(ValidationError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn intent_expiry() {
        let now = Timestamp::parse("2026-03-01T12:00:00Z").unwrap();
        let mut intent = IntentContents {
            user_id: UserId::new("user-1"),
            max_amount: jpy("5000"),
            constraints: IntentConstraints::default(),
        };
        assert!(!intent.is_expired(&now));
        intent.constraints.expiry = Some(Timestamp::parse("2026-02-01T00:00:00Z").unwrap());
        assert!(intent.is_expired(&now));
        intent.constraints.expiry = Some(Timestamp::parse("2026-03-01T12:00:00Z").unwrap());
        assert!(!intent.is_expired(&now));
    }
}
