//! # Price quotes
//!
//! Turns the cost of an upstream product (in the retailer's currency, usually USD) into the amount charged to the
//! buyer, in minor units of the local currency.
//!
//! ```text
//! base     = (cost + shipping) * conversion_rate
//! tax      = tax_rate * base
//! margin   = margin_rate * (base + tax)
//! subtotal = base + tax + margin
//! charged  = subtotal                     multi-installment (the buyer pays the installment fee)
//!          | subtotal / (1 - card_fee)    single card payment
//!          | subtotal / (1 - instant_fee) pix / bank slip
//! total    = ceil(charged / unit) * unit - 0.01, floored at zero
//! ```
//!
//! All arithmetic uses exact decimals. Quotes are deterministic for a given configuration.
use std::str::FromStr;

use log::*;
use rpg_common::Cents;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_CONVERSION_RATE: Decimal = dec!(5.5);
pub const DEFAULT_SHIPPING_COST: Decimal = dec!(0);
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.60);
pub const DEFAULT_MARGIN_RATE: Decimal = dec!(0.05);
pub const DEFAULT_FEE_INSTALLMENT: Decimal = dec!(0.1991);
pub const DEFAULT_FEE_CARD_SINGLE: Decimal = dec!(0.0498);
pub const DEFAULT_FEE_INSTANT: Decimal = dec!(0.0099);
pub const DEFAULT_ROUNDING_UNIT: Decimal = dec!(5);

const ONE_CENT: Decimal = dec!(0.01);

#[derive(Debug, Clone, Error)]
pub enum PricingError {
    #[error("The price for a cost of {0} cannot be represented")]
    Overflow(Decimal),
    #[error("The total for {0} cannot be represented")]
    TotalOverflow(String),
}

//--------------------------------------     PricingConfig     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    /// Units of local currency per unit of source currency
    pub conversion_rate: Decimal,
    /// Shipping cost per item, in the source currency. It is part of the taxed base.
    pub shipping_cost: Decimal,
    pub tax_rate: Decimal,
    pub margin_rate: Decimal,
    /// The gateway's generic installment fee. Informational: installment payments are never grossed up.
    pub fee_installment: Decimal,
    pub fee_card_single: Decimal,
    pub fee_instant: Decimal,
    /// Charm rounding step, in major units of the local currency
    pub rounding_unit: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            conversion_rate: DEFAULT_CONVERSION_RATE,
            shipping_cost: DEFAULT_SHIPPING_COST,
            tax_rate: DEFAULT_TAX_RATE,
            margin_rate: DEFAULT_MARGIN_RATE,
            fee_installment: DEFAULT_FEE_INSTALLMENT,
            fee_card_single: DEFAULT_FEE_CARD_SINGLE,
            fee_instant: DEFAULT_FEE_INSTANT,
            rounding_unit: DEFAULT_ROUNDING_UNIT,
        }
    }
}

impl PricingConfig {
    /// Reads the pricing tunables from the environment. Missing or unusable values fall back to their defaults.
    pub fn from_env_or_default() -> Self {
        let config = Self {
            conversion_rate: decimal_from_env("RPG_USD_TO_BRL", DEFAULT_CONVERSION_RATE),
            shipping_cost: decimal_from_env("RPG_SHIPPING_COST", DEFAULT_SHIPPING_COST),
            tax_rate: decimal_from_env("RPG_TAX_RATE", DEFAULT_TAX_RATE),
            margin_rate: decimal_from_env("RPG_MARGIN_RATE", DEFAULT_MARGIN_RATE),
            fee_installment: decimal_from_env("RPG_FEE_INSTALLMENT", DEFAULT_FEE_INSTALLMENT),
            fee_card_single: decimal_from_env("RPG_FEE_CARD_SINGLE", DEFAULT_FEE_CARD_SINGLE),
            fee_instant: decimal_from_env("RPG_FEE_INSTANT", DEFAULT_FEE_INSTANT),
            rounding_unit: decimal_from_env("RPG_ROUNDING_UNIT", DEFAULT_ROUNDING_UNIT),
        };
        config.sanitized()
    }

    /// Replaces every value that cannot be used for pricing with its default, logging a warning for each.
    ///
    /// Rates and costs must be non-negative, fee rates must be below one, and the conversion rate and rounding unit
    /// must be positive.
    pub fn sanitized(self) -> Self {
        let positive = |v: &Decimal| *v > Decimal::ZERO;
        let non_negative = |v: &Decimal| !v.is_sign_negative() || v.is_zero();
        let fee = |v: &Decimal| non_negative(v) && *v < Decimal::ONE;
        Self {
            conversion_rate: checked("conversion rate", self.conversion_rate, DEFAULT_CONVERSION_RATE, positive),
            shipping_cost: checked("shipping cost", self.shipping_cost, DEFAULT_SHIPPING_COST, non_negative),
            tax_rate: checked("tax rate", self.tax_rate, DEFAULT_TAX_RATE, non_negative),
            margin_rate: checked("margin rate", self.margin_rate, DEFAULT_MARGIN_RATE, non_negative),
            fee_installment: checked("installment fee", self.fee_installment, DEFAULT_FEE_INSTALLMENT, fee),
            fee_card_single: checked("card fee", self.fee_card_single, DEFAULT_FEE_CARD_SINGLE, fee),
            fee_instant: checked("instant transfer fee", self.fee_instant, DEFAULT_FEE_INSTANT, fee),
            rounding_unit: checked("rounding unit", self.rounding_unit, DEFAULT_ROUNDING_UNIT, positive),
        }
    }

    pub fn with_conversion_rate(mut self, rate: Decimal) -> Self {
        self.conversion_rate = rate;
        self
    }

    pub fn with_shipping_cost(mut self, cost: Decimal) -> Self {
        self.shipping_cost = cost;
        self
    }
}

fn checked(name: &str, value: Decimal, default: Decimal, valid: impl Fn(&Decimal) -> bool) -> Decimal {
    if valid(&value) {
        value
    } else {
        warn!("🧾️ The configured {name} ({value}) is not usable. Using the default, {default}, instead.");
        default
    }
}

fn decimal_from_env(name: &str, default: Decimal) -> Decimal {
    match std::env::var(name) {
        Ok(s) => parse_decimal(&s).unwrap_or_else(|| {
            warn!("🧾️ {name} is not a valid number ({s}). Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🧾️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

/// Permissive decimal parsing. Accepts plain and scientific notation, and a comma as decimal separator.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .or_else(|_| Decimal::from_str(&s.replace(',', ".")))
        .ok()
}

//--------------------------------------  PaymentMethodClass   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodClass {
    /// Card payment split into two or more installments
    MultiInstallment,
    /// Card payment in a single installment
    SingleCard,
    /// Pix or bank slip
    InstantTransfer,
}

impl PaymentMethodClass {
    /// Classifies a payment from the gateway's payment method id and the number of installments.
    pub fn classify(payment_method_id: Option<&str>, installments: Option<u32>) -> Self {
        if installments.unwrap_or(1) > 1 {
            return Self::MultiInstallment;
        }
        match payment_method_id.map(|s| s.trim().to_ascii_lowercase()) {
            Some(id) if matches!(id.as_str(), "pix" | "bolbradesco" | "pec") => Self::InstantTransfer,
            _ => Self::SingleCard,
        }
    }
}

//--------------------------------------      PriceQuote       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub method: PaymentMethodClass,
    pub base: Decimal,
    pub tax: Decimal,
    pub margin: Decimal,
    pub subtotal: Decimal,
    /// The fee rate absorbed into the price, if any
    pub absorbed_fee_rate: Option<Decimal>,
    /// The amount before charm rounding
    pub charged: Decimal,
    pub total: Cents,
}

/// One line of an order, as it was priced when the order was created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeLine {
    pub quantity: i64,
    /// The recorded multi-installment unit price
    pub unit_price: Cents,
    /// The unit subtotal before fees and rounding. Only upstream lines have one.
    pub unit_subtotal: Option<Decimal>,
}

//--------------------------------------   PriceQuoteEngine    ---------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct PriceQuoteEngine {
    config: PricingConfig,
}

impl PriceQuoteEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config: config.sanitized() }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// The fee rate absorbed for the given class of payment method.
    pub fn fee_rate(&self, method: PaymentMethodClass) -> Option<Decimal> {
        match method {
            PaymentMethodClass::MultiInstallment => None,
            PaymentMethodClass::SingleCard => Some(self.config.fee_card_single),
            PaymentMethodClass::InstantTransfer => Some(self.config.fee_instant),
        }
    }

    /// Prices one unit of an upstream product with the given cost, in the source currency.
    ///
    /// Negative costs are clamped to zero with a warning.
    pub fn quote(&self, cost: Decimal, method: PaymentMethodClass) -> Result<PriceQuote, PricingError> {
        let cost = if cost.is_sign_negative() && !cost.is_zero() {
            warn!("🧾️ Negative cost ({cost}) received for pricing. Using zero instead.");
            Decimal::ZERO
        } else {
            cost
        };
        let overflow = || PricingError::Overflow(cost);
        let c = &self.config;
        let base = cost.checked_add(c.shipping_cost).and_then(|v| v.checked_mul(c.conversion_rate)).ok_or_else(overflow)?;
        let tax = c.tax_rate.checked_mul(base).ok_or_else(overflow)?;
        let taxed = base.checked_add(tax).ok_or_else(overflow)?;
        let margin = c.margin_rate.checked_mul(taxed).ok_or_else(overflow)?;
        let subtotal = taxed.checked_add(margin).ok_or_else(overflow)?;
        let absorbed_fee_rate = self.fee_rate(method);
        let charged = self.charged_amount(subtotal, method).ok_or_else(overflow)?;
        let total = self.charm_round(charged).ok_or_else(overflow)?;
        trace!("🧾️ Quote for {cost} ({method:?}): subtotal {subtotal}, charged {charged}, total {total}");
        Ok(PriceQuote { method, base, tax, margin, subtotal, absorbed_fee_rate, charged, total })
    }

    /// The unit price recorded on order lines. This is the multi-installment price: no fee is absorbed.
    pub fn list_price(&self, cost: Decimal) -> Result<Cents, PricingError> {
        self.quote(cost, PaymentMethodClass::MultiInstallment).map(|q| q.total)
    }

    /// The subtotal with the fee for the method class absorbed, before charm rounding.
    fn charged_amount(&self, subtotal: Decimal, method: PaymentMethodClass) -> Option<Decimal> {
        match self.fee_rate(method) {
            Some(rate) => gross_up(subtotal, rate),
            None => Some(subtotal),
        }
    }

    /// The price of one unit with the given subtotal, paid with the given method. For the same subtotal this is
    /// always `quote(cost, method).total`.
    pub fn unit_price_from_subtotal(&self, subtotal: Decimal, method: PaymentMethodClass) -> Result<Cents, PricingError> {
        let overflow = || PricingError::Overflow(subtotal);
        let charged = self.charged_amount(subtotal, method).ok_or_else(overflow)?;
        self.charm_round(charged).ok_or_else(overflow)
    }

    /// The amount to charge for a direct payment of an order with the given lines.
    ///
    /// Installment payments are charged the recorded line totals, which add up to the order total. For single
    /// payments, upstream lines are repriced from their recorded subtotal with the fee for the method absorbed, which
    /// gives exactly the quote for that method. Catalog lines have no subtotal: their prices are final retail prices,
    /// so their combined total is grossed up by the fee and rounded up to the cent, without charm rounding.
    pub fn transaction_amount(&self, lines: &[ChargeLine], method: PaymentMethodClass) -> Result<Cents, PricingError> {
        let overflow = |what: &str| PricingError::TotalOverflow(what.to_string());
        let Some(rate) = self.fee_rate(method) else {
            return lines.iter().try_fold(Cents::default(), |total, line| {
                line.unit_price
                    .checked_mul(line.quantity)
                    .and_then(|t| total.checked_add(t))
                    .ok_or_else(|| overflow("the order lines"))
            });
        };
        let mut upstream = Cents::default();
        let mut catalog = Cents::default();
        for line in lines {
            match line.unit_subtotal {
                Some(subtotal) => {
                    let unit = self.unit_price_from_subtotal(subtotal, method)?;
                    upstream = unit
                        .checked_mul(line.quantity)
                        .and_then(|t| upstream.checked_add(t))
                        .ok_or_else(|| overflow("the upstream lines"))?;
                },
                None => {
                    catalog = line
                        .unit_price
                        .checked_mul(line.quantity)
                        .and_then(|t| catalog.checked_add(t))
                        .ok_or_else(|| overflow("the catalog lines"))?;
                },
            }
        }
        let catalog = gross_up(catalog.to_decimal(), rate)
            .and_then(ceil_to_cent)
            .ok_or_else(|| overflow("the catalog lines"))?;
        upstream.checked_add(catalog).ok_or_else(|| overflow("the order"))
    }

    /// Rounds up to the next multiple of the rounding unit, minus one cent, and floors the result at zero.
    ///
    /// Amounts that are already an exact multiple of the unit are not bumped up, so they end one cent below the
    /// multiple.
    pub fn charm_round(&self, amount: Decimal) -> Option<Cents> {
        let unit = self.config.rounding_unit;
        let steps = amount.checked_div(unit)?.ceil();
        let rounded = steps.checked_mul(unit)?.checked_sub(ONE_CENT)?.max(Decimal::ZERO);
        Cents::try_from(rounded).ok()
    }

    /// Parses an upstream price. Prices that cannot be read are logged and priced as zero.
    pub fn parse_cost(&self, raw: &str) -> Decimal {
        parse_decimal(raw).unwrap_or_else(|| {
            warn!("🧾️ Could not read the upstream price '{raw}'. Pricing it as zero.");
            Decimal::ZERO
        })
    }
}

fn gross_up(amount: Decimal, fee_rate: Decimal) -> Option<Decimal> {
    amount.checked_div(Decimal::ONE.checked_sub(fee_rate)?)
}

fn ceil_to_cent(amount: Decimal) -> Option<Cents> {
    let cents = amount.checked_mul(Decimal::ONE_HUNDRED)?.ceil();
    cents.to_i64().map(Cents::from)
}
