use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::types::*;
use crate::core::{InvoiceId, MoadianError};

/// Amounts are whole Rials.
const AMOUNT_SCALE: u32 = 0;

const MAX_ITEMS: usize = 10_000;

/// Amounts travel as JSON doubles; beyond 2^53 they stop being exact.
pub const MAX_AMOUNT: Decimal = dec!(9007199254740991);

/// Builder for constructing consistent invoices.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use moadian::core::InvoiceIdGenerator;
/// use moadian::invoice::*;
/// use rust_decimal_macros::dec;
///
/// let issued = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
/// let taxid = InvoiceIdGenerator::new("A11216").unwrap().generate(issued, 1).unwrap();
///
/// let invoice = InvoiceBuilder::new(taxid, issued, "14003778990")
///     .buyer(BuyerType::LegalEntity, "10101010101")
///     .add_item(ItemBuilder::new("2330001234567", "Tea", dec!(2), "164", dec!(150000))
///         .vat_rate(dec!(10))
///         .build())
///     .build()
///     .unwrap();
///
/// assert_eq!(invoice.header.tbill, dec!(330000));
/// ```
pub struct InvoiceBuilder {
    taxid: InvoiceId,
    issued_at: DateTime<Utc>,
    created_at: Option<DateTime<Utc>>,
    seller_tin: String,
    inno: Option<String>,
    inty: InvoiceType,
    inp: InvoicePattern,
    ins: InvoiceSubject,
    irtaxid: Option<InvoiceId>,
    tob: Option<BuyerType>,
    bid: Option<String>,
    tinb: Option<String>,
    bpc: Option<String>,
    setm: SettlementMethod,
    cash_amount: Option<Decimal>,
    items: Vec<InvoiceItem>,
    payments: Vec<Payment>,
}

impl InvoiceBuilder {
    pub fn new(taxid: InvoiceId, issued_at: DateTime<Utc>, seller_tin: impl Into<String>) -> Self {
        Self {
            taxid,
            issued_at,
            created_at: None,
            seller_tin: seller_tin.into(),
            inno: None,
            inty: InvoiceType::Standard,
            inp: InvoicePattern::Sale,
            ins: InvoiceSubject::Original,
            irtaxid: None,
            tob: None,
            bid: None,
            tinb: None,
            bpc: None,
            setm: SettlementMethod::Cash,
            cash_amount: None,
            items: Vec::new(),
            payments: Vec::new(),
        }
    }

    /// Creation time if it differs from the issue time.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Override the internal serial (defaults to the tax id's sequence segment).
    pub fn internal_serial(mut self, inno: impl Into<String>) -> Self {
        self.inno = Some(inno.into());
        self
    }

    pub fn invoice_type(mut self, inty: InvoiceType) -> Self {
        self.inty = inty;
        self
    }

    pub fn pattern(mut self, inp: InvoicePattern) -> Self {
        self.inp = inp;
        self
    }

    /// Correction, cancellation, or return of the invoice `reference`.
    pub fn amends(mut self, subject: InvoiceSubject, reference: InvoiceId) -> Self {
        self.ins = subject;
        self.irtaxid = Some(reference);
        self
    }

    /// Buyer type and tax identification number.
    pub fn buyer(mut self, tob: BuyerType, tinb: impl Into<String>) -> Self {
        self.tob = Some(tob);
        self.tinb = Some(tinb.into());
        self
    }

    pub fn buyer_national_id(mut self, bid: impl Into<String>) -> Self {
        self.bid = Some(bid.into());
        self
    }

    pub fn buyer_postal_code(mut self, bpc: impl Into<String>) -> Self {
        self.bpc = Some(bpc.into());
        self
    }

    pub fn settlement(mut self, setm: SettlementMethod) -> Self {
        self.setm = setm;
        self
    }

    /// Cash portion of a [`SettlementMethod::Mixed`] settlement.
    pub fn cash_amount(mut self, amount: Decimal) -> Self {
        self.cash_amount = Some(amount);
        self
    }

    pub fn add_item(mut self, item: InvoiceItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn add_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    /// Build the invoice, calculating totals and checking consistency.
    pub fn build(self) -> Result<Invoice, MoadianError> {
        if self.items.is_empty() {
            return Err(MoadianError::InvalidArgument(
                "at least one item is required".into(),
            ));
        }
        if self.items.len() > MAX_ITEMS {
            return Err(MoadianError::InvalidArgument(format!(
                "invoice cannot have more than {MAX_ITEMS} items"
            )));
        }
        if self.seller_tin.trim().is_empty() {
            return Err(MoadianError::InvalidArgument(
                "seller tax id (tins) is required".into(),
            ));
        }
        if self.ins.references_earlier() && self.irtaxid.is_none() {
            return Err(MoadianError::InvalidArgument(format!(
                "subject {:?} requires the referenced tax id (irtaxid)",
                self.ins
            )));
        }
        if self.inty == InvoiceType::Standard && self.tinb.is_none() && self.bid.is_none() {
            return Err(MoadianError::InvalidArgument(
                "standard invoices must identify the buyer (tinb or bid)".into(),
            ));
        }
        for (idx, item) in self.items.iter().enumerate() {
            validate_item(idx, item)?;
        }
        for payment in &self.payments {
            if let Some(pv) = payment.pv {
                check_amount("payment amount", pv)?;
            }
        }

        let inno = self
            .inno
            .unwrap_or_else(|| self.taxid.sequence_hex().to_string());
        let mut invoice = Invoice {
            header: InvoiceHeader {
                taxid: self.taxid,
                indatim: self.issued_at.timestamp_millis(),
                indati2m: self.created_at.unwrap_or(self.issued_at).timestamp_millis(),
                inty: self.inty,
                inno,
                irtaxid: self.irtaxid,
                inp: self.inp,
                ins: self.ins,
                tins: self.seller_tin,
                tob: self.tob,
                bid: self.bid,
                tinb: self.tinb,
                bpc: self.bpc,
                tprdis: Decimal::ZERO,
                tdis: Decimal::ZERO,
                tadis: Decimal::ZERO,
                tvam: Decimal::ZERO,
                todam: Decimal::ZERO,
                tbill: Decimal::ZERO,
                setm: self.setm,
                cap: Decimal::ZERO,
                insp: Decimal::ZERO,
            },
            body: self.items,
            payments: self.payments,
        };

        calculate_totals(&mut invoice)?;

        let tbill = invoice.header.tbill;
        let (cap, insp) = match self.setm {
            SettlementMethod::Cash => (tbill, Decimal::ZERO),
            SettlementMethod::Credit => (Decimal::ZERO, tbill),
            SettlementMethod::Mixed => {
                let cash = self.cash_amount.ok_or_else(|| {
                    MoadianError::InvalidArgument("mixed settlement needs a cash amount".into())
                })?;
                check_amount("cash amount", cash)?;
                if cash < Decimal::ZERO || cash > tbill {
                    return Err(MoadianError::InvalidArgument(format!(
                        "cash amount {cash} must be between 0 and the total {tbill}"
                    )));
                }
                (cash, tbill - cash)
            }
        };
        invoice.header.cap = cap;
        invoice.header.insp = insp;

        Ok(invoice)
    }
}

fn validate_item(idx: usize, item: &InvoiceItem) -> Result<(), MoadianError> {
    let fail = |msg: String| Err(MoadianError::InvalidArgument(format!("item {idx}: {msg}")));
    if item.sstid.trim().is_empty() {
        return fail("product id (sstid) is required".into());
    }
    for (field, value) in [
        ("quantity", item.am),
        ("unit price", item.fee),
        ("discount", item.dis),
        ("VAT rate", item.vra),
        ("other duties", item.odam),
    ] {
        if let Err(MoadianError::InvalidArgument(msg)) = check_amount(field, value) {
            return fail(msg);
        }
    }
    if item.am <= Decimal::ZERO {
        return fail(format!("quantity must be positive, got {}", item.am));
    }
    if item.fee < Decimal::ZERO {
        return fail(format!("unit price must not be negative, got {}", item.fee));
    }
    let Some(line) = item.am.checked_mul(item.fee) else {
        return fail(format!("line amount {} x {} overflows", item.am, item.fee));
    };
    if item.dis < Decimal::ZERO || item.dis > line {
        return fail(format!("discount {} exceeds the line amount", item.dis));
    }
    if item.vra < Decimal::ZERO || item.vra > dec!(100) {
        return fail(format!("VAT rate {} is not a percentage", item.vra));
    }
    if item.odam < Decimal::ZERO {
        return fail(format!("other duties must not be negative, got {}", item.odam));
    }
    Ok(())
}

/// Reject amounts the wire format cannot carry exactly: anything above
/// [`MAX_AMOUNT`] or with more digits than a double keeps.
pub fn check_amount(field: &str, value: Decimal) -> Result<Decimal, MoadianError> {
    let exact = value.abs() <= MAX_AMOUNT
        && value
            .to_f64()
            .and_then(|f| Decimal::from_str(&f.to_string()).ok())
            == Some(value);
    if exact {
        Ok(value)
    } else {
        Err(MoadianError::InvalidArgument(format!(
            "{field} {value} cannot be represented exactly as a JSON number"
        )))
    }
}

/// Recompute derived item amounts and header totals in place.
///
/// Fails with [`MoadianError::InvalidArgument`] when a line or total leaves
/// the exactly representable range; `invoice` may then be partly updated.
pub fn calculate_totals(invoice: &mut Invoice) -> Result<(), MoadianError> {
    for item in &mut invoice.body {
        let line = item.am.checked_mul(item.fee).ok_or_else(overflow)?;
        item.prdis = check_amount("prdis", round_half_up(line))?;
        item.adis = check_amount("adis", item.prdis.checked_sub(item.dis).ok_or_else(overflow)?)?;
        let vat = item
            .adis
            .checked_mul(item.vra)
            .and_then(|v| v.checked_div(dec!(100)))
            .ok_or_else(overflow)?;
        item.vam = check_amount("vam", round_half_up(vat))?;
        let total = item
            .adis
            .checked_add(item.vam)
            .and_then(|t| t.checked_add(item.odam))
            .ok_or_else(overflow)?;
        item.tsstam = check_amount("tsstam", total)?;
    }

    let sum = |field: &str, pick: fn(&InvoiceItem) -> Decimal| {
        invoice
            .body
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(pick(item)))
            .ok_or_else(overflow)
            .and_then(|total| check_amount(field, total))
    };
    let tprdis = sum("tprdis", |i| i.prdis)?;
    let tdis = sum("tdis", |i| i.dis)?;
    let tadis = sum("tadis", |i| i.adis)?;
    let tvam = sum("tvam", |i| i.vam)?;
    let todam = sum("todam", |i| i.odam)?;
    let tbill = tadis
        .checked_add(tvam)
        .and_then(|t| t.checked_add(todam))
        .ok_or_else(overflow)?;

    let header = &mut invoice.header;
    header.tprdis = tprdis;
    header.tdis = tdis;
    header.tadis = tadis;
    header.tvam = tvam;
    header.todam = todam;
    header.tbill = check_amount("tbill", tbill)?;
    Ok(())
}

fn overflow() -> MoadianError {
    MoadianError::InvalidArgument("invoice amounts overflow".into())
}

fn round_half_up(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Builder for an invoice line.
pub struct ItemBuilder {
    sstid: String,
    sstt: String,
    am: Decimal,
    mu: String,
    fee: Decimal,
    dis: Decimal,
    vra: Decimal,
    odam: Decimal,
}

impl ItemBuilder {
    pub fn new(
        sstid: impl Into<String>,
        sstt: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        unit_price: Decimal,
    ) -> Self {
        Self {
            sstid: sstid.into(),
            sstt: sstt.into(),
            am: quantity,
            mu: unit.into(),
            fee: unit_price,
            dis: Decimal::ZERO,
            vra: dec!(10),
            odam: Decimal::ZERO,
        }
    }

    pub fn discount(mut self, amount: Decimal) -> Self {
        self.dis = amount;
        self
    }

    pub fn vat_rate(mut self, percent: Decimal) -> Self {
        self.vra = percent;
        self
    }

    pub fn other_duties(mut self, amount: Decimal) -> Self {
        self.odam = amount;
        self
    }

    pub fn build(self) -> InvoiceItem {
        InvoiceItem {
            sstid: self.sstid,
            sstt: self.sstt,
            am: self.am,
            mu: self.mu,
            fee: self.fee,
            prdis: Decimal::ZERO,
            dis: self.dis,
            adis: Decimal::ZERO,
            vra: self.vra,
            vam: Decimal::ZERO,
            odam: self.odam,
            tsstam: Decimal::ZERO,
        }
    }
}
