use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{InvoiceId, MoadianError};

/// A complete invoice as the authority expects it inside an `INVOICE.V01`
/// packet. Field names are the authority's short codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub header: InvoiceHeader,
    pub body: Vec<InvoiceItem>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

/// Invoice header: identification, parties, and totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    /// Tax id.
    pub taxid: InvoiceId,
    /// Issue time, epoch milliseconds.
    pub indatim: i64,
    /// Creation time, epoch milliseconds.
    pub indati2m: i64,
    /// Invoice type.
    pub inty: InvoiceType,
    /// Internal serial (10 hex digits of the tax id's sequence segment).
    pub inno: String,
    /// Tax id of the invoice being corrected, cancelled, or returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irtaxid: Option<InvoiceId>,
    /// Invoice pattern.
    pub inp: InvoicePattern,
    /// Invoice subject.
    pub ins: InvoiceSubject,
    /// Seller tax identification number.
    pub tins: String,
    /// Buyer type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tob: Option<BuyerType>,
    /// Buyer national id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<String>,
    /// Buyer tax identification number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tinb: Option<String>,
    /// Buyer postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpc: Option<String>,
    /// Sum of item amounts before discount.
    #[serde(with = "rust_decimal::serde::float")]
    pub tprdis: Decimal,
    /// Sum of discounts.
    #[serde(with = "rust_decimal::serde::float")]
    pub tdis: Decimal,
    /// Sum of amounts after discount.
    #[serde(with = "rust_decimal::serde::float")]
    pub tadis: Decimal,
    /// Sum of VAT.
    #[serde(with = "rust_decimal::serde::float")]
    pub tvam: Decimal,
    /// Sum of other duties and levies.
    #[serde(with = "rust_decimal::serde::float")]
    pub todam: Decimal,
    /// Invoice total: `tadis + tvam + todam`.
    #[serde(with = "rust_decimal::serde::float")]
    pub tbill: Decimal,
    /// Settlement method.
    pub setm: SettlementMethod,
    /// Portion settled in cash.
    #[serde(with = "rust_decimal::serde::float")]
    pub cap: Decimal,
    /// Portion settled on credit.
    #[serde(with = "rust_decimal::serde::float")]
    pub insp: Decimal,
}

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Product or service id from the authority's catalogue.
    pub sstid: String,
    /// Product or service description.
    pub sstt: String,
    /// Quantity.
    #[serde(with = "rust_decimal::serde::float")]
    pub am: Decimal,
    /// Unit of measure code.
    pub mu: String,
    /// Unit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
    /// `am * fee`, set by `calculate_totals()`.
    #[serde(with = "rust_decimal::serde::float")]
    pub prdis: Decimal,
    /// Discount.
    #[serde(with = "rust_decimal::serde::float")]
    pub dis: Decimal,
    /// `prdis - dis`, set by `calculate_totals()`.
    #[serde(with = "rust_decimal::serde::float")]
    pub adis: Decimal,
    /// VAT rate in percent.
    #[serde(with = "rust_decimal::serde::float")]
    pub vra: Decimal,
    /// VAT amount, set by `calculate_totals()`.
    #[serde(with = "rust_decimal::serde::float")]
    pub vam: Decimal,
    /// Other duties and levies.
    #[serde(with = "rust_decimal::serde::float")]
    pub odam: Decimal,
    /// Line total, set by `calculate_totals()`.
    #[serde(with = "rust_decimal::serde::float")]
    pub tsstam: Decimal,
}

/// A payment record attached to the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Switch (payment network) number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iinn: Option<String>,
    /// Acceptor number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acn: Option<String>,
    /// Terminal number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trmn: Option<String>,
    /// Trace / reference number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trn: Option<String>,
    /// Payment time, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdt: Option<i64>,
    /// Paid amount.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub pv: Option<Decimal>,
}

/// Enums the authority encodes as small integers.
macro_rules! numeric_code {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $code:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u8", try_from = "u8")]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code),+
        }

        impl $name {
            /// Numeric wire code.
            pub fn code(&self) -> u8 {
                *self as u8
            }

            /// Parse from the numeric wire code.
            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.code()
            }
        }

        impl TryFrom<u8> for $name {
            type Error = MoadianError;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                Self::from_code(code).ok_or_else(|| {
                    MoadianError::InvalidArgument(format!(
                        concat!("unknown ", stringify!($name), " code {}"),
                        code
                    ))
                })
            }
        }
    };
}

numeric_code! {
    /// `inty`: who the invoice is addressed to.
    InvoiceType {
        /// Buyer fully identified.
        Standard = 1,
        /// Buyer not identified.
        BuyerUnidentified = 2,
        /// Retail receipt.
        Retail = 3,
    }
}

numeric_code! {
    /// `inp`: the trade pattern of the invoice.
    InvoicePattern {
        Sale = 1,
        CurrencySale = 2,
        GoldAndPlatinum = 3,
        Contracting = 4,
        UtilityBills = 5,
        AirTicket = 6,
        Export = 7,
    }
}

numeric_code! {
    /// `ins`: whether the invoice is new or amends an earlier one.
    InvoiceSubject {
        Original = 1,
        Correction = 2,
        Cancellation = 3,
        Return = 4,
    }
}

numeric_code! {
    /// `tob`: legal form of the buyer.
    BuyerType {
        NaturalPerson = 1,
        LegalEntity = 2,
        CivilPartnership = 3,
        NonResident = 4,
        Consumer = 5,
    }
}

numeric_code! {
    /// `setm`: how the invoice is settled.
    SettlementMethod {
        Cash = 1,
        Credit = 2,
        Mixed = 3,
    }
}

impl InvoiceSubject {
    /// Whether the subject refers back to an earlier invoice via `irtaxid`.
    pub fn references_earlier(&self) -> bool {
        !matches!(self, Self::Original)
    }
}
