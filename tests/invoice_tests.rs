use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::json;

use moadian::api::{ClientConfig, Dispatcher, HttpRequest, HttpResponse, Seal, Transport, TransportError};
use moadian::crypto::{EncryptionEngine, KeyMaterial, PrivateKey};
use moadian::invoice::*;
use moadian::*;

const CLIENT_PRIVATE: &str = include_str!("fixtures/client_private.pem");
const AUTHORITY_PRIVATE: &str = include_str!("fixtures/authority_private.pem");
const AUTHORITY_PUBLIC: &str = include_str!("fixtures/authority_public.pem");

fn issued() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
}

fn taxid(sequence: u64) -> InvoiceId {
    generate_invoice_id("A11216", issued(), sequence).unwrap()
}

fn sample_invoice() -> Invoice {
    InvoiceBuilder::new(taxid(42), issued(), "14003778990")
        .buyer(BuyerType::LegalEntity, "10101010101")
        .buyer_postal_code("1234567890")
        .add_item(
            ItemBuilder::new("2330001234567", "Tea", dec!(2), "164", dec!(150000))
                .discount(dec!(10000))
                .build(),
        )
        .add_item(
            ItemBuilder::new("2330007654321", "Sugar", dec!(3), "164", dec!(20000))
                .vat_rate(dec!(9))
                .build(),
        )
        .build()
        .unwrap()
}

struct Unreachable;

impl Transport for Unreachable {
    fn post(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError("offline".into()))
    }
}

// ---------------------------------------------------------------------------
// Invoice model
// ---------------------------------------------------------------------------

#[test]
fn header_takes_serial_from_taxid() {
    let invoice = sample_invoice();
    assert_eq!(invoice.header.inno, "000000002A");
    assert_eq!(invoice.header.indatim, issued().timestamp_millis());
    assert_eq!(invoice.header.indati2m, invoice.header.indatim);
    assert_eq!(invoice.header.ins, InvoiceSubject::Original);
}

#[test]
fn totals_follow_items() {
    let invoice = sample_invoice();
    // tea: 300000 - 10000 = 290000, VAT 29000
    // sugar: 60000, VAT 5400
    assert_eq!(invoice.header.tprdis, dec!(360000));
    assert_eq!(invoice.header.tdis, dec!(10000));
    assert_eq!(invoice.header.tadis, dec!(350000));
    assert_eq!(invoice.header.tvam, dec!(34400));
    assert_eq!(invoice.header.tbill, dec!(384400));
    assert_eq!(invoice.header.cap, dec!(384400));
    assert_eq!(invoice.header.insp, dec!(0));
}

#[test]
fn recalculation_after_edit() {
    let mut invoice = sample_invoice();
    invoice.body[1].am = dec!(1);
    calculate_totals(&mut invoice).unwrap();
    assert_eq!(invoice.body[1].prdis, dec!(20000));
    assert_eq!(invoice.body[1].vam, dec!(1800));
    assert_eq!(invoice.header.tbill, dec!(290000) + dec!(29000) + dec!(20000) + dec!(1800));
}

#[test]
fn return_invoice_references_original() {
    let original = taxid(42);
    let invoice = InvoiceBuilder::new(taxid(43), issued(), "14003778990")
        .buyer(BuyerType::LegalEntity, "10101010101")
        .amends(InvoiceSubject::Return, original.clone())
        .add_item(ItemBuilder::new("2330001234567", "Tea", dec!(1), "164", dec!(150000)).build())
        .build()
        .unwrap();
    assert_eq!(invoice.header.irtaxid, Some(original));

    let json = serde_json::to_value(&invoice).unwrap();
    assert_eq!(json["header"]["ins"], 4);
    assert_eq!(json["header"]["irtaxid"], "A1121604D55000000002A0");
}

// ---------------------------------------------------------------------------
// Packets
// ---------------------------------------------------------------------------

#[test]
fn packet_from_invoice_uses_header_id_and_time() {
    let invoice = sample_invoice();
    let packet = Packet::from_invoice(&invoice).unwrap();
    assert_eq!(packet.packet_type(), PacketType::Invoice);
    assert_eq!(packet.invoice_id(), Some(&invoice.header.taxid));
    assert_eq!(packet.created_at(), issued());
    assert_eq!(packet.data()["header"]["tins"], "14003778990");
}

#[test]
fn canonical_bytes_are_stable_across_packets() {
    let invoice = sample_invoice();
    let a = Packet::from_invoice(&invoice).unwrap();
    let b = Packet::from_invoice(&invoice).unwrap();
    assert_ne!(a.uid(), b.uid());
    assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
}

#[test]
fn canonical_form_sorts_keys() {
    let packet = Packet::new(
        taxid(1),
        &json!({"z": 1, "a": {"y": 2, "b": 3}}),
        Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
    )
    .unwrap();
    insta::assert_snapshot!(
        String::from_utf8(packet.canonical_bytes().unwrap()).unwrap(),
        @r#"{"createdAt":1710460800000,"data":{"a":{"b":3,"y":2},"z":1},"invoiceId":"A1121604D5500000000010"}"#
    );
}

// ---------------------------------------------------------------------------
// Sealing through the dispatcher
// ---------------------------------------------------------------------------

#[test]
fn dispatcher_seals_typed_invoice() {
    let keys = KeyMaterial::new(AUTHORITY_PUBLIC, CLIENT_PRIVATE, None, "ORG-KEY-1").unwrap();
    let dispatcher = Dispatcher::new(
        ClientConfig::default(),
        std::sync::Arc::new(Unreachable),
        std::sync::Arc::new(keys),
        "A11216",
    )
    .unwrap();

    let invoice = sample_invoice();
    let packet = Packet::from_invoice(&invoice).unwrap();
    let envelope = dispatcher.seal(&packet, Seal::FULL).unwrap();

    let authority = PrivateKey::from_pem(AUTHORITY_PRIVATE, None).unwrap();
    let canonical = EncryptionEngine
        .decrypt(&envelope.sealed_payload().unwrap(), &authority)
        .unwrap();
    let opened: serde_json::Value = serde_json::from_slice(&canonical).unwrap();
    let round_trip: Invoice = serde_json::from_value(opened["data"].clone()).unwrap();
    assert_eq!(round_trip, invoice);
}

#[test]
fn dispatcher_without_token_never_reaches_transport() {
    let keys = KeyMaterial::new(AUTHORITY_PUBLIC, CLIENT_PRIVATE, None, "ORG-KEY-1").unwrap();
    let dispatcher = Dispatcher::new(
        ClientConfig::default(),
        std::sync::Arc::new(Unreachable),
        std::sync::Arc::new(keys),
        "A11216",
    )
    .unwrap();
    let packet = Packet::from_invoice(&sample_invoice()).unwrap();

    // Unreachable would surface as a network error if it were called.
    let err = dispatcher
        .submit::<serde_json::Value>("req/api/self-tsp/async/normal-enqueue", &[packet], None, Seal::FULL)
        .unwrap_err();
    assert!(matches!(
        err,
        MoadianError::Authentication(AuthFailure::TokenNotSet)
    ));
}
