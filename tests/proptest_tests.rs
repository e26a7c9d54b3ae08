//! Property-based tests for tax ids and signatures.
//!
//! Run with: `cargo test --test proptest_tests`

use std::sync::OnceLock;

use chrono::{DateTime, Duration, TimeZone, Utc};
use moadian::crypto::{PrivateKey, SignatureEngine, parse_public_key};
use moadian::*;
use proptest::prelude::*;

const CLIENT_PRIVATE: &str = include_str!("fixtures/client_private.pem");
const CLIENT_PUBLIC: &str = include_str!("fixtures/client_public.pem");

fn signing_key() -> &'static PrivateKey {
    static KEY: OnceLock<PrivateKey> = OnceLock::new();
    KEY.get_or_init(|| PrivateKey::from_pem(CLIENT_PRIVATE, None).unwrap())
}

fn epoch_day(days: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap() + Duration::days(days)
}

fn identity() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,16}"
}

proptest! {
    #[test]
    fn generation_is_deterministic(
        identity in identity(),
        days in 0i64..=40_000,
        seconds in 0i64..86_400,
        sequence in 0u64..=MAX_SEQUENCE,
    ) {
        let created = epoch_day(days) + Duration::seconds(seconds);
        let a = generate_invoice_id(&identity, created, sequence).unwrap();
        let b = generate_invoice_id(&identity, created, sequence).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn generated_ids_parse_back(
        identity in identity(),
        days in 0i64..=40_000,
        sequence in 0u64..=MAX_SEQUENCE,
    ) {
        let id = generate_invoice_id(&identity, epoch_day(days), sequence).unwrap();
        let parsed = InvoiceId::parse(id.as_str()).unwrap();
        prop_assert_eq!(parsed.identity(), identity.to_ascii_uppercase());
        prop_assert_eq!(parsed.days_since_epoch() as i64, days);
        prop_assert_eq!(parsed.sequence(), sequence);
    }

    #[test]
    fn distinct_sequences_never_collide(
        identity in identity(),
        days in 0i64..=40_000,
        a in 0u64..=MAX_SEQUENCE,
        b in 0u64..=MAX_SEQUENCE,
    ) {
        prop_assume!(a != b);
        let created = epoch_day(days);
        let id_a = generate_invoice_id(&identity, created, a).unwrap();
        let id_b = generate_invoice_id(&identity, created, b).unwrap();
        prop_assert_ne!(id_a, id_b);
    }

    #[test]
    fn distinct_days_never_collide(
        days_a in 0i64..=40_000,
        days_b in 0i64..=40_000,
        sequence in 0u64..=MAX_SEQUENCE,
    ) {
        prop_assume!(days_a != days_b);
        let id_a = generate_invoice_id("A11216", epoch_day(days_a), sequence).unwrap();
        let id_b = generate_invoice_id("A11216", epoch_day(days_b), sequence).unwrap();
        prop_assert_ne!(id_a, id_b);
    }

    #[test]
    fn wrong_check_digit_is_rejected(
        identity in identity(),
        days in 0i64..=40_000,
        sequence in 0u64..=MAX_SEQUENCE,
        replacement in prop::sample::select(b"0123456789ABCDEF".to_vec()),
    ) {
        let id = generate_invoice_id(&identity, epoch_day(days), sequence).unwrap();
        let mut bytes = id.as_str().as_bytes().to_vec();
        let last = bytes.len() - 1;
        prop_assume!(bytes[last] != replacement);
        bytes[last] = replacement;
        let tampered = String::from_utf8(bytes).unwrap();
        prop_assert!(InvoiceId::parse(&tampered).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn signatures_detect_tampering(
        message in prop::collection::vec(any::<u8>(), 1..512),
        flip in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let public = parse_public_key(CLIENT_PUBLIC).unwrap();
        let signature = SignatureEngine.sign(&message, signing_key()).unwrap();
        prop_assert!(SignatureEngine.verify(&message, &signature, &public));

        let mut tampered = message.clone();
        let idx = flip.index(tampered.len());
        tampered[idx] ^= mask;
        prop_assert!(!SignatureEngine.verify(&tampered, &signature, &public));
    }
}
