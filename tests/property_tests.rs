//! Property-based tests for the money-handling and signature invariants.

use proptest::prelude::*;
use rust_decimal::Decimal;

use atelier_api::payments::{from_minor_units, signature, to_minor_units};

// Strategies for generating test data
fn dollars_strategy() -> impl Strategy<Value = Decimal> {
    // Amounts with at most two decimal places, the only scale the storefront
    // produces.
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn secret_strategy() -> impl Strategy<Value = String> {
    "whsec_[a-zA-Z0-9]{8,40}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn two_decimal_amounts_round_trip_through_minor_units(amount in dollars_strategy()) {
        let minor = to_minor_units(amount).unwrap();
        prop_assert_eq!(from_minor_units(minor), amount);
    }

    #[test]
    fn minor_units_never_lose_more_than_half_a_cent(
        units in 0u32..100_000u32,
        extra in 0u32..9_999u32,
    ) {
        // Amounts with up to six decimal places.
        let amount = Decimal::new(i64::from(units) * 1_000_000 + i64::from(extra), 6);
        let minor = to_minor_units(amount).unwrap();
        let delta = (from_minor_units(minor) - amount).abs();
        prop_assert!(delta <= Decimal::new(5, 3), "lost {} on {}", delta, amount);
    }

    #[test]
    fn recomputed_totals_are_exact_for_cent_amounts(
        subtotal in dollars_strategy(),
        shipping in 0i64..10_000,
        tax_minor in 0i64..1_000_000,
    ) {
        let shipping = Decimal::new(shipping, 2);
        let tax = from_minor_units(tax_minor);
        let total = (subtotal + shipping + tax).round_dp(2);
        // Cent-scale inputs sum without rounding drift.
        prop_assert_eq!(total, subtotal + shipping + tax);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn signed_payloads_always_verify(
        payload in proptest::collection::vec(any::<u8>(), 0..2048),
        secret in secret_strategy(),
    ) {
        let now = chrono::Utc::now().timestamp();
        let header = signature::sign(&payload, &secret, now);
        prop_assert_eq!(signature::verify(&payload, &header, &secret, 300), Ok(()));
    }

    #[test]
    fn flipping_any_payload_byte_breaks_the_signature(
        payload in proptest::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        secret in secret_strategy(),
    ) {
        let now = chrono::Utc::now().timestamp();
        let header = signature::sign(&payload, &secret, now);

        let mut tampered = payload.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 0x01;

        prop_assert_eq!(
            signature::verify(&tampered, &header, &secret, 300),
            Err(signature::SignatureError::Mismatch)
        );
    }

    #[test]
    fn arbitrary_headers_never_panic_the_verifier(
        header in ".{0,256}",
        payload in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        // Any outcome is fine; the point is that garbage input maps to an
        // error value instead of a panic.
        let _ = signature::verify(&payload, &header, "whsec_test", 300);
    }
}
