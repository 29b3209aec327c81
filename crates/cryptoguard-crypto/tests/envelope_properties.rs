//! Property tests for the envelope contract: round trip, tamper detection,
//! wrong-password rejection, and fresh randomness per encryption.

use std::io::Cursor;

use cryptoguard_crypto::{
    decrypt_stream, encrypt_stream, open, seal, KdfParams, StreamParams, HEADER_SIZE,
};
use proptest::prelude::*;
use secrecy::SecretString;

const FAST: KdfParams = KdfParams { iterations: 1_000 };

fn config() -> ProptestConfig {
    // Each case pays for at least one KDF run
    ProptestConfig::with_cases(32)
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn seal_open_roundtrip(msg in proptest::collection::vec(any::<u8>(), 0..2048), pw in ".{0,32}") {
        let password = SecretString::from(pw);
        let envelope = seal(&msg, &password, &FAST).unwrap();
        prop_assert_eq!(open(&envelope, &password, &FAST).unwrap(), msg);
    }

    #[test]
    fn any_flipped_bit_is_rejected(
        msg in proptest::collection::vec(any::<u8>(), 1..256),
        pos in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let password = SecretString::from("tamper-test");
        let mut envelope = seal(&msg, &password, &FAST).unwrap();
        let body = envelope.len() - HEADER_SIZE;
        let i = HEADER_SIZE + pos.index(body);
        envelope[i] ^= 1 << bit;
        prop_assert!(open(&envelope, &password, &FAST).unwrap_err().is_authentication());
    }

    #[test]
    fn wrong_password_is_rejected(msg in proptest::collection::vec(any::<u8>(), 0..256), a in "[a-z]{1,12}", b in "[A-Z]{1,12}") {
        let envelope = seal(&msg, &SecretString::from(a), &FAST).unwrap();
        prop_assert!(open(&envelope, &SecretString::from(b), &FAST).unwrap_err().is_authentication());
    }

    #[test]
    fn stream_roundtrip(msg in proptest::collection::vec(any::<u8>(), 0..4096), chunk in 1usize..700) {
        let password = SecretString::from("stream");
        let params = StreamParams { kdf: FAST, chunk_size: chunk };
        let mut sealed = Vec::new();
        encrypt_stream(Cursor::new(&msg), &mut sealed, &password, &params).unwrap();
        prop_assert!(sealed.len() > HEADER_SIZE);

        let mut plain = Vec::new();
        decrypt_stream(Cursor::new(&sealed), &mut plain, &password, &FAST).unwrap();
        prop_assert_eq!(plain, msg);
    }
}

#[test]
fn two_encryptions_differ_but_both_decrypt() {
    let password = SecretString::from("mypassword");
    let a = seal(b"Secret text", &password, &FAST).unwrap();
    let b = seal(b"Secret text", &password, &FAST).unwrap();
    assert_ne!(a[..HEADER_SIZE], b[..HEADER_SIZE]);
    assert_eq!(open(&a, &password, &FAST).unwrap(), b"Secret text");
    assert_eq!(open(&b, &password, &FAST).unwrap(), b"Secret text");
}

#[test]
fn default_iterations_roundtrip() {
    let password = SecretString::from("mypassword");
    let text = cryptoguard_crypto::encrypt_text("Secret text", &password, &KdfParams::default())
        .unwrap();
    assert_eq!(
        cryptoguard_crypto::decrypt_text(&text, &password, &KdfParams::default()).unwrap(),
        "Secret text"
    );
    assert!(cryptoguard_crypto::decrypt_text(
        &text,
        &SecretString::from("wrongpassword"),
        &KdfParams::default()
    )
    .unwrap_err()
    .is_authentication());
}
