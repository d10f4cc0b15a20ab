use proptest::prelude::*;

use vox_crypto::{decrypt, encrypt, vote_commitment, CryptoError, VoteKey};
use vox_types::{OptionId, PollId, VoterId};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// decrypt(encrypt(m, k), k) == m for any UTF-8 plaintext.
    #[test]
    fn aead_roundtrip(plaintext in ".{0,200}", key in prop::array::uniform32(0u8..)) {
        let key = VoteKey::from_bytes(key);
        let env = encrypt(&plaintext, &key).unwrap();
        prop_assert_eq!(decrypt(&env, &key).unwrap(), plaintext);
    }

    /// Flipping any single bit of ciphertext or tag yields an integrity error.
    #[test]
    fn single_bit_flip_is_detected(
        plaintext in ".{1,64}",
        bit in any::<prop::sample::Index>(),
    ) {
        let key = VoteKey::from_bytes([9u8; 32]);
        let env = encrypt(&plaintext, &key).unwrap();

        let total_bits = (env.ciphertext.len() + env.tag.len()) * 8;
        let bit = bit.index(total_bits);
        let mut tampered = env.clone();
        let (byte, mask) = (bit / 8, 1u8 << (bit % 8));
        if byte < tampered.ciphertext.len() {
            tampered.ciphertext[byte] ^= mask;
        } else {
            tampered.tag[byte - tampered.ciphertext.len()] ^= mask;
        }

        prop_assert!(matches!(decrypt(&tampered, &key), Err(CryptoError::Integrity(_))));
    }

    /// The envelope text form survives a round trip through decryption.
    #[test]
    fn text_envelope_roundtrip(plaintext in "[a-z:]{0,40}") {
        let key = VoteKey::from_bytes([1u8; 32]);
        let text = encrypt(&plaintext, &key).unwrap().to_string();
        prop_assert_eq!(vox_crypto::decrypt_str(&text, &key).unwrap(), plaintext);
    }

    /// Commitments depend only on their three inputs.
    #[test]
    fn commitment_is_deterministic(poll in "[a-z0-9]{1,12}", voter in "[a-z0-9]{1,12}", option in "[a-z0-9]{1,12}") {
        let a = vote_commitment(&PollId::new(poll.clone()), &VoterId::new(voter.clone()), &OptionId::new(option.clone()));
        let b = vote_commitment(&PollId::new(poll), &VoterId::new(voter), &OptionId::new(option));
        prop_assert_eq!(a, b);
    }

    /// Different triples never share a commitment, even when ids carry
    /// separator or NUL bytes.
    #[test]
    fn commitment_separates_triples(
        a in ("[ab\\x1f\\x00]{1,6}", "[ab\\x1f\\x00]{1,6}", "[ab\\x1f\\x00]{1,6}"),
        b in ("[ab\\x1f\\x00]{1,6}", "[ab\\x1f\\x00]{1,6}", "[ab\\x1f\\x00]{1,6}"),
    ) {
        prop_assume!(a != b);
        let ca = vote_commitment(&PollId::new(a.0), &VoterId::new(a.1), &OptionId::new(a.2));
        let cb = vote_commitment(&PollId::new(b.0), &VoterId::new(b.1), &OptionId::new(b.2));
        prop_assert_ne!(ca, cb);
    }
}
