#[cfg(test)]
mod tests {
    use crate::{sign, verify};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn verify_of_sign_is_identity(
            secret in any::<[u8; 32]>(),
            payload in "\\PC{0,64}",
        ) {
            let token = sign(&secret, &payload);
            prop_assert_eq!(verify(&secret, &token).unwrap(), payload);
        }

        #[test]
        fn one_bit_flip_never_verifies(
            secret in any::<[u8; 32]>(),
            payload in "\\PC{1,64}",
            flip_index in 0usize..64,
        ) {
            let token = sign(&secret, &payload);
            let mut bytes = token.into_bytes();
            let idx = flip_index % bytes.len();
            bytes[idx] ^= 0x01;
            if let Ok(mutated) = String::from_utf8(bytes) {
                prop_assert!(verify(&secret, &mutated).is_err());
            }
        }
    }
}
