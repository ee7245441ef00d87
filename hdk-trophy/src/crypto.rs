//! Cryptographic operations for encrypted trophy documents (ESFM).
//!
//! An ESFM payload is `iv || AES-128-CBC(k, iv, document)`, where the
//! document key `k` is the title's [`NpCommId`] encrypted with the trophy
//! key under AES-128-CBC and a zero IV.
//!
//! The cipher sits behind [`EsfmCipher`] so extraction can run with any
//! primitive, including test doubles.

use aes::Aes128;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::CryptoError;
use crate::npbind::NpCommId;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES block size.
pub const BLOCK_SIZE: usize = 16;

/// IV used when deriving the document key.
pub const TROPHY_IV: [u8; 16] = [0u8; 16];

/// Decrypt primitive used for ESFM documents.
pub trait EsfmCipher {
    /// Decrypt `ciphertext`; the plaintext has the same length.
    fn decrypt(
        &self,
        key: &NpCommId,
        iv: &[u8; 16],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Inverse of [`EsfmCipher::decrypt`].
    fn encrypt(
        &self,
        key: &NpCommId,
        iv: &[u8; 16],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

impl<C: EsfmCipher + ?Sized> EsfmCipher for &C {
    fn decrypt(
        &self,
        key: &NpCommId,
        iv: &[u8; 16],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        (**self).decrypt(key, iv, ciphertext)
    }

    fn encrypt(
        &self,
        key: &NpCommId,
        iv: &[u8; 16],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        (**self).encrypt(key, iv, plaintext)
    }
}

/// AES-CBC encrypt in-place. `data` must be a multiple of 16 bytes.
pub fn aes_encrypt_cbc(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) -> Result<(), CryptoError> {
    if !data.len().is_multiple_of(BLOCK_SIZE) {
        return Err(CryptoError::UnalignedInput(data.len()));
    }

    let len = data.len();
    Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|_| CryptoError::AesError("cbc encrypt failed".to_string()))?;

    Ok(())
}

/// AES-CBC decrypt in-place. `data` must be a multiple of 16 bytes.
pub fn aes_decrypt_cbc(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) -> Result<(), CryptoError> {
    if !data.len().is_multiple_of(BLOCK_SIZE) {
        return Err(CryptoError::UnalignedInput(data.len()));
    }

    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| CryptoError::AesError("cbc decrypt failed".to_string()))?;

    Ok(())
}

/// ESFM cipher keyed on the platform trophy key.
///
/// The trophy key is not shipped with this crate; callers supply it.
#[derive(Clone)]
pub struct TrophyCipher {
    trophy_key: [u8; 16],
}

impl TrophyCipher {
    pub const fn new(trophy_key: [u8; 16]) -> Self {
        Self { trophy_key }
    }

    /// Per-title document key: `AES-CBC(trophy_key, 0, np_comm_id)`.
    pub fn document_key(&self, np_comm_id: &NpCommId) -> Result<[u8; 16], CryptoError> {
        let mut key = *np_comm_id.as_bytes();
        aes_encrypt_cbc(&self.trophy_key, &TROPHY_IV, &mut key)?;
        Ok(key)
    }
}

impl core::fmt::Debug for TrophyCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TrophyCipher").finish_non_exhaustive()
    }
}

impl EsfmCipher for TrophyCipher {
    fn decrypt(
        &self,
        key: &NpCommId,
        iv: &[u8; 16],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let document_key = self.document_key(key)?;
        let mut out = ciphertext.to_vec();
        aes_decrypt_cbc(&document_key, iv, &mut out)?;
        Ok(out)
    }

    fn encrypt(
        &self,
        key: &NpCommId,
        iv: &[u8; 16],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let document_key = self.document_key(key)?;
        let mut out = plaintext.to_vec();
        aes_encrypt_cbc(&document_key, iv, &mut out)?;
        Ok(out)
    }
}
