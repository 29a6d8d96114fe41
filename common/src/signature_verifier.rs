// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Image signature verification
//!
//! `verify_image` only orchestrates: hashing, DER decoding and the ECDSA
//! check are capabilities so a board can route them to a hardware engine.
//! Software implementations on top of `sha2` and `p256` are provided below.

use p256::ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey};
use p256::EncodedPoint;
use sha2::{Digest, Sha256};

use crate::descriptor::read_descriptor;
use crate::error::BootError;
use crate::flash::FlashDevice;
use crate::{bank_range, BoardConfig};

/// Bytes hashed per update. Hash engines usually cannot read flash, so the
/// image is staged through a RAM buffer of this size.
pub const HASH_CHUNK: usize = 256;

/// DER header of a P-256 SubjectPublicKeyInfo, up to and including the
/// uncompressed point tag (0x04).
pub const P256_SPKI_PREFIX: [u8; 27] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a,
    0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00, 0x04,
];

/// ECDSA signature `r || s`
pub type RawSignature = [u8; 64];

/// Uncompressed curve point `x || y`, without the SEC1 tag
pub type RawPublicKey = [u8; 64];

/// SHA-256 engine, fed in chunks
pub trait Hasher {
    type Context;

    fn init(&self) -> Result<Self::Context, BootError>;
    fn update(&self, ctx: &mut Self::Context, data: &[u8]) -> Result<(), BootError>;
    fn finalize(&self, ctx: Self::Context) -> Result<[u8; 32], BootError>;
}

/// ASN.1 DER to raw conversions
pub trait SignatureDecoder {
    fn decode_signature(&self, der: &[u8]) -> Result<RawSignature, BootError>;
    fn extract_public_key(&self, der_blob: &[u8]) -> Result<RawPublicKey, BootError>;
}

/// ECDSA P-256 over a precomputed digest
pub trait SignatureVerifier {
    fn verify(&self, digest: &[u8; 32], signature: &RawSignature, public_key: &RawPublicKey) -> bool;
}

/// Verifies the image described by the descriptor at `bank_start`.
///
/// Every failure, whatever its cause, comes back as
/// `BootError::InvalidSignature`. Nothing is written to flash.
pub fn verify_image<C, F, H, D, V>(
    flash: &F,
    hasher: &H,
    decoder: &D,
    verifier: &V,
    bank_start: usize,
) -> Result<(), BootError>
where
    C: BoardConfig,
    F: FlashDevice,
    H: Hasher,
    D: SignatureDecoder,
    V: SignatureVerifier,
{
    check_image::<C, F, H, D, V>(flash, hasher, decoder, verifier, bank_start)
        .map_err(|_| BootError::InvalidSignature)
}

fn check_image<C, F, H, D, V>(
    flash: &F,
    hasher: &H,
    decoder: &D,
    verifier: &V,
    bank_start: usize,
) -> Result<(), BootError>
where
    C: BoardConfig,
    F: FlashDevice,
    H: Hasher,
    D: SignatureDecoder,
    V: SignatureVerifier,
{
    let descriptor = read_descriptor(flash, bank_start)?;
    if descriptor.hardware_id != C::HARDWARE_ID {
        return Err(BootError::InvalidDescriptor);
    }
    descriptor.check_placement(bank_range::<C>(bank_start)?)?;

    let image = descriptor.image_range()?;
    let digest = hash_region(flash, hasher, image.start, image.len)?;

    let public_key = decoder.extract_public_key(C::CODE_SIGNER_PUBLIC_KEY)?;
    let signature = decoder.decode_signature(descriptor.signature_bytes()?)?;

    if verifier.verify(&digest, &signature, &public_key) {
        Ok(())
    } else {
        Err(BootError::InvalidSignature)
    }
}

/// Streams `[start, start + len)` through `hasher`
pub fn hash_region<F: FlashDevice, H: Hasher>(
    flash: &F,
    hasher: &H,
    start: usize,
    len: usize,
) -> Result<[u8; 32], BootError> {
    let mut ctx = hasher.init()?;
    let mut chunk = [0u8; HASH_CHUNK];
    let mut offset = 0;
    while offset < len {
        let n = (len - offset).min(HASH_CHUNK);
        flash.read(start + offset, &mut chunk[..n])?;
        hasher.update(&mut ctx, &chunk[..n])?;
        offset += n;
    }
    hasher.finalize(ctx)
}

/// Software SHA-256 using the sha2 crate
pub struct Sha256Engine;

impl Hasher for Sha256Engine {
    type Context = Sha256;

    fn init(&self) -> Result<Sha256, BootError> {
        Ok(Sha256::new())
    }

    fn update(&self, ctx: &mut Sha256, data: &[u8]) -> Result<(), BootError> {
        Digest::update(ctx, data);
        Ok(())
    }

    fn finalize(&self, ctx: Sha256) -> Result<[u8; 32], BootError> {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Digest::finalize(ctx));
        Ok(digest)
    }
}

/// DER decoding for P-256 keys and signatures
pub struct DerDecoder;

impl SignatureDecoder for DerDecoder {
    fn decode_signature(&self, der: &[u8]) -> Result<RawSignature, BootError> {
        let signature = Signature::from_der(der).map_err(|_| BootError::InvalidSignature)?;
        let mut raw = [0u8; 64];
        raw.copy_from_slice(&signature.to_bytes());
        Ok(raw)
    }

    fn extract_public_key(&self, der_blob: &[u8]) -> Result<RawPublicKey, BootError> {
        if der_blob.len() != P256_SPKI_PREFIX.len() + 64
            || der_blob[..P256_SPKI_PREFIX.len()] != P256_SPKI_PREFIX
        {
            return Err(BootError::InvalidSignature);
        }
        let mut raw = [0u8; 64];
        raw.copy_from_slice(&der_blob[P256_SPKI_PREFIX.len()..]);
        Ok(raw)
    }
}

/// ECDSA P-256 verification using the p256 crate
pub struct P256Verifier;

impl SignatureVerifier for P256Verifier {
    fn verify(&self, digest: &[u8; 32], signature: &RawSignature, public_key: &RawPublicKey) -> bool {
        // Parse the public key (64 bytes x || y)
        let encoded_point = EncodedPoint::from_untagged_bytes(public_key.into());
        let verifying_key = match VerifyingKey::from_encoded_point(&encoded_point) {
            Ok(key) => key,
            Err(_) => return false,
        };

        let signature = match Signature::from_bytes(&(*signature).into()) {
            Ok(signature) => signature,
            Err(_) => return false,
        };

        verifying_key.verify_prehash(digest, &signature).is_ok()
    }
}
