// Hash computation module
// Digest adapters and the algorithm capability table handed to the engine

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use blake2::{Blake2b512, Blake2s256};
use blake3::Hasher as Blake3Hasher;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};
use xxhash_rust::xxh3::Xxh3;

/// Incremental digest accumulator
pub trait Hasher: Send {
    /// Feed a chunk, returning how many bytes were absorbed.
    /// Anything other than `data.len()` is treated as a failed write by the caller.
    fn update(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Finalize the hash and return the result
    fn finalize(self: Box<Self>) -> Vec<u8>;

    /// Get the output size in bytes
    fn output_size(&self) -> usize;
}

/// Shared constructor producing a fresh accumulator per file
pub type HasherFactory = Arc<dyn Fn() -> Box<dyn Hasher> + Send + Sync>;

/// Information about a hash algorithm
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AlgorithmInfo {
    pub name: String,
    pub output_bits: usize,
    pub post_quantum: bool,
    pub cryptographic: bool,
}

impl AlgorithmInfo {
    pub fn new(name: &str, output_bits: usize) -> Self {
        Self {
            name: name.to_string(),
            output_bits,
            post_quantum: false,
            cryptographic: true,
        }
    }

    fn post_quantum(mut self) -> Self {
        self.post_quantum = true;
        self
    }

    fn non_cryptographic(mut self) -> Self {
        self.cryptographic = false;
        self
    }
}

/// Adapter for every RustCrypto `Digest` implementation (MD5, SHA-1, SHA-2, SHA-3, BLAKE2)
pub struct DigestWrapper<D>(D);

impl<D> DigestWrapper<D>
where
    D: Digest + Send + 'static,
{
    pub fn boxed() -> Box<dyn Hasher> {
        Box::new(Self(D::new()))
    }
}

impl<D> Hasher for DigestWrapper<D>
where
    D: Digest + Send,
{
    fn update(&mut self, data: &[u8]) -> io::Result<usize> {
        Digest::update(&mut self.0, data);
        Ok(data.len())
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }

    fn output_size(&self) -> usize {
        <D as Digest>::output_size()
    }
}

// BLAKE3 wrapper
pub struct Blake3Wrapper(Blake3Hasher);

impl Hasher for Blake3Wrapper {
    fn update(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.update(data);
        Ok(data.len())
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }

    fn output_size(&self) -> usize {
        32 // 256 bits
    }
}

// XXH3 wrapper (64-bit non-cryptographic hash)
pub struct Xxh3Wrapper(Xxh3);

impl Hasher for Xxh3Wrapper {
    fn update(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.update(data);
        Ok(data.len())
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.digest().to_be_bytes().to_vec()
    }

    fn output_size(&self) -> usize {
        8
    }
}

// XXH128 wrapper (128-bit non-cryptographic hash)
pub struct Xxh128Wrapper(Xxh3);

impl Hasher for Xxh128Wrapper {
    fn update(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.update(data);
        Ok(data.len())
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.digest128().to_be_bytes().to_vec()
    }

    fn output_size(&self) -> usize {
        16
    }
}

struct RegistryEntry {
    info: AlgorithmInfo,
    factory: HasherFactory,
}

/// Capability table mapping algorithm names to constructors.
///
/// Built explicitly and passed into the engine; nothing about it is global, so
/// tests can register instrumented doubles next to (or instead of) the built-ins.
/// Lookups are case-insensitive.
#[derive(Default)]
pub struct HashRegistry {
    entries: Vec<RegistryEntry>,
    names: HashMap<String, usize>,
}

impl HashRegistry {
    /// A registry with no algorithms at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in algorithm set
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(AlgorithmInfo::new("MD5", 128), &["md5"], DigestWrapper::<Md5>::boxed);
        registry.register(AlgorithmInfo::new("SHA1", 160), &["sha1", "sha-1"], DigestWrapper::<Sha1>::boxed);
        registry.register(AlgorithmInfo::new("SHA-224", 224), &["sha224"], DigestWrapper::<Sha224>::boxed);
        registry.register(AlgorithmInfo::new("SHA-256", 256), &["sha256"], DigestWrapper::<Sha256>::boxed);
        registry.register(AlgorithmInfo::new("SHA-384", 384), &["sha384"], DigestWrapper::<Sha384>::boxed);
        registry.register(AlgorithmInfo::new("SHA-512", 512), &["sha512"], DigestWrapper::<Sha512>::boxed);
        registry.register(
            AlgorithmInfo::new("SHA3-224", 224).post_quantum(),
            &[],
            DigestWrapper::<Sha3_224>::boxed,
        );
        registry.register(
            AlgorithmInfo::new("SHA3-256", 256).post_quantum(),
            &[],
            DigestWrapper::<Sha3_256>::boxed,
        );
        registry.register(
            AlgorithmInfo::new("SHA3-384", 384).post_quantum(),
            &[],
            DigestWrapper::<Sha3_384>::boxed,
        );
        registry.register(
            AlgorithmInfo::new("SHA3-512", 512).post_quantum(),
            &[],
            DigestWrapper::<Sha3_512>::boxed,
        );
        registry.register(AlgorithmInfo::new("BLAKE2b-512", 512), &["blake2b"], DigestWrapper::<Blake2b512>::boxed);
        registry.register(AlgorithmInfo::new("BLAKE2s-256", 256), &["blake2s"], DigestWrapper::<Blake2s256>::boxed);
        registry.register(AlgorithmInfo::new("BLAKE3", 256), &[], || Box::new(Blake3Wrapper(Blake3Hasher::new())));
        registry.register(
            AlgorithmInfo::new("XXH3", 64).non_cryptographic(),
            &[],
            || Box::new(Xxh3Wrapper(Xxh3::new())),
        );
        registry.register(
            AlgorithmInfo::new("XXH128", 128).non_cryptographic(),
            &[],
            || Box::new(Xxh128Wrapper(Xxh3::new())),
        );
        registry
    }

    /// Add an algorithm under its display name plus any aliases.
    /// A name that is already taken is rebound to the new entry.
    pub fn register<F>(&mut self, info: AlgorithmInfo, aliases: &[&str], factory: F)
    where
        F: Fn() -> Box<dyn Hasher> + Send + Sync + 'static,
    {
        let index = self.entries.len();
        self.names.insert(info.name.to_lowercase(), index);
        for alias in aliases {
            self.names.insert(alias.to_lowercase(), index);
        }
        self.entries.push(RegistryEntry {
            info,
            factory: Arc::new(factory),
        });
    }

    /// Constructor for the named algorithm, if the registry provides it
    pub fn factory(&self, algorithm: &str) -> Option<HasherFactory> {
        self.entry(algorithm).map(|entry| Arc::clone(&entry.factory))
    }

    /// Get a fresh hasher instance for the named algorithm
    pub fn get_hasher(&self, algorithm: &str) -> Option<Box<dyn Hasher>> {
        self.entry(algorithm).map(|entry| (entry.factory)())
    }

    pub fn info(&self, algorithm: &str) -> Option<&AlgorithmInfo> {
        self.entry(algorithm).map(|entry| &entry.info)
    }

    pub fn contains(&self, algorithm: &str) -> bool {
        self.entry(algorithm).is_some()
    }

    /// All reachable algorithms in registration order
    pub fn list_algorithms(&self) -> Vec<AlgorithmInfo> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(index, entry)| self.names.get(&entry.info.name.to_lowercase()) == Some(index))
            .map(|(_, entry)| entry.info.clone())
            .collect()
    }

    fn entry(&self, algorithm: &str) -> Option<&RegistryEntry> {
        self.names
            .get(&algorithm.to_lowercase())
            .map(|&index| &self.entries[index])
    }
}

impl std::fmt::Debug for HashRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.info.name))
            .finish()
    }
}
