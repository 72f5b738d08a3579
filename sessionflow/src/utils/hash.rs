use std::hash::{Hash, Hasher};
use std::io::Cursor;

use murmur3::*;

const SEED: u32 = 0x19264330;

pub fn hash_code(v: &[u8]) -> std::io::Result<u32> {
    let mut cursor = Cursor::new(v);
    murmur3_32(&mut cursor, SEED)
}

/// Collects the bytes a `Hash` impl writes so they can be murmur3-hashed.
///
/// Unlike `DefaultHasher` the result is stable across processes and releases.
#[derive(Default)]
struct ByteCollector {
    bytes: Vec<u8>,
}

impl Hasher for ByteCollector {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}

pub fn key_hash_code<K: Hash + ?Sized>(key: &K) -> u32 {
    let mut collector = ByteCollector::default();
    key.hash(&mut collector);
    // reading from an in-memory cursor cannot fail
    hash_code(collector.bytes.as_slice()).unwrap_or(0)
}

/// Routes a key to one of `num_partitions` partitions. Identical keys always share a partition.
pub fn partition_of<K: Hash + ?Sized>(key: &K, num_partitions: u16) -> u16 {
    if num_partitions <= 1 {
        return 0;
    }
    (key_hash_code(key) % num_partitions as u32) as u16
}

#[cfg(test)]
mod tests {
    use crate::utils::hash::{hash_code, key_hash_code, partition_of};

    #[test]
    pub fn hash_code_test() {
        assert_eq!(hash_code(b"taxi1").unwrap(), hash_code(b"taxi1").unwrap());
        assert_eq!(key_hash_code("taxi1"), key_hash_code(&"taxi1".to_string()));
    }

    #[test]
    pub fn partition_of_test() {
        for key in ["pickup", "dropoff", "enroute", "Mammal", "Bird"] {
            let p = partition_of(key, 4);
            assert!(p < 4);
            assert_eq!(p, partition_of(&key.to_string(), 4));
        }
        assert_eq!(partition_of("any", 1), 0);
    }
}
