// =============================================================================
// Deterministic per-symbol tie-break
// =============================================================================
//
// 64-bit FNV-1a over the symbol's UTF-8 bytes.  Stable across processes and
// platforms, unlike `std::collections::hash_map::DefaultHasher`, whose output
// is not guaranteed between releases or runs.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Distinct jitter steps below `scale`.
const JITTER_STEPS: u64 = 1_000;

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Jitter in `[0, scale)` seeded solely by `symbol`.
pub fn symbol_jitter(symbol: &str, scale: f64) -> f64 {
    let step = fnv1a_64(symbol.as_bytes()) % JITTER_STEPS;
    step as f64 / JITTER_STEPS as f64 * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_reference_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn jitter_is_bounded_and_stable() {
        for symbol in ["AAPL", "GME", "AMC", "BBBY", "TSLA", ""] {
            let j = symbol_jitter(symbol, 0.001);
            assert!((0.0..0.001).contains(&j), "{symbol}: {j}");
            assert_eq!(j, symbol_jitter(symbol, 0.001));
        }
    }

    #[test]
    fn jitter_differs_between_symbols() {
        assert_ne!(symbol_jitter("GME", 0.001), symbol_jitter("AMC", 0.001));
    }
}
