//! Swizzle selectors and the lane instructions behind them.
//!
//! Every vector is carried in an `f32x4` register whatever its arity, so reads
//! and writes go lane by lane with `extractlane` / `insertlane`.

use cranelift::prelude::{FunctionBuilder, InstBuilder, Value, types};

/// Backend type of every source vector.
pub(crate) const VECTOR_TYPE: cranelift::prelude::Type = types::F32X4;

/// Up to four lane indices in written order, repeats allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lanes {
    idx: [u8; 4],
    len: u8,
}

impl Lanes {
    /// Parse a selector such as `x`, `zyx` or `xxyy`.
    pub fn parse(field: &str) -> Option<Lanes> {
        let bytes = field.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 {
            return None;
        }
        let mut idx = [0u8; 4];
        for (slot, letter) in idx.iter_mut().zip(bytes) {
            *slot = match letter {
                b'x' => 0,
                b'y' => 1,
                b'z' => 2,
                b'w' => 3,
                _ => return None,
            };
        }
        Some(Lanes {
            idx,
            len: bytes.len() as u8,
        })
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_single(&self) -> bool {
        self.len == 1
    }

    pub fn first(&self) -> u8 {
        self.idx[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.idx[..self.len()].iter().copied()
    }

    /// Whether every selected lane exists in a vector of `arity` lanes.
    pub fn fits(&self, arity: u8) -> bool {
        self.iter().all(|lane| lane < arity)
    }
}

/// Scalar in `lane` of `vector`.
pub(crate) fn extract(builder: &mut FunctionBuilder, vector: Value, lane: u8) -> Value {
    builder.ins().extractlane(vector, lane)
}

/// Gather `lanes` of `vector` into a fresh vector, lane `i` of the result taking
/// lane `lanes[i]` of the source. Unselected result lanes are zero.
pub(crate) fn shuffle(builder: &mut FunctionBuilder, vector: Value, lanes: Lanes) -> Value {
    let zero = builder.ins().f32const(0.0);
    let mut result = builder.ins().splat(VECTOR_TYPE, zero);
    for (dest, src) in lanes.iter().enumerate() {
        let scalar = builder.ins().extractlane(vector, src);
        result = builder.ins().insertlane(result, scalar, dest as u8);
    }
    result
}

/// Write `value` into the selected lanes of `base` and return the updated vector.
///
/// A single lane takes the scalar `value` directly; for several lanes, lane `i`
/// of the vector `value` goes to `lanes[i]`, left to right.
pub(crate) fn write_lanes(builder: &mut FunctionBuilder, base: Value, value: Value, lanes: Lanes) -> Value {
    if lanes.is_single() {
        return builder.ins().insertlane(base, value, lanes.first());
    }
    let mut result = base;
    for (src, dest) in lanes.iter().enumerate() {
        let scalar = builder.ins().extractlane(value, src as u8);
        result = builder.ins().insertlane(result, scalar, dest);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_lane() {
        let lanes = Lanes::parse("z").unwrap();
        assert!(lanes.is_single());
        assert_eq!(lanes.first(), 2);
    }

    #[test]
    fn test_parse_keeps_written_order_and_repeats() {
        let lanes = Lanes::parse("wzxx").unwrap();
        assert_eq!(lanes.iter().collect::<Vec<_>>(), vec![3, 2, 0, 0]);
    }

    #[test]
    fn test_parse_rejects_bad_selectors() {
        assert!(Lanes::parse("").is_none());
        assert!(Lanes::parse("xyzwx").is_none());
        assert!(Lanes::parse("rgb").is_none());
        assert!(Lanes::parse("xq").is_none());
    }

    #[test]
    fn test_fits_arity() {
        let lanes = Lanes::parse("xz").unwrap();
        assert!(lanes.fits(3));
        assert!(!lanes.fits(2));
        assert!(Lanes::parse("w").unwrap().fits(4));
    }
}
