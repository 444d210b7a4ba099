//! Redundant data storage.
//!
//! Every piece of diagnostic state is stored twice: once as-is and once
//! bitwise inverted. A read XORs both raw copies and requires the all-ones
//! pattern of the raw width; anything else is an undetected write or a bit
//! flip and is reported as [`FatalFault::RdsCorruption`].
//!
//! Arithmetic updates both copies in lock-step (`value + n`, `inverse - n`)
//! instead of recomputing the complement, so an earlier corruption survives
//! the update and is still caught by the next read.

use core::ops::{BitXor, Not};

use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::{InputState, OutputState, Qualifier, TestState};
use safeio_common::io::pin::Role;

/// Raw storage word of a redundant cell.
pub trait RdsRaw:
    Copy + PartialEq + Not<Output = Self> + BitXor<Output = Self> + core::fmt::Debug
{
    const ONES: Self;
    #[cfg(test)]
    fn flip_bit(self, bit: u32) -> Self;
}

macro_rules! impl_raw {
    ($($t:ty),*) => {$(
        impl RdsRaw for $t {
            const ONES: Self = <$t>::MAX;
            #[cfg(test)]
            fn flip_bit(self, bit: u32) -> Self {
                self ^ (1 << bit)
            }
        }
    )*};
}
impl_raw!(u8, u16, u32);

/// A type that can live in a redundant cell.
pub trait RdsValue: Copy {
    type Raw: RdsRaw;
    fn to_raw(self) -> Self::Raw;
    fn from_raw(raw: Self::Raw) -> Result<Self, FatalFault>;
}

macro_rules! impl_int_value {
    ($($t:ty),*) => {$(
        impl RdsValue for $t {
            type Raw = $t;
            #[inline]
            fn to_raw(self) -> $t {
                self
            }
            #[inline]
            fn from_raw(raw: $t) -> Result<Self, FatalFault> {
                Ok(raw)
            }
        }
    )*};
}
impl_int_value!(u8, u16, u32);

impl RdsValue for bool {
    type Raw = u8;
    #[inline]
    fn to_raw(self) -> u8 {
        self as u8
    }
    #[inline]
    fn from_raw(raw: u8) -> Result<Self, FatalFault> {
        match raw {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(FatalFault::InvalidEncoding { raw: raw as u32 }),
        }
    }
}

macro_rules! impl_enum_value {
    ($($t:ty),*) => {$(
        impl RdsValue for $t {
            type Raw = u8;
            #[inline]
            fn to_raw(self) -> u8 {
                self as u8
            }
            #[inline]
            fn from_raw(raw: u8) -> Result<Self, FatalFault> {
                <$t>::from_u8(raw).ok_or(FatalFault::InvalidEncoding { raw: raw as u32 })
            }
        }
    )*};
}
impl_enum_value!(TestState, InputState, OutputState, Qualifier, Role);

/// Value plus inverted shadow copy.
#[derive(Clone, Copy)]
pub struct Rds<T: RdsValue> {
    value: T::Raw,
    inverse: T::Raw,
}

impl<T: RdsValue> Rds<T> {
    pub fn new(value: T) -> Self {
        let raw = value.to_raw();
        Self {
            value: raw,
            inverse: !raw,
        }
    }

    #[inline]
    pub fn set(&mut self, value: T) {
        let raw = value.to_raw();
        self.value = raw;
        self.inverse = !raw;
    }

    /// Checked read.
    #[inline]
    pub fn get(&self) -> Result<T, FatalFault> {
        if self.value ^ self.inverse != T::Raw::ONES {
            return Err(FatalFault::RdsCorruption);
        }
        T::from_raw(self.value)
    }

    /// Flip one bit of the plain or the shadow copy.
    #[cfg(test)]
    pub(crate) fn inject_bit_flip(&mut self, shadow: bool, bit: u32) {
        if shadow {
            self.inverse = self.inverse.flip_bit(bit);
        } else {
            self.value = self.value.flip_bit(bit);
        }
    }
}

macro_rules! impl_arith {
    ($($t:ty),*) => {$(
        impl Rds<$t> {
            #[inline]
            pub fn inc(&mut self) {
                self.add(1);
            }

            #[inline]
            pub fn dec(&mut self) {
                self.sub(1);
            }

            #[inline]
            pub fn add(&mut self, n: $t) {
                self.value = self.value.wrapping_add(n);
                self.inverse = self.inverse.wrapping_sub(n);
            }

            #[inline]
            pub fn sub(&mut self, n: $t) {
                self.value = self.value.wrapping_sub(n);
                self.inverse = self.inverse.wrapping_add(n);
            }
        }
    )*};
}
impl_arith!(u8, u16, u32);

impl<T: RdsValue + Default> Default for Rds<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: RdsValue + core::fmt::Debug> core::fmt::Debug for Rds<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.get() {
            Ok(v) => write!(f, "Rds({v:?})"),
            Err(_) => write!(f, "Rds(<corrupt {:?}/{:?}>)", self.value, self.inverse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut cell = Rds::new(7u16);
        assert_eq!(cell.get(), Ok(7));
        cell.set(0xBEEF);
        assert_eq!(cell.get(), Ok(0xBEEF));
    }

    #[test]
    fn lock_step_arithmetic_keeps_complement() {
        let mut cell = Rds::new(0u8);
        cell.dec();
        assert_eq!(cell.get(), Ok(0xFF));
        cell.inc();
        cell.add(200);
        cell.sub(50);
        assert_eq!(cell.get(), Ok(150));

        let mut wide = Rds::new(u32::MAX - 1);
        wide.add(3);
        assert_eq!(wide.get(), Ok(1));
    }

    #[test]
    fn arbitrary_sequences_read_back_last_value() {
        let mut cell = Rds::new(0u32);
        let mut model = 0u32;
        for i in 0..500u32 {
            match i % 4 {
                0 => {
                    cell.inc();
                    model = model.wrapping_add(1);
                }
                1 => {
                    cell.add(i * 7);
                    model = model.wrapping_add(i * 7);
                }
                2 => {
                    cell.sub(i);
                    model = model.wrapping_sub(i);
                }
                _ => {
                    cell.dec();
                    model = model.wrapping_sub(1);
                }
            }
            assert_eq!(cell.get(), Ok(model));
        }
    }

    #[test]
    fn every_single_bit_flip_is_detected() {
        for bit in 0..16 {
            for shadow in [false, true] {
                let mut cell = Rds::new(0x1234u16);
                cell.inject_bit_flip(shadow, bit);
                assert_eq!(cell.get(), Err(FatalFault::RdsCorruption), "bit {bit}");
            }
        }
        for bit in 0..8 {
            let mut cell = Rds::new(TestState::ExecCyclic);
            cell.inject_bit_flip(false, bit);
            assert_eq!(cell.get(), Err(FatalFault::RdsCorruption));
        }
    }

    #[test]
    fn corruption_survives_arithmetic() {
        let mut cell = Rds::new(10u32);
        cell.inject_bit_flip(true, 31);
        cell.inc();
        assert!(cell.get().is_err());
    }

    #[test]
    fn out_of_domain_enum_encoding_is_rejected() {
        let mut cell = Rds::new(Qualifier::Ok);
        cell.value = 9;
        cell.inverse = !9;
        assert_eq!(cell.get(), Err(FatalFault::InvalidEncoding { raw: 9 }));

        let mut flag = Rds::new(true);
        flag.value = 2;
        flag.inverse = !2;
        assert!(flag.get().is_err());
    }
}
