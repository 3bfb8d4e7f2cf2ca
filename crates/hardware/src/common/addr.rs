//! Address decomposition for set-associative structures.
//!
//! An address is split into tag, index, bank, and offset fields. The order of the
//! fields is chosen by an [`AddressMask`] layout:
//! 1. **`TagIndexOffset`:** Unbanked caches. Requires exactly one bank.
//! 2. **`TagIndexBankOffset`:** Bank bits sit directly above the offset (line interleaving).
//! 3. **`TagBankIndexOffset`:** Bank bits sit above the index (set-block interleaving).
//!
//! Every accessor is a plain `(address & mask) >> shift`. Masks are derived once at
//! construction; a geometry that is not a power of two is a fatal configuration error.

use crate::common::error::SimError;
use crate::config::AddressMask;

/// Precomputed masks and shifts for one cache or memory controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressDecoder {
    layout: AddressMask,
    offset_mask: u64,
    index_mask: u64,
    index_shift: u32,
    bank_mask: u64,
    bank_shift: u32,
    tag_mask: u64,
    tag_shift: u32,
}

/// Returns `bits` consecutive ones starting at `shift`.
const fn field_mask(shift: u32, bits: u32) -> u64 {
    if bits == 0 {
        0
    } else if bits >= 64 {
        u64::MAX
    } else {
        ((1u64 << bits) - 1) << shift
    }
}

/// Checks that `value` is a non-zero power of two.
fn require_pow2(component: &str, what: &str, value: usize) -> Result<u32, SimError> {
    if value == 0 || !value.is_power_of_two() {
        return Err(SimError::config(
            component,
            format!("{what} must be a power of two (got {value})"),
        ));
    }
    Ok(value.trailing_zeros())
}

impl AddressDecoder {
    /// Builds the decoder for a structure.
    ///
    /// # Arguments
    ///
    /// * `component` - Label used in configuration errors.
    /// * `layout` - Field ordering.
    /// * `line_size` - Bytes per line; sets the offset width.
    /// * `sets` - Number of sets; sets the index width.
    /// * `total_banks` - Number of banks (or interleaved controllers).
    ///
    /// # Returns
    ///
    /// The decoder, or `SimError::InvalidConfig` if any dimension is not a power of
    /// two or the bank count does not suit the layout.
    pub fn new(
        component: &str,
        layout: AddressMask,
        line_size: usize,
        sets: usize,
        total_banks: usize,
    ) -> Result<Self, SimError> {
        let offset_bits = require_pow2(component, "line size", line_size)?;
        let index_bits = require_pow2(component, "number of sets", sets)?;
        let bank_bits = require_pow2(component, "number of banks", total_banks)?;

        match layout {
            AddressMask::TagIndexOffset if total_banks != 1 => {
                return Err(SimError::config(
                    component,
                    format!("TagIndexOffset requires a single bank (got {total_banks})"),
                ));
            }
            AddressMask::TagIndexBankOffset | AddressMask::TagBankIndexOffset
                if total_banks < 2 =>
            {
                return Err(SimError::config(
                    component,
                    format!("{layout:?} requires more than one bank (got {total_banks})"),
                ));
            }
            _ => {}
        }

        let (index_shift, bank_shift) = match layout {
            AddressMask::TagIndexOffset => (offset_bits, offset_bits + index_bits),
            AddressMask::TagIndexBankOffset => (offset_bits + bank_bits, offset_bits),
            AddressMask::TagBankIndexOffset => (offset_bits, offset_bits + index_bits),
        };
        let tag_shift = offset_bits + index_bits + bank_bits;
        if tag_shift >= 64 {
            return Err(SimError::config(
                component,
                "offset, index and bank fields leave no tag bits",
            ));
        }

        Ok(Self {
            layout,
            offset_mask: field_mask(0, offset_bits),
            index_mask: field_mask(index_shift, index_bits),
            index_shift,
            bank_mask: field_mask(bank_shift, bank_bits),
            bank_shift,
            tag_mask: !0u64 << tag_shift,
            tag_shift,
        })
    }

    /// Returns the configured field layout.
    pub const fn layout(&self) -> AddressMask {
        self.layout
    }

    /// Extracts the tag field.
    #[inline]
    pub const fn tag(&self, addr: u64) -> u64 {
        (addr & self.tag_mask) >> self.tag_shift
    }

    /// Extracts the set index.
    #[inline]
    pub const fn index(&self, addr: u64) -> usize {
        ((addr & self.index_mask) >> self.index_shift) as usize
    }

    /// Extracts the bank number.
    #[inline]
    pub const fn bank(&self, addr: u64) -> usize {
        ((addr & self.bank_mask) >> self.bank_shift) as usize
    }

    /// Extracts the byte offset within the line.
    #[inline]
    pub const fn offset(&self, addr: u64) -> u64 {
        addr & self.offset_mask
    }

    /// Clears the offset bits, giving the address of the line's first byte.
    #[inline]
    pub const fn line_address(&self, addr: u64) -> u64 {
        addr & !self.offset_mask
    }

    /// Whether two addresses fall in the same line.
    #[inline]
    pub const fn same_line(&self, a: u64, b: u64) -> bool {
        (a & !self.offset_mask) == (b & !self.offset_mask)
    }

    /// Renders every mask as a 64-bit binary string for configuration reports.
    pub fn describe(&self) -> String {
        format!(
            "tag    {:064b}\nindex  {:064b}\nbank   {:064b}\noffset {:064b}",
            self.tag_mask, self.index_mask, self.bank_mask, self.offset_mask
        )
    }
}
