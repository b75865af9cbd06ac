//! Deterministic address legality checks.

use crate::fault::FaultCode;

/// Byte width of every load and store.
pub const WORD_ACCESS_BYTES: usize = 8;

/// Validates a data address against the configured maximum address.
///
/// # Errors
///
/// Returns [`FaultCode::AddressOutOfRange`] when `address >= max_address`.
pub const fn validate_data_address(address: u64, max_address: u64) -> Result<(), FaultCode> {
    if address >= max_address {
        Err(FaultCode::AddressOutOfRange)
    } else {
        Ok(())
    }
}

/// Reinterprets a register value as an unsigned byte address.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn register_address(value: i64) -> u64 {
    value as u64
}

#[cfg(test)]
mod tests {
    use super::{register_address, validate_data_address};
    use crate::fault::FaultCode;

    #[test]
    fn addresses_below_maximum_are_legal() {
        assert_eq!(validate_data_address(0, 1), Ok(()));
        assert_eq!(validate_data_address(4095, 4096), Ok(()));
    }

    #[test]
    fn maximum_address_itself_is_out_of_range() {
        assert_eq!(
            validate_data_address(4096, 4096),
            Err(FaultCode::AddressOutOfRange)
        );
        assert_eq!(
            validate_data_address(u64::MAX, u64::MAX),
            Err(FaultCode::AddressOutOfRange)
        );
    }

    #[test]
    fn negative_register_values_become_high_addresses() {
        assert_eq!(register_address(-1), u64::MAX);
        assert_eq!(
            validate_data_address(register_address(-8), 1 << 20),
            Err(FaultCode::AddressOutOfRange)
        );
    }
}
