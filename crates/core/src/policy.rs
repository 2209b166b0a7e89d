/// Number of lunas (smallest unit) in one coin
pub const LUNAS_PER_COIN: u64 = 100_000;

/// Renders a luna amount as coins with five decimals.
pub fn lunas_to_coins(lunas: u64) -> String {
    format!("{}.{:05}", lunas / LUNAS_PER_COIN, lunas % LUNAS_PER_COIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lunas_to_coins() {
        assert_eq!(lunas_to_coins(0), "0.00000");
        assert_eq!(lunas_to_coins(1), "0.00001");
        assert_eq!(lunas_to_coins(LUNAS_PER_COIN), "1.00000");
        assert_eq!(lunas_to_coins(1_234_567), "12.34567");
    }
}
