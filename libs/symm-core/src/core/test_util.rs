use rust_decimal::dec;

use super::bits::{Amount, Symbol, UserId};

pub fn get_mock_tolerance() -> Amount {
    dec!(0.00001)
}

pub fn get_mock_asset_name_1() -> Symbol {
    "BTC".into()
}

pub fn get_mock_asset_name_2() -> Symbol {
    "ETH".into()
}

pub fn get_mock_asset_name_3() -> Symbol {
    "SOL".into()
}

pub fn get_mock_user_1() -> UserId {
    "alice".into()
}

pub fn get_mock_user_2() -> UserId {
    "bob".into()
}
