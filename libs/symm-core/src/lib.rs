pub mod core {
    pub mod async_loop;
    pub mod bits;
    pub mod decimal_ext;
    pub mod decimal_macros;
    pub mod functional;
    pub mod id_macros;
    pub mod logging;
    pub mod test_util;
}

pub mod market_data {
    pub mod market_data_gateway;

    pub mod order_book {
        pub mod book_pricer;
        pub mod order_book;
    }
}

pub mod order_sender {
    pub mod execution_gateway;
}
