pub mod app {
    pub mod config;
    pub mod config_loader;
    pub mod market_data;
    pub mod order_ids;
    pub mod simple_sender;
    pub mod solver;
}

pub mod cli;
pub mod error;

pub mod index {
    pub mod index_definition;
    pub mod index_manager;
}

pub mod solver {
    pub mod agg_order;
    pub mod agg_order_book;
    pub mod intent;
    pub mod intent_ledger;
    pub mod solver;
}
