pub mod audit;
pub mod check_open;
pub mod replay;
pub mod whitelist;
