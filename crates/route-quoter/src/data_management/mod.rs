pub mod cache;
pub mod pool_state;
