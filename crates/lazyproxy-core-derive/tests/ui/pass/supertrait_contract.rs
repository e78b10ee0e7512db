use lazyproxy_core::{lazy_contract, CoreError};

#[lazy_contract]
pub trait Named: Send + Sync {
    fn name(&self) -> Result<String, CoreError>;
}

#[lazy_contract]
pub(crate) trait Job: Named {
    fn run(&self) -> Result<u64, CoreError>;
}

fn main() {}
