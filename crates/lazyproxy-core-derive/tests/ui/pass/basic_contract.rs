use lazyproxy_core::{lazy_contract, CoreError};

#[lazy_contract]
pub trait Greeter {
    fn greet(&self, name: &str) -> Result<String, CoreError>;

    #[lazy(getter)]
    fn greeting(&self) -> Result<String, CoreError>;

    #[lazy(setter)]
    fn set_greeting(&self, greeting: String) -> Result<(), CoreError>;
}

fn main() {}
