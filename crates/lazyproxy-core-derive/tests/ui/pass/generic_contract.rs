use lazyproxy_core::{lazy_contract, CoreError};

#[lazy_contract]
pub trait Store<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>, CoreError>;

    fn put(&self, key: K, value: V) -> Result<(), CoreError>;
}

fn main() {}
