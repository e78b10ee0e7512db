use lazyproxy_core::injectable;
use std::marker::PhantomData;
use std::sync::Arc;

struct Connection;

#[injectable]
pub struct Repository<T: Send + Sync + 'static> {
    connection: Arc<Connection>,
    _entity: PhantomData<T>,
}

#[injectable]
pub struct Marker;

fn main() {}
