use lazyproxy_core::injectable;
use std::sync::Arc;

struct UserRepository;
struct MetricsCollector;

#[injectable]
pub struct UserService {
    user_repo: Arc<UserRepository>,
    metrics: Option<Arc<MetricsCollector>>,
    retries: u32,
    #[inject(property)]
    label: Option<String>,
}

fn main() {}
