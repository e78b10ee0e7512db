use lazyproxy_core::injectable;
use std::sync::Arc;

struct UserRepository;
struct EmailService;

#[injectable]
pub struct UserService {
    user_repo: Arc<UserRepository>,
    email_service: Arc<EmailService>,
}

fn main() {}
