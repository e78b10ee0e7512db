pub mod binding;
pub mod bridge;
pub mod contract;
pub mod deferred;
pub mod open;
pub mod proxy;
pub mod template;

pub use binding::{LazyBindingBuilder, LazyRegistration, LazyServiceBinder};
pub use bridge::{LifetimeBridge, ResolutionSnapshot};
pub use contract::{ContractDescriptor, ContractKind, LazyContract, MemberDescriptor, MemberKind, Visibility};
pub use deferred::{Deferred, ProxyState};
pub use open::{Closer, Closing, OpenLazyBindingBuilder};
pub use proxy::LazyProxy;
pub use template::{OpenTemplate, ProxyGenerator, ProxyTemplate};
