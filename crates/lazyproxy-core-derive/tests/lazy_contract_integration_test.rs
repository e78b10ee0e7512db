use std::sync::Arc;

use lazyproxy_core::{
    lazy_contract, ContractKind, CoreError, Deferred, LazyContract, LazyProxy, MemberKind, ProxyState, Visibility,
};

#[derive(Debug, PartialEq)]
pub enum MailError {
    Offline(String),
    Rejected,
}

impl From<CoreError> for MailError {
    fn from(error: CoreError) -> Self {
        MailError::Offline(error.to_string())
    }
}

#[lazy_contract]
pub trait Named {
    fn name(&self) -> Result<String, CoreError>;
}

#[lazy_contract]
pub trait Mailer: Named {
    fn send(&self, to: &str, body: String) -> Result<usize, MailError>;

    #[lazy(getter)]
    fn host(&self) -> Result<String, MailError>;

    #[lazy(setter)]
    fn set_host(&self, host: String) -> Result<(), MailError>;

    #[lazy(event)]
    fn on_bounce(&self, handler: Box<dyn Fn(&str) + Send + Sync>) -> Result<(), MailError>;

    fn send_all<I: IntoIterator<Item = String>>(&self, to: &str, bodies: I) -> Result<usize, MailError> {
        let mut sent = 0;
        for body in bodies {
            sent += self.send(to, body)?;
        }
        Ok(sent)
    }

    fn protocol() -> &'static str {
        "smtp"
    }
}

#[derive(Default)]
struct SmtpMailer {
    host: std::sync::Mutex<String>,
}

impl Named for SmtpMailer {
    fn name(&self) -> Result<String, CoreError> {
        Ok("smtp".to_string())
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, body: String) -> Result<usize, MailError> {
        if to.is_empty() {
            return Err(MailError::Rejected);
        }
        Ok(body.len())
    }

    fn host(&self) -> Result<String, MailError> {
        Ok(self.host.lock().map(|host| host.clone()).unwrap_or_default())
    }

    fn set_host(&self, host: String) -> Result<(), MailError> {
        if let Ok(mut current) = self.host.lock() {
            *current = host;
        }
        Ok(())
    }

    fn on_bounce(&self, handler: Box<dyn Fn(&str) + Send + Sync>) -> Result<(), MailError> {
        handler("bounced");
        Ok(())
    }
}

fn proxy_over(mailer: Option<Arc<SmtpMailer>>) -> LazyProxy<dyn Mailer> {
    LazyProxy::new(Deferred::new(move || match &mailer {
        Some(mailer) => Ok(mailer.clone() as Arc<dyn Mailer>),
        None => Err(CoreError::construction("SmtpMailer", "no relay configured")),
    }))
}

#[test]
fn test_descriptor_records_members() {
    let descriptor = <dyn Mailer as LazyContract>::descriptor();

    assert_eq!(descriptor.name, "Mailer");
    assert_eq!(descriptor.kind, ContractKind::Interface);
    assert_eq!(descriptor.visibility, Visibility::Public);
    assert_eq!(descriptor.supertraits, &["Named"]);
    assert!(descriptor.family.ends_with("::Mailer"));
    assert!(!descriptor.is_generic());
    assert!(descriptor.validate().is_ok());

    let kinds: Vec<(&str, MemberKind, bool)> = descriptor
        .members
        .iter()
        .map(|member| (member.name, member.kind, member.forwarded))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("send", MemberKind::Method, true),
            ("host", MemberKind::Getter, true),
            ("set_host", MemberKind::Setter, true),
            ("on_bounce", MemberKind::Event, true),
            ("send_all", MemberKind::Method, false),
            ("protocol", MemberKind::Method, false),
        ]
    );
    assert_eq!(descriptor.members[4].generic_params, &["I"]);
}

#[test]
fn test_proxy_defers_until_first_member() {
    let proxy = proxy_over(Some(Arc::new(SmtpMailer::default())));
    assert_eq!(proxy.state(), ProxyState::NotTouched);

    proxy.set_host("relay.local".to_string()).unwrap();
    assert_eq!(proxy.state(), ProxyState::Touched);
    assert_eq!(proxy.host().unwrap(), "relay.local");
}

#[test]
fn test_proxy_forwards_arguments_and_errors() {
    let mailer: Arc<dyn Mailer> = <dyn Mailer as LazyContract>::bind(proxy_over(Some(Arc::new(SmtpMailer::default()))));

    assert_eq!(mailer.send("ada@example.com", "hello".to_string()).unwrap(), 5);
    assert_eq!(mailer.send("", "hello".to_string()).unwrap_err(), MailError::Rejected);
    assert_eq!(mailer.name().unwrap(), "smtp");

    let bounced = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = bounced.clone();
    mailer
        .on_bounce(Box::new(move |_| flag.store(true, std::sync::atomic::Ordering::SeqCst)))
        .unwrap();
    assert!(bounced.load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn test_provided_members_run_on_the_proxy() {
    let proxy = proxy_over(Some(Arc::new(SmtpMailer::default())));

    let sent = proxy
        .send_all("ada@example.com", vec!["a".to_string(), "bc".to_string()])
        .unwrap();
    assert_eq!(sent, 3);
    assert_eq!(<LazyProxy<dyn Mailer> as Mailer>::protocol(), "smtp");
}

#[test]
fn test_realization_failure_converts_into_member_error() {
    let proxy = proxy_over(None);

    match proxy.host() {
        Err(MailError::Offline(message)) => assert!(message.contains("no relay configured")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(proxy.name().unwrap_err().to_string().contains("no relay configured"));
    assert_eq!(proxy.state(), ProxyState::NotTouched);
}

#[lazy_contract]
pub(crate) trait Cache<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>, CoreError>;
}

struct EmptyCache;

impl<K: 'static, V: 'static> Cache<K, V> for EmptyCache {
    fn get(&self, _key: &K) -> Result<Option<V>, CoreError> {
        Ok(None)
    }
}

#[test]
fn test_generic_contract_descriptor() {
    let descriptor = <dyn Cache<String, u32> as LazyContract>::descriptor();

    assert_eq!(descriptor.visibility, Visibility::Restricted);
    assert_eq!(descriptor.generic_params, &["K", "V"]);
    assert_eq!(descriptor.type_args.len(), 2);
    assert!(descriptor.display_name().starts_with("Cache<"));

    let cache: Arc<dyn Cache<String, u32>> = <dyn Cache<String, u32> as LazyContract>::bind(LazyProxy::new(
        Deferred::new(|| Ok(Arc::new(EmptyCache) as Arc<dyn Cache<String, u32>>)),
    ));
    assert_eq!(cache.get(&"missing".to_string()).unwrap(), None);
}
