//! Example: lazy registrations in the IoC container
//!
//! Services are resolved as proxies; their implementations are only built
//! when a member is first used. Run with `RUST_LOG=lazyproxy_core=trace` to
//! watch registration and realization events.

use std::sync::Arc;

use lazyproxy_core::{
    injectable, lazy_contract, ContainerConfig, CoreError, Injectable, IocContainer, LazyServiceBinder,
    ResolveContext,
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("argument '{0}' is required")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Container(#[from] CoreError),
}

#[lazy_contract]
pub trait MyService {
    fn foo(&self) -> Result<(), SampleError>;
}

pub struct MyServiceImpl;

impl Injectable for MyServiceImpl {
    fn create(_ctx: &mut ResolveContext) -> Result<Self, CoreError> {
        tracing::info!("MyService constructor is invoked");
        Ok(MyServiceImpl)
    }
}

impl MyService for MyServiceImpl {
    fn foo(&self) -> Result<(), SampleError> {
        tracing::info!("MyService.foo is invoked");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Ninja {
    pub name: String,
    pub health: u32,
}

#[lazy_contract]
pub trait WeaponService {
    fn damage(&self, ninja: Option<&Ninja>) -> Result<u32, SampleError>;
}

#[lazy_contract]
pub trait NinjaService: WeaponService {
    #[lazy(getter)]
    fn min_ninja_health(&self) -> Result<u32, SampleError>;

    fn create_ninja(&self) -> Result<Ninja, SampleError>;
}

#[injectable]
pub struct Katana;

impl WeaponService for Katana {
    fn damage(&self, ninja: Option<&Ninja>) -> Result<u32, SampleError> {
        let ninja = ninja.ok_or(SampleError::MissingArgument("ninja"))?;
        Ok(ninja.health / 4 + 10)
    }
}

pub struct Dojo {
    weapon: Arc<dyn WeaponService>,
    min_health: u32,
}

impl Injectable for Dojo {
    fn parameter_names() -> &'static [&'static str] {
        &["weapon"]
    }

    fn create(ctx: &mut ResolveContext) -> Result<Self, CoreError> {
        tracing::info!("NinjaService constructor is invoked");
        Ok(Self {
            weapon: ctx.dependency::<dyn WeaponService>("weapon")?,
            min_health: 50,
        })
    }
}

impl WeaponService for Dojo {
    fn damage(&self, ninja: Option<&Ninja>) -> Result<u32, SampleError> {
        self.weapon.damage(ninja)
    }
}

impl NinjaService for Dojo {
    fn min_ninja_health(&self) -> Result<u32, SampleError> {
        Ok(self.min_health)
    }

    fn create_ninja(&self) -> Result<Ninja, SampleError> {
        Ok(Ninja {
            name: "Kage".to_string(),
            health: self.min_health * 2,
        })
    }
}

fn single_service() -> Result<(), SampleError> {
    let container = IocContainer::new();
    container.register_lazy::<dyn MyService, MyServiceImpl>()?;

    tracing::info!("resolving the service");
    let service = container.resolve::<dyn MyService>()?;

    tracing::info!("executing foo");
    service.foo()?;

    container.dispose()?;
    Ok(())
}

fn nested_services() -> Result<(), SampleError> {
    let container = IocContainer::with_config(ContainerConfig::from_env().map_err(CoreError::from)?)?;
    container
        .register_lazy::<dyn WeaponService, Katana>()?
        .register_lazy::<dyn NinjaService, Dojo>()?;

    tracing::info!("resolving NinjaService");
    let service = container.resolve::<dyn NinjaService>()?;

    tracing::info!("reading min_ninja_health");
    let min_health = service.min_ninja_health()?;
    tracing::info!(min_health, "read property");

    tracing::info!("creating a ninja");
    let ninja = service.create_ninja()?;

    tracing::info!("invoking inherited damage");
    let damage = service.damage(Some(&ninja))?;
    tracing::info!(ninja = %ninja.name, damage, "computed damage");

    tracing::info!("invoking inherited damage without a ninja");
    match service.damage(None) {
        Err(error @ SampleError::MissingArgument(_)) => {
            tracing::info!(%error, "expected error returned by the real instance")
        }
        other => tracing::warn!(?other, "unexpected outcome"),
    }

    Ok(())
}

fn main() -> Result<(), SampleError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lazyproxy_core=debug")),
        )
        .init();

    tracing::info!("--- example #1: single lazy service ---");
    single_service()?;

    tracing::info!("--- example #2: nested lazy services ---");
    nested_services()?;

    Ok(())
}
