use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::lazy::proxy::LazyProxy;

/// Shape of a contract type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    /// A trait whose members can all be forwarded
    Interface,
    /// A concrete type, which cannot stand in for a proxy
    Concrete,
}

/// Visibility of the contract declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Visible only inside its declaring crate or module tree
    Restricted,
}

/// Kind of a contract member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Getter,
    Setter,
    Event,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Method => write!(f, "method"),
            MemberKind::Getter => write!(f, "getter"),
            MemberKind::Setter => write!(f, "setter"),
            MemberKind::Event => write!(f, "event"),
        }
    }
}

/// One member of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: &'static str,
    pub kind: MemberKind,
    /// Generic parameters declared by the member itself
    pub generic_params: &'static [&'static str],
    /// `false` for provided members the proxy does not intercept
    pub forwarded: bool,
}

/// Reflection data for a contract, emitted by `#[lazy_contract]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    pub name: &'static str,
    /// Module path and name of the generic definition, shared by every closing
    pub family: &'static str,
    pub kind: ContractKind,
    pub visibility: Visibility,
    pub generic_params: &'static [&'static str],
    /// Concrete type arguments of this closing
    pub type_args: Vec<&'static str>,
    pub supertraits: &'static [&'static str],
    pub members: &'static [MemberDescriptor],
}

impl ContractDescriptor {
    /// Whether the contract declaration is generic
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Name with type arguments, e.g. `Repository<alloc::string::String>`
    pub fn display_name(&self) -> String {
        if self.type_args.is_empty() {
            self.name.to_string()
        } else {
            format!("{}<{}>", self.name, self.type_args.join(", "))
        }
    }

    /// Members the proxy forwards to its target
    pub fn forwarded_members(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|member| member.forwarded)
    }

    /// Check the contract can back a proxy
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.kind != ContractKind::Interface {
            return Err(CoreError::unsupported_contract(
                self.display_name(),
                "lazy proxies can only be generated for interface contracts",
            ));
        }

        if self.type_args.len() != self.generic_params.len() {
            return Err(CoreError::unsupported_contract(
                self.display_name(),
                format!(
                    "expected {} type argument(s), found {}",
                    self.generic_params.len(),
                    self.type_args.len()
                ),
            ));
        }

        let mut seen = HashSet::new();
        for member in self.members {
            if !seen.insert(member.name) {
                return Err(CoreError::unsupported_contract(
                    self.display_name(),
                    format!("member '{}' is declared more than once", member.name),
                ));
            }
        }
        Ok(())
    }
}

/// A contract type that lazy proxies can be generated for.
///
/// Implemented for `dyn Trait` by `#[lazy_contract]`. `bind` is the single
/// place where a proxy becomes an instance of the contract.
pub trait LazyContract: Send + Sync + 'static {
    fn descriptor() -> ContractDescriptor;

    fn bind(proxy: LazyProxy<Self>) -> Arc<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBERS: &[MemberDescriptor] = &[
        MemberDescriptor {
            name: "load",
            kind: MemberKind::Method,
            generic_params: &[],
            forwarded: true,
        },
        MemberDescriptor {
            name: "describe",
            kind: MemberKind::Method,
            generic_params: &["F"],
            forwarded: false,
        },
    ];

    fn descriptor() -> ContractDescriptor {
        ContractDescriptor {
            name: "Store",
            family: "app::Store",
            kind: ContractKind::Interface,
            visibility: Visibility::Public,
            generic_params: &["T"],
            type_args: vec!["u32"],
            supertraits: &[],
            members: MEMBERS,
        }
    }

    #[test]
    fn test_valid_descriptor() {
        let descriptor = descriptor();
        assert!(descriptor.validate().is_ok());
        assert!(descriptor.is_generic());
        assert_eq!(descriptor.display_name(), "Store<u32>");
        assert_eq!(descriptor.forwarded_members().count(), 1);
    }

    #[test]
    fn test_concrete_contract_rejected() {
        let descriptor = ContractDescriptor {
            kind: ContractKind::Concrete,
            ..descriptor()
        };
        assert!(descriptor.validate().unwrap_err().is_unsupported_contract());
    }

    #[test]
    fn test_duplicate_members_rejected() {
        const DUPLICATED: &[MemberDescriptor] = &[
            MemberDescriptor {
                name: "load",
                kind: MemberKind::Method,
                generic_params: &[],
                forwarded: true,
            },
            MemberDescriptor {
                name: "load",
                kind: MemberKind::Getter,
                generic_params: &[],
                forwarded: true,
            },
        ];
        let descriptor = ContractDescriptor {
            members: DUPLICATED,
            ..descriptor()
        };
        let err = descriptor.validate().unwrap_err();
        assert!(err.to_string().contains("load"));
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let descriptor = ContractDescriptor {
            type_args: Vec::new(),
            ..descriptor()
        };
        assert!(descriptor.validate().is_err());
    }
}
