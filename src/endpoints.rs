// Fixed registry of OMIE list calls. New endpoints are added here; the set is
// not extensible at runtime. Documentation for every call lives at
// https://developer.omie.com.br/api/

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://app.omie.com.br/api/v1/";

/// (call name, path relative to the API base), in menu order.
const CALLS: &[(&str, &str)] = &[
    ("ListarContasReceber", "financas/contareceber/"),
    ("ListarContasPagar", "financas/contapagar/"),
    ("ListarDepartamentos", "geral/departamentos/"),
    ("ListarProjetos", "geral/projetos/"),
    ("ListarClientes", "geral/clientes/"),
    ("ListarCategorias", "geral/categorias/"),
    ("ListarContasCorrentes", "geral/contacorrente/"),
];

/// A registered call and the URL it is posted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub call: &'static str,
    pub url: String,
}

/// Maps call names to endpoint URLs under one API base.
#[derive(Debug, Clone)]
pub struct Registry {
    base: String,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new(DEFAULT_API_BASE)
    }
}

impl Registry {
    /// Build a registry rooted at `base`. A missing trailing slash is added
    /// so relative paths join cleanly.
    pub fn new(base: &str) -> Self {
        let mut base = base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Registry { base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Call names in menu order.
    pub fn calls(&self) -> Vec<&'static str> {
        CALLS.iter().map(|(name, _)| *name).collect()
    }

    pub fn len(&self) -> usize {
        CALLS.len()
    }

    pub fn is_empty(&self) -> bool {
        CALLS.is_empty()
    }

    /// Resolve a call name to its endpoint.
    pub fn get(&self, call: &str) -> Result<Endpoint> {
        CALLS
            .iter()
            .find(|(name, _)| *name == call)
            .map(|(name, path)| Endpoint {
                call: name,
                url: format!("{}{}", self.base, path),
            })
            .ok_or_else(|| Error::UnknownCall(call.to_string()))
    }

    pub fn url_for(&self, call: &str) -> Result<String> {
        self.get(call).map(|e| e.url)
    }

    /// Resolve a 1-based menu selection.
    pub fn by_index(&self, selection: usize) -> Result<Endpoint> {
        if selection == 0 || selection > CALLS.len() {
            return Err(Error::InvalidSelection {
                selection,
                max: CALLS.len(),
            });
        }
        self.get(CALLS[selection - 1].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_call_against_default_base() {
        let reg = Registry::default();
        assert_eq!(
            reg.url_for("ListarClientes").unwrap(),
            "https://app.omie.com.br/api/v1/geral/clientes/"
        );
    }

    #[test]
    fn unknown_call_is_rejected() {
        let reg = Registry::default();
        match reg.url_for("ListarNada") {
            Err(Error::UnknownCall(name)) => assert_eq!(name, "ListarNada"),
            other => panic!("expected UnknownCall, got {:?}", other),
        }
    }

    #[test]
    fn menu_index_is_one_based() {
        let reg = Registry::default();
        assert_eq!(reg.by_index(1).unwrap().call, "ListarContasReceber");
        assert_eq!(reg.by_index(reg.len()).unwrap().call, "ListarContasCorrentes");
        assert!(matches!(
            reg.by_index(0),
            Err(Error::InvalidSelection { selection: 0, .. })
        ));
        assert!(matches!(
            reg.by_index(reg.len() + 1),
            Err(Error::InvalidSelection { .. })
        ));
    }

    #[test]
    fn base_override_gets_trailing_slash() {
        let reg = Registry::new("http://127.0.0.1:8080/api");
        assert_eq!(reg.base(), "http://127.0.0.1:8080/api/");
        assert_eq!(
            reg.url_for("ListarProjetos").unwrap(),
            "http://127.0.0.1:8080/api/geral/projetos/"
        );
    }

    #[test]
    fn call_names_are_unique() {
        let mut names = Registry::default().calls();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
