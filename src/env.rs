//! Per-process environment variables, inherited across `fork`.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Environment {
    variables: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_roundtrip() {
        let mut env = Environment::new();
        env.set("HOME", "/usr/liz");
        assert_eq!(env.get("HOME"), Some("/usr/liz"));
        assert_eq!(env.get("PATH"), None);
    }

    #[test]
    fn clone_is_independent() {
        let mut env = Environment::new();
        env.set("A", "1");
        let mut child = env.clone();
        child.set("A", "2");
        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(child.get("A"), Some("2"));
    }
}
