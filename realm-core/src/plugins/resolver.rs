//! Dependency-ordered module sequencing

use std::collections::HashSet;

/// Outcome of a dependency walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Modules in initialization order, dependencies first
    pub order: Vec<String>,
    /// Every cycle found, as the path that closes it (`a -> b -> a`)
    pub cycles: Vec<Vec<String>>,
}

impl Resolution {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Names caught in any cycle
    pub fn cyclic_members(&self) -> HashSet<&str> {
        self.cycles
            .iter()
            .flat_map(|cycle| cycle.iter().map(String::as_str))
            .collect()
    }
}

/// Compute a depth-first load order over `names`.
///
/// `deps_of` returns the declared dependencies of a known module and `None`
/// for a name that is not registered. Unknown dependency names are skipped;
/// the module that declared them is still emitted and fails its own
/// dependency check later. Modules on a cycle are reported in
/// [`Resolution::cycles`] and left out of the order.
pub fn resolve<'g, F>(names: &[String], deps_of: F) -> Resolution
where
    F: Fn(&str) -> Option<&'g [String]>,
{
    let mut walk = Walk {
        deps_of,
        emitted: HashSet::new(),
        blocked: HashSet::new(),
        stack: Vec::new(),
        resolution: Resolution::default(),
    };

    for name in names {
        walk.visit(name);
    }

    walk.resolution
}

struct Walk<F> {
    deps_of: F,
    emitted: HashSet<String>,
    blocked: HashSet<String>,
    stack: Vec<String>,
    resolution: Resolution,
}

impl<'g, F> Walk<F>
where
    F: Fn(&str) -> Option<&'g [String]>,
{
    fn visit(&mut self, name: &str) {
        if self.emitted.contains(name) || self.blocked.contains(name) {
            return;
        }

        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut cycle: Vec<String> = self.stack[pos..].to_vec();
            cycle.push(name.to_string());
            self.blocked.extend(self.stack[pos..].iter().cloned());
            tracing::debug!(cycle = %cycle.join(" -> "), "Dependency cycle detected");
            self.resolution.cycles.push(cycle);
            return;
        }

        let Some(deps) = (self.deps_of)(name) else {
            return;
        };

        self.stack.push(name.to_string());
        for dep in deps {
            self.visit(dep);
        }
        self.stack.pop();

        if !self.blocked.contains(name) {
            self.emitted.insert(name.to_string());
            self.resolution.order.push(name.to_string());
        }
    }
}
