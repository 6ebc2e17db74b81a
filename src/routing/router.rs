//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first route matching method + path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in registration order; no specificity scoring, so callers
//!   register specific routes before general ones that overlap them
//! - Explicit `None` rather than silent default

use crate::http::Method;
use crate::routing::matcher::{RouteParams, RouteTemplate};

/// A declared route: template + accepted methods + the value it resolves to.
#[derive(Debug, Clone)]
pub struct Route<T> {
    pub template: RouteTemplate,
    pub methods: Vec<Method>,
    pub target: T,
}

impl<T> Route<T> {
    pub fn accepts(&self, method: Method) -> bool {
        method != Method::Unknown && self.methods.contains(&method)
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'r, T> {
    pub route: &'r Route<T>,
    pub params: RouteParams,
}

/// Ordered, first-match-wins route registry.
#[derive(Debug, Clone)]
pub struct Router<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Later routes only win when no earlier route matches.
    pub fn add(&mut self, template: RouteTemplate, methods: Vec<Method>, target: T) {
        self.routes.push(Route {
            template,
            methods,
            target,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route<T>> {
        self.routes.iter()
    }

    /// Find the first route accepting `method` whose template matches `path`.
    pub fn match_request(&self, method: Method, path: &str) -> Option<RouteMatch<'_, T>> {
        self.routes
            .iter()
            .filter(|route| route.accepts(method))
            .find_map(|route| {
                route
                    .template
                    .match_path(path)
                    .map(|params| RouteMatch { route, params })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(routes: &[(&str, Method, &'static str)]) -> Router<&'static str> {
        let mut router = Router::new();
        for (template, method, name) in routes {
            router.add(RouteTemplate::parse(template).unwrap(), vec![*method], *name);
        }
        router
    }

    #[test]
    fn first_registered_match_wins() {
        let router = router(&[
            ("/sw/a", Method::Get, "literal"),
            ("/sw/{param}", Method::Get, "param"),
        ]);

        let found = router.match_request(Method::Get, "/sw/a").unwrap();
        assert_eq!(found.route.target, "literal");
        assert!(found.params.is_empty());

        let found = router.match_request(Method::Get, "/sw/asdf").unwrap();
        assert_eq!(found.route.target, "param");
        assert_eq!(found.params["param"], "asdf");
    }

    #[test]
    fn registration_order_is_not_reordered() {
        let router = router(&[
            ("/sw/{param}", Method::Get, "param"),
            ("/sw/a", Method::Get, "literal"),
        ]);

        assert_eq!(router.match_request(Method::Get, "/sw/a").unwrap().route.target, "param");
    }

    #[test]
    fn method_must_be_accepted() {
        let mut router = router(&[("/body", Method::Post, "post")]);
        router.add(RouteTemplate::parse("/multi").unwrap(), vec![Method::Get, Method::Put], "multi");

        assert!(router.match_request(Method::Get, "/body").is_none());
        assert!(router.match_request(Method::Post, "/body").is_some());
        assert!(router.match_request(Method::Put, "/multi").is_some());
        assert!(router.match_request(Method::Delete, "/multi").is_none());
    }

    #[test]
    fn unknown_methods_never_match() {
        let mut router = Router::new();
        router.add(RouteTemplate::parse("/").unwrap(), vec![Method::Unknown], ());
        assert!(router.match_request(Method::Unknown, "/").is_none());
    }
}
