use std::fmt;
use std::rc::Rc;

use crate::ir::Expr;

/// An ordered chain of synchronous handlers. Each handler sees the event as
/// left by the ones before it.
pub struct Subscribers<E> {
    handlers: Vec<Rc<dyn Fn(&mut E)>>,
}

impl<E> Subscribers<E> {
    pub fn subscribe(&mut self, handler: impl Fn(&mut E) + 'static) {
        self.handlers.push(Rc::new(handler));
    }

    pub fn emit(&self, event: &mut E) {
        for handler in &self.handlers {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Subscribers {
            handlers: Vec::new(),
        }
    }
}

impl<E> Clone for Subscribers<E> {
    fn clone(&self) -> Self {
        Subscribers {
            handlers: self.handlers.clone(),
        }
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscribers({})", self.handlers.len())
    }
}

/// Resolution of a member name. Handlers rewrite `name` in place.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberEvent {
    pub name: String,

    /// The collection the member belongs to: the query's collection for
    /// members, the joined entity for join members.
    pub collection: Option<String>,
}

/// Resolution of a method call. A handler that sets `resolved` decides the
/// result; otherwise the method is looked up among the OData methods.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodEvent {
    pub name: String,
    pub args: Vec<Expr>,
    pub resolved: Option<Expr>,
}

/// Prefixes bare names with their collection.
pub fn qualify_member(event: &mut MemberEvent) {
    if event.name.contains('.') {
        return;
    }
    if let Some(collection) = &event.collection {
        event.name = format!("{collection}.{}", event.name);
    }
}

#[derive(Debug, Clone)]
pub struct Events {
    pub member: Subscribers<MemberEvent>,
    pub join_member: Subscribers<MemberEvent>,
    pub method: Subscribers<MethodEvent>,
}

impl Default for Events {
    fn default() -> Self {
        let mut member = Subscribers::default();
        member.subscribe(qualify_member);
        let mut join_member = Subscribers::default();
        join_member.subscribe(qualify_member);

        Events {
            member,
            join_member,
            method: Subscribers::default(),
        }
    }
}
