use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::value::{Function, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

/// What a class value carries: its arena id plus the name for rendering.
#[derive(Debug, Clone)]
pub struct ClassRef {
    pub id: ClassId,
    pub name: Rc<str>,
}

#[derive(Debug)]
pub struct Class {
    pub name: Rc<str>,
    pub parent: Option<ClassId>,
    methods: FxHashMap<String, Rc<Function>>,
}

/// Every class declared during a run, linked to its parent by id.
#[derive(Debug, Default)]
pub struct ClassArena {
    classes: Vec<Class>,
}

impl ClassArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class. Methods are taken in declaration order, so a later
    /// method with the same name replaces an earlier one.
    pub fn define(
        &mut self,
        name: &str,
        parent: Option<ClassId>,
        methods: impl IntoIterator<Item = Rc<Function>>,
    ) -> ClassRef {
        let mut table = FxHashMap::default();
        for method in methods {
            table.insert(method.name().to_string(), method);
        }
        let id = ClassId(self.classes.len());
        let name: Rc<str> = Rc::from(name);
        self.classes.push(Class {
            name: name.clone(),
            parent,
            methods: table,
        });
        ClassRef { id, name }
    }

    pub fn get(&self, id: ClassId) -> Option<&Class> {
        self.classes.get(id.0)
    }

    /// Resolves `name` on the class, then each ancestor; nearest wins.
    pub fn find_method(&self, id: ClassId, name: &str) -> Option<Rc<Function>> {
        let mut current = Some(id);
        while let Some(class_id) = current {
            let class = self.get(class_id)?;
            if let Some(method) = class.methods.get(name) {
                return Some(method.clone());
            }
            current = class.parent;
        }
        None
    }
}

pub type InstanceRef = Rc<RefCell<Instance>>;

pub struct Instance {
    pub class: ClassRef,
    fields: FxHashMap<String, Value>,
}

impl Instance {
    pub fn new_ref(class: ClassRef) -> InstanceRef {
        Rc::new(RefCell::new(Self {
            class,
            fields: FxHashMap::default(),
        }))
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &self.fields.len())
            .finish()
    }
}
